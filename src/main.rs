//! Jimaku - Subtitle Studio
//!
//! Command line entry point for the subtitle studio core: transcribe videos
//! with whisper-cpp, edit and style the track, and render it back out with
//! ffmpeg.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jimaku::cli::{Args, Commands};
use jimaku::config::Config;
use jimaku::error::JimakuError;
use jimaku::event::EventBus;
use jimaku::managers::StyleManager;
use jimaku::managers::project::read_record;
use jimaku::media::MediaToolFactory;
use jimaku::setup::AppDirs;
use jimaku::studio::Studio;
use jimaku::style::Style;
use jimaku::subtitles::{ass, srt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try config.toml from the current directory first
            if Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    let dirs = AppDirs::resolve(&config.storage);
    dirs.ensure()?;
    setup_logging(args.verbose, &dirs)?;

    match args.command {
        Commands::Transcribe {
            input,
            output,
            language,
            project,
        } => {
            info!("Transcribing video: {}", input.display());
            let mut config = config;
            if language.is_some() {
                config.engine.language = language;
            }

            let mut studio = Studio::new(config)?;
            studio.begin_engine_load();
            studio.open_video(&input).await?;
            studio.transcribe().await?;
            export_subtitles(&studio, &output).await?;
            println!("Wrote {}", output.display());

            if let Some(archive) = project {
                studio.save_project_as(&archive).await?;
                println!("Saved project {}", archive.display());
            }
        }
        Commands::Burn {
            input,
            subtitles,
            output,
        } => {
            info!("Burning subtitles into: {}", input.display());
            let mut studio = Studio::new(config)?;
            studio.open_video(&input).await?;
            match subtitles {
                Some(track) => import_subtitles(&studio, &track).await?,
                None => {
                    studio.begin_engine_load();
                    studio.transcribe().await?;
                }
            }
            studio.burn(&output).await?;
            println!("Wrote {}", output.display());
        }
        Commands::Snapshot {
            input,
            subtitles,
            at,
            output,
        } => {
            info!("Capturing frame at {}s from: {}", at, input.display());
            let mut studio = Studio::new(config)?;
            studio.open_video(&input).await?;
            match subtitles {
                Some(track) => import_subtitles(&studio, &track).await?,
                None => {
                    studio.begin_engine_load();
                    studio.transcribe().await?;
                }
            }
            studio.snapshot_frame(at, &output).await?;
            println!("Wrote {}", output.display());
        }
        Commands::Convert { input, output } => {
            info!(
                "Converting {} -> {}",
                input.display(),
                output.display()
            );
            let subtitles = match subtitle_format(&input)? {
                SubtitleFormat::Srt => srt::import_srt(&input).await?,
                SubtitleFormat::Ass => ass::import_ass(&input).await?,
            };
            match subtitle_format(&output)? {
                SubtitleFormat::Srt => srt::generate_srt(&subtitles, &output).await?,
                SubtitleFormat::Ass => {
                    ass::generate_ass(&subtitles, &Style::default(), &output).await?
                }
            }
            println!("Wrote {}", output.display());
        }
        Commands::Presets => {
            let style = StyleManager::new(EventBus::new(), dirs.presets.clone());
            let presets = style.list_presets();
            if presets.is_empty() {
                println!("No style presets saved in {}", dirs.presets.display());
            } else {
                println!("Style presets in {}:", dirs.presets.display());
                for name in presets {
                    println!("  {}", name);
                }
            }
        }
        Commands::Inspect { archive } => {
            let record = read_record(&archive).await?;
            let words: usize = record.subtitles.segments.iter().map(|s| s.words.len()).sum();
            println!("Project:  {}", record.meta.name);
            println!("Saved:    {}", record.meta.saved_at);
            println!("Schema:   v{}", record.meta.schema_version);
            println!(
                "Video:    {} ({:.1}s)",
                record.video.path.display(),
                record.video.duration
            );
            println!(
                "Track:    {} segments, {} words",
                record.subtitles.segments.len(),
                words
            );
            println!("Style:    {} {}pt", record.style.font, record.style.font_size);
        }
        Commands::Doctor => {
            println!("Configured tools:");
            let media = MediaToolFactory::create_tool(config.media.clone());
            match media.check_availability() {
                Ok(()) => {
                    let version = media
                        .version_info()
                        .await
                        .unwrap_or_else(|e| format!("available, version unknown ({})", e));
                    println!("  ffmpeg:   {}", version);
                }
                Err(e) => println!("  ffmpeg:   NOT AVAILABLE ({})", e),
            }
            println!(
                "  engine:   {:?} via {}",
                config.engine.kind, config.engine.binary_path
            );
            println!("  model:    {}", config.engine.model);
            println!("Data directories:");
            println!("  data:     {}", dirs.data.display());
            println!("  models:   {}", dirs.models.display());
            println!("  presets:  {}", dirs.presets.display());
            println!("  projects: {}", dirs.projects.display());
        }
    }

    Ok(())
}

enum SubtitleFormat {
    Srt,
    Ass,
}

fn subtitle_format(path: &Path) -> jimaku::error::Result<SubtitleFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("srt") => Ok(SubtitleFormat::Srt),
        Some("ass") => Ok(SubtitleFormat::Ass),
        _ => Err(JimakuError::UnsupportedFormat(format!(
            "{} (expected .srt or .ass)",
            path.display()
        ))),
    }
}

async fn export_subtitles(studio: &Studio, path: &Path) -> jimaku::error::Result<()> {
    match subtitle_format(path)? {
        SubtitleFormat::Srt => studio.export_srt(path).await,
        SubtitleFormat::Ass => studio.export_ass(path).await,
    }
}

async fn import_subtitles(studio: &Studio, path: &Path) -> jimaku::error::Result<()> {
    match subtitle_format(path)? {
        SubtitleFormat::Srt => studio.import_srt(path).await,
        SubtitleFormat::Ass => studio.import_ass(path).await,
    }
}

/// Logging to both console and a daily-rotated file under the data directory
fn setup_logging(verbose: bool, dirs: &AppDirs) -> Result<()> {
    let file_appender = rolling::daily(&dirs.logs, "jimaku.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

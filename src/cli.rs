use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a video and write a subtitle file
    Transcribe {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file; the extension picks the format (.srt or .ass)
        #[arg(short, long)]
        output: PathBuf,

        /// Language hint passed to the recognition engine
        #[arg(short, long)]
        language: Option<String>,

        /// Also save the session as a project archive
        #[arg(long)]
        project: Option<PathBuf>,
    },

    /// Burn a subtitle track into a video file
    Burn {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Subtitle file to burn (.srt or .ass); transcribed when omitted
        #[arg(short, long)]
        subtitles: Option<PathBuf>,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Capture a single subtitled frame as an image
    Snapshot {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Subtitle file to render (.srt or .ass); transcribed when omitted
        #[arg(short, long)]
        subtitles: Option<PathBuf>,

        /// Timestamp of the frame, in seconds
        #[arg(short, long)]
        at: f64,

        /// Output image file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a subtitle file between SRT and ASS
    Convert {
        /// Input subtitle file (.srt or .ass)
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List saved style presets
    Presets,

    /// Show the contents of a project archive
    Inspect {
        /// Project archive (.jmk)
        archive: PathBuf,
    },

    /// Check the external tools this installation depends on
    Doctor,
}

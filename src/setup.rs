//! Application directory layout and recognition model provisioning.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{JimakuError, Result};

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Downloadable whisper.cpp models with their approximate sizes in MB.
const KNOWN_MODELS: &[(&str, f64)] = &[
    ("tiny", 39.0),
    ("tiny.en", 39.0),
    ("base", 142.0),
    ("base.en", 142.0),
    ("small", 244.0),
    ("small.en", 244.0),
    ("medium", 769.0),
    ("medium.en", 769.0),
    ("large-v1", 1550.0),
    ("large-v2", 1550.0),
    ("large-v3", 1550.0),
];

/// Filesystem layout under the data directory. Each concern gets its own
/// subdirectory; `ensure` creates the whole tree.
#[derive(Debug, Clone)]
pub struct AppDirs {
    pub data: PathBuf,
    pub models: PathBuf,
    pub presets: PathBuf,
    pub projects: PathBuf,
    pub temp: PathBuf,
    pub logs: PathBuf,
}

impl AppDirs {
    /// Explicit configuration wins, then the platform data directory, then a
    /// dot directory in the working directory for environments without one.
    pub fn resolve(storage: &StorageConfig) -> Self {
        let data = storage
            .data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("jimaku")))
            .unwrap_or_else(|| PathBuf::from(".jimaku"));
        Self {
            models: data.join("models"),
            presets: data.join("presets"),
            projects: data.join("projects"),
            temp: data.join("temp"),
            logs: data.join("logs"),
            data,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.data,
            &self.models,
            &self.presets,
            &self.projects,
            &self.temp,
            &self.logs,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Resolves the configured model to a file on disk. A path to an existing
/// file is taken as-is; a bare name maps to `ggml-{name}.bin` under the
/// models directory and is downloaded on first use.
pub async fn resolve_model(models_dir: &Path, name_or_path: &str) -> Result<PathBuf> {
    let as_path = Path::new(name_or_path);
    if as_path.exists() {
        return Ok(as_path.to_path_buf());
    }
    if name_or_path.contains('/') || name_or_path.contains('\\') || name_or_path.ends_with(".bin")
    {
        return Err(JimakuError::FileNotFound(name_or_path.to_string()));
    }

    let size_mb = KNOWN_MODELS
        .iter()
        .find(|(name, _)| *name == name_or_path)
        .map(|(_, size_mb)| *size_mb)
        .ok_or_else(|| JimakuError::Config(format!("Unknown model '{}'", name_or_path)))?;

    let local_path = models_dir.join(format!("ggml-{}.bin", name_or_path));
    if local_path.exists() {
        return Ok(local_path);
    }

    download_model(name_or_path, size_mb, &local_path).await?;
    Ok(local_path)
}

async fn download_model(name: &str, size_mb: f64, local_path: &Path) -> Result<()> {
    let url = format!("{}/ggml-{}.bin", MODEL_BASE_URL, name);
    info!("Downloading {} model ({:.1} MB)...", name, size_mb);

    let client = reqwest::Client::builder().user_agent("jimaku/0.1.0").build()?;
    let mut response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(JimakuError::Config(format!(
            "Failed to download model {}: HTTP {}",
            name,
            response.status()
        )));
    }

    let total = response
        .content_length()
        .unwrap_or((size_mb * 1_000_000.0) as u64);
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    // Stage next to the destination; a torn download never lands under the
    // final name.
    let temp_path = local_path.with_extension("bin.tmp");
    let mut file = fs::File::create(&temp_path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    fs::rename(&temp_path, local_path).await?;
    pb.finish_with_message(format!("Downloaded {}", name));
    info!("Model {} saved to {}", name, local_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_path_is_taken_as_is() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("custom.bin");
        std::fs::write(&model, b"weights").unwrap();

        let resolved = resolve_model(dir.path(), model.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(resolved, model);
    }

    #[tokio::test]
    async fn test_bare_name_resolves_to_downloaded_file() {
        let dir = TempDir::new().unwrap();
        let cached = dir.path().join("ggml-tiny.bin");
        std::fs::write(&cached, b"weights").unwrap();

        let resolved = resolve_model(dir.path(), "tiny").await.unwrap();
        assert_eq!(resolved, cached);
    }

    #[tokio::test]
    async fn test_unknown_model_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = resolve_model(dir.path(), "enormous").await.unwrap_err();
        assert!(matches!(err, JimakuError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_explicit_path_is_not_treated_as_a_name() {
        let dir = TempDir::new().unwrap();
        let err = resolve_model(dir.path(), "/nonexistent/model.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, JimakuError::FileNotFound(_)));
    }

    #[test]
    fn test_app_dirs_nest_under_the_configured_root() {
        let dir = TempDir::new().unwrap();
        let dirs = AppDirs::resolve(&StorageConfig {
            data_dir: Some(dir.path().join("state")),
        });
        dirs.ensure().unwrap();

        assert!(dir.path().join("state/models").is_dir());
        assert!(dir.path().join("state/presets").is_dir());
        assert!(dir.path().join("state/projects").is_dir());
        assert!(dir.path().join("state/temp").is_dir());
        assert!(dir.path().join("state/logs").is_dir());
    }
}

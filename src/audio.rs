use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::AudioConfig;

/// Extensions that tools may leave next to the temp prefix
const SIDECAR_EXTENSIONS: &[&str] = &["mp3", "json", "part", "webm", "m4a"];

/// Downloads the audio track of a video into `{prefix}.mp3`
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download best available audio for `url` and transcode it to
    /// `{prefix}.mp3`. Returns the path of the produced file.
    async fn fetch_audio(&self, url: &str, prefix: &Path) -> Result<PathBuf>;
}

/// Audio fetcher backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    /// Downloader executable
    binary: String,
    /// Output codec passed to the audio extractor
    audio_format: String,
    /// Output quality passed to the audio extractor
    audio_quality: String,
}

impl YtDlpFetcher {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            binary: config.downloader.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
        }
    }

    fn output_template(prefix: &Path) -> String {
        format!("{}.%(ext)s", prefix.display())
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new(&AudioConfig::default())
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch_audio(&self, url: &str, prefix: &Path) -> Result<PathBuf> {
        let audio_path = audio_path_for(prefix, &self.audio_format);

        info!("🎵 Downloading audio: {}", url);

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "--format", "bestaudio/best",
            "--output", &Self::output_template(prefix),
            "--quiet",
            "--no-warnings",
            "--no-playlist",
            "--extract-audio",
            "--audio-format", &self.audio_format,
            "--audio-quality", &self.audio_quality,
        ])
        .arg(url);

        debug!("Executing command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            ));
        }

        if !audio_path.exists() {
            return Err(anyhow!("expected audio file {} was not produced", audio_path.display()));
        }

        let file_size = tokio::fs::metadata(&audio_path).await?.len();
        info!("✅ Audio downloaded: {} ({:.1} MB)",
              audio_path.display(),
              file_size as f64 / 1_000_000.0);

        Ok(audio_path)
    }
}

/// Path of the transcoded audio file for a temp prefix
pub fn audio_path_for(prefix: &Path, format: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(format);
    PathBuf::from(name)
}

/// Remove the temp prefix file and every sidecar the tools may have written.
///
/// Removal errors are ignored, so calling this repeatedly is harmless.
pub fn cleanup_temp_files(prefix: &Path) {
    let mut candidates = vec![prefix.to_path_buf()];
    candidates.extend(SIDECAR_EXTENSIONS.iter().map(|ext| audio_path_for(prefix, ext)));

    let mut removed = 0;
    for path in candidates {
        if std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        debug!("🧹 Removed {} temporary files for {}", removed, prefix.display());
    }
}

/// Request-scoped temp audio location.
///
/// A uniquely named empty file reserves the prefix; `{prefix}.mp3` and any
/// sidecars are removed together with it when the guard drops.
#[derive(Debug)]
pub struct TempAudio {
    prefix: PathBuf,
}

impl TempAudio {
    /// Reserve a new prefix inside `dir`
    pub fn create_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create temp directory {}", dir.display()))?;

        let (_file, prefix) = tempfile::Builder::new()
            .prefix("quiz-audio-")
            .tempfile_in(dir)?
            .keep()
            .map_err(|e| anyhow!("failed to keep temp file: {}", e))?;

        debug!("Reserved temp audio prefix {}", prefix.display());
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Remove every file belonging to this prefix now
    pub fn cleanup(&self) {
        cleanup_temp_files(&self.prefix);
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        self.cleanup();
        if self.prefix.exists() {
            warn!("Temp file {} survived cleanup", self.prefix.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_audio_path_for_appends_extension() {
        let path = audio_path_for(Path::new("/tmp/quiz-audio-x1"), "mp3");
        assert_eq!(path, PathBuf::from("/tmp/quiz-audio-x1.mp3"));
    }

    #[test]
    fn test_fetcher_uses_config() {
        let fetcher = YtDlpFetcher::default();
        assert_eq!(fetcher.binary, "yt-dlp");
        assert_eq!(fetcher.audio_format, "mp3");
        assert_eq!(fetcher.audio_quality, "192K");
        assert_eq!(
            YtDlpFetcher::output_template(Path::new("/tmp/abc")),
            "/tmp/abc.%(ext)s"
        );
    }

    #[test]
    fn test_cleanup_twice_never_fails() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("quiz-audio-test");
        std::fs::write(&prefix, b"").unwrap();
        std::fs::write(audio_path_for(&prefix, "mp3"), b"audio").unwrap();

        cleanup_temp_files(&prefix);
        cleanup_temp_files(&prefix);

        assert!(!prefix.exists());
        assert!(!audio_path_for(&prefix, "mp3").exists());
    }

    #[test]
    fn test_temp_audio_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let (prefix, mp3) = {
            let temp = TempAudio::create_in(temp_dir.path()).unwrap();
            let mp3 = audio_path_for(temp.prefix(), "mp3");
            std::fs::write(&mp3, b"audio").unwrap();
            assert!(temp.prefix().exists());
            (temp.prefix().to_path_buf(), mp3)
        };

        assert!(!prefix.exists());
        assert!(!mp3.exists());
    }

    #[test]
    fn test_temp_audio_prefixes_are_unique() {
        let temp_dir = TempDir::new().unwrap();
        let a = TempAudio::create_in(temp_dir.path()).unwrap();
        let b = TempAudio::create_in(temp_dir.path()).unwrap();
        assert_ne!(a.prefix(), b.prefix());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = AudioConfig {
            downloader: "definitely-not-a-real-downloader".to_string(),
            ..AudioConfig::default()
        };
        let fetcher = YtDlpFetcher::new(&config);
        let result = fetcher
            .fetch_audio("https://www.youtube.com/watch?v=abc", &temp_dir.path().join("x"))
            .await;
        assert!(result.is_err());
    }
}

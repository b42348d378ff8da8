use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::Transcriber;
use crate::config::TranscriptionConfig;

/// Whisper command-line transcriber.
///
/// The model variant comes from deployment configuration and is never chosen
/// per request.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    /// Whisper executable
    binary: String,
    /// Whisper model name
    model: String,
    /// Language hint
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
        }
    }

    fn build_command(&self, audio_path: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);

        cmd.arg(audio_path)
            .arg("--model").arg(&self.model)
            .arg("--output_dir").arg(output_dir)
            .arg("--output_format").arg("json")
            .arg("--verbose").arg("False")
            .arg("--fp16").arg("False");

        if let Some(language) = &self.language {
            cmd.arg("--language").arg(language);
        }

        cmd
    }

    /// Location of the JSON written for `audio_path` into `output_dir`
    fn json_output_path(audio_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        let stem = audio_path
            .file_stem()
            .ok_or_else(|| anyhow!("Invalid audio filename: {}", audio_path.display()))?;
        let mut name = stem.to_os_string();
        name.push(".json");
        Ok(output_dir.join(name))
    }
}

impl Default for WhisperTranscriber {
    fn default() -> Self {
        Self::new(&TranscriptionConfig::default())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let start_time = Instant::now();
        let output_dir = audio_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let json_path = Self::json_output_path(audio_path, &output_dir)?;

        info!("🎤 Starting Whisper transcription for: {}", audio_path.display());
        info!("⚙️  Model: {}", self.model);

        let mut cmd = self.build_command(audio_path, &output_dir);
        debug!("Executing command: {:?}", cmd);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("❌ Whisper failed with exit code: {}", output.status);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            ));
        }

        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .with_context(|| format!("no Whisper output at {}", json_path.display()))?;
        let _ = tokio::fs::remove_file(&json_path).await;

        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| anyhow!("Failed to parse Whisper JSON output: {}", e))?;
        let transcript = whisper_output.full_text();

        info!("🎉 Transcription completed in {:.1}s: {} characters",
              start_time.elapsed().as_secs_f64(),
              transcript.len());

        Ok(transcript)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Whisper JSON output; the Python CLI writes `text` + `segments`,
/// whisper.cpp writes a `transcription` array
#[derive(Debug, Clone, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperSegment {
    text: String,
}

impl WhisperOutput {
    fn full_text(self) -> String {
        if let Some(text) = self.text {
            return text.trim().to_string();
        }

        let segments = if self.transcription.is_empty() {
            self.segments
        } else {
            self.transcription
        };

        segments
            .iter()
            .map(|seg| seg.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

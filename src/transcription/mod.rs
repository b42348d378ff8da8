pub mod whisper;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use whisper::WhisperTranscriber;

/// Speech-to-text over a local audio file
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Full transcript of `audio_path`, trimmed of surrounding whitespace
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;

    /// Model variant in use
    fn model(&self) -> &str;
}

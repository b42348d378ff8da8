use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::audio::{AudioFetcher, TempAudio, YtDlpFetcher};
use crate::config::Config;
use crate::llm::quiz_generation::QuizGenerator;
use crate::llm::response::parse_quiz_response;
use crate::llm::{create_llm, LLM};
use crate::quiz::Quiz;
use crate::store::Store;
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::video::canonicalize_video_url;

/// Stages of the quiz pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    Fetch,
    Transcribe,
    Generate,
    Parse,
    Persist,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Fetch => "fetch",
            ProcessingStage::Transcribe => "transcribe",
            ProcessingStage::Generate => "generate",
            ProcessingStage::Parse => "parse",
            ProcessingStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Stage-tagged pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid URL or request data: {0}")]
    InvalidInput(String),

    #[error("Error downloading audio: {0}")]
    DownloadFailure(String),

    #[error("Error transcribing audio: {0}")]
    TranscriptionFailure(String),

    #[error("Error generating quiz: {0}")]
    GenerationFailure(String),

    #[error("Error parsing quiz: {0}")]
    ParseFailure(String),

    #[error("Error saving quiz: {0}")]
    PersistenceFailure(String),

    #[error("Error preparing temporary audio file: {0}")]
    Io(String),
}

impl PipelineError {
    /// Stage that failed, `None` when the pipeline never started
    pub fn stage(&self) -> Option<ProcessingStage> {
        match self {
            PipelineError::InvalidInput(_) | PipelineError::Io(_) => None,
            PipelineError::DownloadFailure(_) => Some(ProcessingStage::Fetch),
            PipelineError::TranscriptionFailure(_) => Some(ProcessingStage::Transcribe),
            PipelineError::GenerationFailure(_) => Some(ProcessingStage::Generate),
            PipelineError::ParseFailure(_) => Some(ProcessingStage::Parse),
            PipelineError::PersistenceFailure(_) => Some(ProcessingStage::Persist),
        }
    }

    /// Whether the caller can fix the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}

/// Turns a video URL into a stored quiz.
///
/// Stages run strictly in order; the first failure ends the run. The temp
/// audio guard is dropped on every exit path, removing its files.
pub struct QuizPipeline {
    fetcher: Arc<dyn AudioFetcher>,
    transcriber: Arc<dyn Transcriber>,
    generator: QuizGenerator,
    store: Store,
    temp_dir: PathBuf,
}

impl QuizPipeline {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        transcriber: Arc<dyn Transcriber>,
        generator: QuizGenerator,
        store: Store,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            generator,
            store,
            temp_dir,
        }
    }

    /// Build the production pipeline from configuration
    pub fn from_config(config: &Config, store: Store) -> Result<Self> {
        let llm: Arc<dyn LLM> = Arc::from(create_llm(&config.llm)?);

        info!("🔧 Initializing quiz pipeline ({} mode, whisper model {})",
              config.llm.generation_mode, config.transcription.model);

        Ok(Self::new(
            Arc::new(YtDlpFetcher::new(&config.audio)),
            Arc::new(WhisperTranscriber::new(&config.transcription)),
            QuizGenerator::new(llm, config.llm.generation_mode),
            store,
            config.audio.resolved_temp_dir(),
        ))
    }

    /// Run the full pipeline for `raw_url` on behalf of `owner_user_id`
    pub async fn create_quiz(&self, raw_url: &str, owner_user_id: i64) -> Result<Quiz, PipelineError> {
        let start_time = Instant::now();

        let url = canonicalize_video_url(raw_url).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
        info!("🚀 Creating quiz for {} (user {})", url, owner_user_id);

        let temp_audio = TempAudio::create_in(&self.temp_dir).map_err(|e| PipelineError::Io(e.to_string()))?;

        let result = self.run_stages(&url, owner_user_id, &temp_audio).await;
        drop(temp_audio);

        match &result {
            Ok(quiz) => info!("🎉 Quiz {} created in {:.1}s with {} questions",
                              quiz.id, start_time.elapsed().as_secs_f64(), quiz.questions.len()),
            Err(e) => error!("❌ Quiz creation failed at {} stage: {}",
                             e.stage().map_or_else(|| "setup".to_string(), |s| s.to_string()), e),
        }

        result
    }

    async fn run_stages(&self, url: &str, owner_user_id: i64, temp_audio: &TempAudio) -> Result<Quiz, PipelineError> {
        debug!("Stage {}: {}", ProcessingStage::Fetch, url);
        let audio_path = self
            .fetcher
            .fetch_audio(url, temp_audio.prefix())
            .await
            .map_err(|e| PipelineError::DownloadFailure(format!("{:#}", e)))?;

        debug!("Stage {}: {} (model {})", ProcessingStage::Transcribe, audio_path.display(), self.transcriber.model());
        let transcript = self
            .transcriber
            .transcribe(&audio_path)
            .await
            .map_err(|e| PipelineError::TranscriptionFailure(format!("{:#}", e)))?;
        let transcript = transcript.trim();

        debug!("Stage {}: {} transcript chars", ProcessingStage::Generate, transcript.len());
        let raw_response = self
            .generator
            .generate(transcript)
            .await
            .map_err(|e| PipelineError::GenerationFailure(format!("{:#}", e)))?;

        debug!("Stage {}: {} response chars", ProcessingStage::Parse, raw_response.len());
        let generated = parse_quiz_response(self.generator.mode(), &raw_response)
            .map_err(|e| PipelineError::ParseFailure(e.to_string()))?;

        debug!("Stage {}: '{}'", ProcessingStage::Persist, generated.title());
        let draft = generated.into_draft(url);
        self.store
            .create_quiz(owner_user_id, &draft)
            .map_err(|e| PipelineError::PersistenceFailure(format!("{:#}", e)))
    }
}

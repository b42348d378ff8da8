/// Video Quiz API
///
/// Turns a video URL into a stored multiple-choice quiz: the audio track is
/// downloaded, transcribed with Whisper, handed to Gemini and the returned JSON
/// is validated and persisted per user.

pub mod video;
pub mod audio;
pub mod processing;
pub mod config;
pub mod api;
pub mod auth;
pub mod quiz;
pub mod store;
pub mod transcription;
pub mod llm;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::processing::{PipelineError, ProcessingStage, QuizPipeline};
pub use crate::audio::{AudioFetcher, TempAudio, YtDlpFetcher};
pub use crate::auth::{Authenticator, User};
pub use crate::quiz::{Quiz, QuizQuestion, QuizUpdate};
pub use crate::store::Store;
pub use crate::transcription::{Transcriber, WhisperTranscriber};
pub use crate::llm::{LLMConfig, LLM};
pub use crate::llm::quiz_generation::{GenerationMode, QuizGenerator};
pub use crate::video::canonicalize_video_url;

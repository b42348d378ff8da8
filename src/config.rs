use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::llm::quiz_generation::GenerationMode;
use crate::llm::LLMConfig;

/// Configuration for the Video Quiz API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// SQLite database settings
    pub database: DatabaseConfig,

    /// Audio download settings
    pub audio: AudioConfig,

    /// Speech-to-text settings
    pub transcription: TranscriptionConfig,

    /// Generative-language settings
    pub llm: LLMConfig,

    /// Login token settings
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Downloader executable
    pub downloader: String,

    /// Directory for request-scoped temp audio (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    /// Transcoded audio codec
    pub audio_format: String,

    /// Transcoded audio quality
    pub audio_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Speech-to-text executable
    pub binary: String,

    /// Model variant. Fixed per deployment, never chosen by API callers.
    pub model: String,

    /// Language hint for transcription
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of access tokens in seconds
    pub access_token_ttl_seconds: i64,

    /// Lifetime of refresh tokens in seconds
    pub refresh_token_ttl_seconds: i64,

    /// Mark auth cookies `Secure`
    pub secure_cookies: bool,

    /// PBKDF2 iterations for newly hashed passwords
    pub password_iterations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("video-quiz.sqlite3"),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            temp_dir: None,
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
        }
    }
}

impl AudioConfig {
    /// Directory where temp audio prefixes are reserved
    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            binary: "whisper".to_string(),
            model: "turbo".to_string(),
            language: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_seconds: 5 * 60,
            refresh_token_ttl_seconds: 24 * 60 * 60,
            secure_cookies: true,
            password_iterations: 600_000,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file or the default locations,
    /// then apply environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_locations(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    fn from_default_locations() -> Self {
        let config_paths = [
            "video-quiz-api.toml",
            "config/video-quiz-api.toml",
            "/etc/video-quiz-api/config.toml",
        ];

        for path in &config_paths {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("{:#}", e),
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Self::default()
    }

    /// Override selected values from environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(api_key) = std::env::var("VIDEO_QUIZ_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Ok(port) = std::env::var("VIDEO_QUIZ_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow!("invalid VIDEO_QUIZ_PORT '{}': {}", port, e))?;
        }

        if let Ok(database) = std::env::var("VIDEO_QUIZ_DATABASE") {
            self.database.path = PathBuf::from(database);
        }

        if let Ok(mode) = std::env::var("VIDEO_QUIZ_GENERATION_MODE") {
            self.llm.generation_mode = mode.parse()?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be greater than 0"));
        }

        if self.auth.access_token_ttl_seconds <= 0 || self.auth.refresh_token_ttl_seconds <= 0 {
            return Err(anyhow!("token lifetimes must be positive"));
        }

        if self.auth.password_iterations == 0 {
            return Err(anyhow!("auth.password_iterations must be greater than 0"));
        }

        if self.transcription.model.trim().is_empty() {
            return Err(anyhow!("transcription.model must not be empty"));
        }

        if self.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(anyhow!(
                "API key required for the generative-language provider (set llm.api_key or VIDEO_QUIZ_API_KEY)"
            ));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Quiz API Configuration:\n\
            - Listen: {}:{}\n\
            - Database: {}\n\
            - Downloader: {} ({} @ {})\n\
            - Transcriber: {} (model {})\n\
            - LLM model: {}\n\
            - Generation mode: {}",
            self.server.host,
            self.server.port,
            self.database.path.display(),
            self.audio.downloader,
            self.audio.audio_format,
            self.audio.audio_quality,
            self.transcription.binary,
            self.transcription.model,
            self.llm.model,
            self.llm.generation_mode,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn with_generation_mode(mut self, mode: GenerationMode) -> Self {
        self.config.llm.generation_mode = mode;
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.config.auth.secure_cookies = secure;
        self
    }

    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.config.auth.password_iterations = iterations;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.transcription.model, "turbo");
        assert_eq!(config.audio.audio_format, "mp3");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.generation_mode, GenerationMode::MultiQuestion);
        assert_eq!(config.auth.access_token_ttl_seconds, 300);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_port(9000)
            .with_api_key("secret".to_string())
            .with_generation_mode(GenerationMode::SingleQuestion)
            .with_secure_cookies(false)
            .with_password_iterations(1_000)
            .build();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.password_iterations, 1_000);
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.generation_mode, GenerationMode::SingleQuestion);
        assert!(!config.auth.secure_cookies);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_err());

        let config = ConfigBuilder::new().with_api_key("secret".to_string()).build();
        assert!(config.validate().is_ok());

        let config = ConfigBuilder::new()
            .with_api_key("secret".to_string())
            .with_port(0)
            .build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new()
            .with_api_key("secret".to_string())
            .with_password_iterations(0)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8123

            [llm]
            generation_mode = "single_question"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.generation_mode, GenerationMode::SingleQuestion);
        assert_eq!(config.transcription.binary, "whisper");
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = ConfigBuilder::new().with_port(8765).build();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 8765);
        assert_eq!(loaded.llm.generation_mode, config.llm.generation_mode);
    }
}

use serde::{Deserialize, Serialize};

use crate::domain::audio::AudioConfig;

/// Style selector forwarded to the polish service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolishStyle {
    /// Professional and polished, for work and email.
    Formal,
    /// Clean and natural, fixes errors while keeping the speaker's voice.
    #[default]
    Informal,
    /// Friendly and relaxed, for notes and messages.
    Casual,
}

impl PolishStyle {
    /// Wire name sent to the polish service.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolishStyle::Formal => "formal",
            PolishStyle::Informal => "informal",
            PolishStyle::Casual => "casual",
        }
    }
}

/// Session policy thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recordings shorter than this are rejected before any network call.
    pub min_duration_secs: f32,
    /// Polish is skipped for transcripts at or below this many characters.
    pub min_polish_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.5,
            min_polish_chars: 20,
        }
    }
}

/// Cloud service configuration shared by the transcription engine and
/// the polish service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL of the transcription/polish backend.
    pub base_url: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds. Long recordings can take
    /// minutes to transcribe, so this is generous.
    pub request_timeout_secs: u64,
    /// Cleanup style applied by the polish pass.
    pub polish_style: PolishStyle,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.voxnote.app".to_string(),
            connect_timeout_secs: 30,
            request_timeout_secs: 540,
            polish_style: PolishStyle::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub cloud: CloudConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

use thiserror::Error;

/// Domain-level errors for voxnote.
///
/// Display strings double as the user-facing messages carried by the
/// session's `Error` state, so they stay short and free of internals.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not currently recording")]
    NotRecording,

    #[error("Recording too short")]
    RecordingTooShort,

    #[error("Transcription engine is not ready")]
    EngineNotReady,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Text polish failed: {0}")]
    PolishFailed(String),

    #[error("Could not save transcript: {0}")]
    PersistenceFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network request failed: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::PersistenceFailed(err.to_string())
    }
}

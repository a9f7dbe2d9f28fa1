pub mod audio;
pub mod buffer;
pub mod config;
pub mod error;
pub mod session;
pub mod transcript;

pub use audio::{AtomicCaptureState, AudioConfig, AudioEvent, CaptureState};
pub use buffer::AudioBuffer;
pub use config::{AppConfig, CloudConfig, PolishStyle, SessionConfig};
pub use error::DomainError;
pub use session::{SessionState, TranscriptionMode, TranscriptionOutcome};
pub use transcript::Transcript;

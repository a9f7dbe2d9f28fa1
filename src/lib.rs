#![forbid(unsafe_code)]

//! Recording and transcription session core for voice notes.
//!
//! One recording session at a time flows through a single authoritative
//! state machine: Ready -> Recording -> Processing -> Success / Error.
//! The [`app::RecordingSessionManager`] owns that state and coordinates
//! microphone capture, the speech-to-text engine, the optional AI
//! polish pass, history persistence and the platform foreground signal.
//! UI layers observe the session through a watch channel and render
//! whatever state it publishes.
//!
//! Everything the session touches sits behind a port in [`ports`], with
//! default implementations in [`adapters`]; [`app::AppController`]
//! wires the batteries-included stack.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{AppController, RecordingSessionManager, TranscriptionPipeline};
pub use domain::{
    AppConfig, AudioBuffer, AudioConfig, CloudConfig, DomainError, PolishStyle, SessionConfig,
    SessionState, Transcript, TranscriptionMode, TranscriptionOutcome,
};
pub use ports::{
    AudioCapture, ConfigStore, EngineState, HistoryStore, ServiceController, SpeechToText,
    TextPolisher,
};

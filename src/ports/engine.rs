use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{AudioBuffer, DomainError};

/// Speech-to-text engine state machine.
///
/// NotReady -> Initializing -> (Downloading)* -> Ready -> Transcribing -> Ready,
/// with Error reachable from any non-terminal state. Leaving Error
/// requires another `initialize()` call.
///
/// A remote engine passes straight from Initializing to Ready; a
/// local-model engine may spend time in Downloading while it fetches
/// its model asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineState {
    /// No resources held; `initialize()` has not run (or `release()` did).
    NotReady,
    /// Preparing the engine (credential/endpoint validation, model load).
    Initializing,
    /// Fetching a model asset, with download progress (0.0..=100.0).
    Downloading { percent: f32 },
    /// Ready to transcribe.
    Ready,
    /// A transcription call is in flight.
    Transcribing,
    /// Initialization failed; call `initialize()` again to recover.
    Error { message: String },
}

impl EngineState {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready)
    }
}

/// Port for speech-to-text engines.
///
/// The contract is engine-agnostic so a remote HTTP engine and a local
/// model-based engine are interchangeable to the pipeline. All format
/// concerns (WAV container synthesis, wire encoding) are internal to
/// the implementation.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Prepare the engine. Near-instant for remote engines, potentially
    /// a model download for local ones. Idempotent once Ready.
    async fn initialize(&self) -> Result<(), DomainError>;

    /// Convert a finished recording into text.
    ///
    /// Valid only when the engine is Ready (else `EngineNotReady`).
    /// Expected failure modes (empty audio, network failure, non-2xx
    /// response) surface as `TranscriptionFailed` with a short
    /// human-readable reason.
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, DomainError>;

    /// Current engine state.
    fn state(&self) -> EngineState;

    /// Whether the engine can accept a `transcribe` call right now.
    fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Whether this engine sends audio to a remote service.
    fn is_remote(&self) -> bool;

    /// Free held resources and reset to NotReady.
    fn release(&self);
}

use serde::{Deserialize, Serialize};

/// Unified session state for the recording/transcription feature.
///
/// Exactly one variant holds at any time. The state is owned by the
/// session manager (single writer); everything else observes it through
/// a watch channel. UI layers and the foreground-service notification
/// render directly from this.
///
/// Flow: Ready -> Recording -> Processing -> Success / Error -> Ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionState {
    /// Idle and waiting for user input. Mic is inactive.
    Ready,
    /// Actively capturing audio.
    Recording,
    /// Audio captured, pipeline underway. The message is a user-facing
    /// status label ("Stopping...", "Transcribing...", "Polishing...")
    /// overwritten as phases advance.
    Processing(String),
    /// Terminal: transcript available for display/copy.
    Success(String),
    /// Terminal: short human-readable failure cause.
    Error(String),
}

impl SessionState {
    /// Terminal states require an explicit `reset_state` (or a new
    /// recording) to leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Success(_) | SessionState::Error(_))
    }

    /// A session is active while capturing or processing.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Processing(_))
    }

    /// A new recording may begin from Ready or from a terminal state
    /// (starting implicitly acknowledges the previous result).
    #[must_use]
    pub fn can_start_recording(&self) -> bool {
        !self.is_active()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Ready
    }
}

/// Which transcription path a session takes.
///
/// Session-manager-local configuration; changing it mid-session does
/// not affect the recording already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    /// Cloud transcription without AI cleanup.
    #[default]
    Standard,
    /// Cloud transcription followed by an AI polish pass.
    WithAiPolish,
}

impl TranscriptionMode {
    #[must_use]
    pub fn wants_polish(&self) -> bool {
        matches!(self, TranscriptionMode::WithAiPolish)
    }
}

/// Result of a full transcription pipeline run, with provenance flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionOutcome {
    /// Final text (polished when polish ran and succeeded).
    pub text: String,
    /// Whether a remote engine produced the text.
    pub used_remote_engine: bool,
    /// Whether the AI polish pass was applied to `text`.
    pub used_ai_polish: bool,
}

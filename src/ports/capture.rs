use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{AudioBuffer, AudioConfig, AudioEvent, CaptureState, DomainError};

/// Port for microphone capture.
///
/// Implementations own the capture device and the sample accumulator
/// for the lifetime of one recording. Each platform (cpal on desktop,
/// the native audio API on mobile shells) provides its own adapter
/// behind this contract.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the device and start accumulating samples.
    ///
    /// Fails with `PermissionDenied` when the OS has not granted
    /// microphone access, `DeviceUnavailable` when the device cannot be
    /// opened, and `AlreadyRecording` when a capture is in flight.
    async fn start_recording(&self) -> Result<(), DomainError>;

    /// Stop capturing and return the accumulated buffer.
    ///
    /// The buffer contains mono PCM at the configured sample rate. The
    /// accumulator is cleared and the device released. Fails with
    /// `NotRecording` when no capture is active.
    async fn stop_recording(&self) -> Result<AudioBuffer, DomainError>;

    /// Identical teardown to stop, but the accumulated audio is
    /// discarded. Used when the user aborts before processing.
    async fn cancel_recording(&self) -> Result<(), DomainError>;

    /// Non-blocking liveness query.
    fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// Get the current capture state.
    fn state(&self) -> CaptureState;

    /// Get the audio configuration.
    fn config(&self) -> AudioConfig;

    /// Subscribe to capture events (state changes, level updates).
    fn subscribe(&self) -> broadcast::Receiver<AudioEvent>;

    /// Elapsed recording time in seconds, 0.0 when idle.
    fn current_duration(&self) -> f32;

    /// Current input level in dBFS (-60.0..=0.0), -60.0 when idle.
    ///
    /// Advisory reading for live UI feedback; may lag under load.
    fn current_level_dbfs(&self) -> f32;
}

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Audio capture state machine.
///
/// State transitions:
/// - Idle -> Recording (start_recording)
/// - Recording -> Idle (stop_recording returns the buffer, cancel_recording discards it)
///
/// A mid-recording stream failure does not change the state: the stream
/// stops feeding the accumulator and the next stop_recording returns
/// whatever was captured up to the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CaptureState {
    /// Ready to record, no active capture.
    Idle = 0,
    /// Actively capturing audio.
    Recording = 1,
}

impl CaptureState {
    /// Check if recording can be started from this state.
    #[must_use]
    pub fn can_start_recording(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    /// Check if recording can be stopped or cancelled from this state.
    #[must_use]
    pub fn can_stop_recording(&self) -> bool {
        matches!(self, CaptureState::Recording)
    }
}

impl From<u8> for CaptureState {
    fn from(value: u8) -> Self {
        match value {
            1 => CaptureState::Recording,
            _ => CaptureState::Idle,
        }
    }
}

impl From<CaptureState> for u8 {
    fn from(state: CaptureState) -> Self {
        state as u8
    }
}

/// Atomic wrapper for CaptureState for lock-free reads.
#[derive(Debug)]
pub struct AtomicCaptureState(AtomicU8);

impl AtomicCaptureState {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> CaptureState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: CaptureState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Compare and swap, returns true if successful.
    pub fn compare_exchange(&self, current: CaptureState, new: CaptureState) -> bool {
        self.0
            .compare_exchange(current.into(), new.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicCaptureState {
    fn default() -> Self {
        Self::new(CaptureState::Idle)
    }
}

/// Audio capture configuration.
///
/// The format is fixed and shared by the capture side and the engine
/// side: mono, 16-bit signed little-endian PCM at `sample_rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (mono).
    pub channels: u16,
    /// Bits per sample (signed PCM).
    pub bits_per_sample: u16,
    /// Upper bound on a single recording in seconds (accumulator size).
    pub max_duration_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16kHz for speech recognition
            channels: 1,
            bits_per_sample: 16,
            max_duration_secs: 600,
        }
    }
}

impl AudioConfig {
    /// Accumulator capacity in samples.
    pub fn buffer_capacity(&self) -> usize {
        self.max_duration_secs as usize * self.sample_rate as usize
    }

    /// Bytes consumed per second of audio at this format.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }
}

/// Events emitted by the audio capture system.
///
/// These are advisory: the broadcast channel is bounded and slow
/// subscribers miss updates without affecting capture correctness.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AudioEvent {
    /// Capture state changed.
    StateChanged {
        from: CaptureState,
        to: CaptureState,
    },
    /// Input level update for live UI feedback, in dBFS (-60.0..=0.0).
    LevelUpdate {
        dbfs: f32,
    },
    /// A capture error occurred.
    Error {
        message: String,
    },
}

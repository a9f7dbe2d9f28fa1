use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

use crate::domain::{
    AtomicCaptureState, AudioBuffer, AudioConfig, AudioEvent, CaptureState, DomainError,
};
use crate::ports::AudioCapture;

/// Lock-free ring buffer for audio samples.
type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

/// Level reading reported while idle.
const SILENCE_DBFS: f32 = -60.0;

/// Commands sent to the audio thread.
enum CaptureCommand {
    Start {
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<Vec<i16>, DomainError>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Shutdown,
}

/// Audio processing utilities.
mod audio_processing {
    use super::*;

    pub fn default_input_device() -> Result<Device, DomainError> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| DomainError::DeviceUnavailable {
                message: "No default input device available".to_string(),
            })
    }

    /// cpal has no typed permission error; the OS message is the only
    /// signal that a failure was an access denial rather than a busy or
    /// missing device.
    pub fn map_device_error(message: String) -> DomainError {
        let lowered = message.to_lowercase();
        if lowered.contains("permission") || lowered.contains("access denied") {
            DomainError::PermissionDenied
        } else {
            DomainError::DeviceUnavailable { message }
        }
    }

    pub fn build_stream_config(device: &Device) -> Result<(StreamConfig, SampleFormat), DomainError> {
        let supported = device
            .default_input_config()
            .map_err(|e| map_device_error(format!("Failed to get default config: {}", e)))?;

        debug!(
            sample_rate = ?supported.sample_rate(),
            channels = supported.channels(),
            format = ?supported.sample_format(),
            "Device default config"
        );

        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        Ok((config, supported.sample_format()))
    }

    pub fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        target_sample_rate: u32,
        mut producer: RingProducer,
        event_sender: broadcast::Sender<AudioEvent>,
        current_level: Arc<AtomicU32>,
    ) -> Result<Stream, DomainError> {
        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;

        // Level window counted in resampled samples (~100ms).
        let samples_per_update = (target_sample_rate / 10) as usize;
        let mut sample_counter = 0usize;
        let mut level_samples = Vec::with_capacity(samples_per_update);

        let event_sender_err = event_sender.clone();

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    process_samples_i16(
                        data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                        &mut level_samples,
                        &mut sample_counter,
                        samples_per_update,
                        &event_sender,
                        &current_level,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                    let _ = event_sender_err.send(AudioEvent::Error {
                        message: format!("Audio stream error: {}", err),
                    });
                },
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();

                    process_samples_i16(
                        &i16_data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                        &mut level_samples,
                        &mut sample_counter,
                        samples_per_update,
                        &event_sender,
                        &current_level,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                    let _ = event_sender_err.send(AudioEvent::Error {
                        message: format!("Audio stream error: {}", err),
                    });
                },
                None,
            ),
            _ => {
                return Err(DomainError::DeviceUnavailable {
                    message: format!("Unsupported sample format: {:?}", sample_format),
                });
            }
        }
        .map_err(|e| map_device_error(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_samples_i16(
        data: &[i16],
        channels: usize,
        device_sample_rate: u32,
        target_sample_rate: u32,
        producer: &mut RingProducer,
        level_samples: &mut Vec<i16>,
        sample_counter: &mut usize,
        samples_per_update: usize,
        event_sender: &broadcast::Sender<AudioEvent>,
        current_level: &AtomicU32,
    ) {
        // Convert stereo to mono
        let mono_samples: Vec<i16> = if channels > 1 {
            data.chunks(channels)
                .map(|chunk| {
                    let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        } else {
            data.to_vec()
        };

        // Resample if needed
        let resampled = if device_sample_rate != target_sample_rate {
            resample(&mono_samples, device_sample_rate, target_sample_rate)
        } else {
            mono_samples
        };

        // Write to the accumulator ring; samples past capacity are dropped
        let _ = producer.push_slice(&resampled);

        // Update level periodically
        level_samples.extend_from_slice(&resampled);
        *sample_counter += resampled.len();

        if *sample_counter >= samples_per_update {
            let dbfs = rms_to_dbfs(calculate_rms(level_samples));
            current_level.store(dbfs.to_bits(), Ordering::Relaxed);
            let _ = event_sender.send(AudioEvent::LevelUpdate { dbfs });
            level_samples.clear();
            *sample_counter = 0;
        }
    }

    pub fn calculate_rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();
        (rms / 32767.0).min(1.0) as f32
    }

    /// Normalize an RMS level (0.0..=1.0) to dBFS clamped to [-60, 0].
    pub fn rms_to_dbfs(rms: f32) -> f32 {
        if rms <= 0.0 {
            return SILENCE_DBFS;
        }
        (20.0 * rms.log10()).clamp(SILENCE_DBFS, 0.0)
    }

    pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as i16
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0
            };
            output.push(sample);
        }
        output
    }
}

/// Audio thread runner - creates the Stream on the audio thread.
fn audio_thread_main(
    config: AudioConfig,
    state: Arc<AtomicCaptureState>,
    event_sender: broadcast::Sender<AudioEvent>,
    current_level: Arc<AtomicU32>,
    mut cmd_rx: mpsc::Receiver<CaptureCommand>,
) {
    // Stream is kept here on the audio thread (not Send)
    let mut stream: Option<Stream> = None;
    let mut ring_consumer: Option<RingConsumer> = None;

    // Shared teardown for Stop and Cancel: release the device, reset
    // the level meter, drain the ring and transition back to Idle.
    let teardown = |stream: &mut Option<Stream>,
                    ring_consumer: &mut Option<RingConsumer>,
                    state: &AtomicCaptureState,
                    current_level: &AtomicU32,
                    event_sender: &broadcast::Sender<AudioEvent>|
     -> Result<Vec<i16>, DomainError> {
        if !state.load().can_stop_recording() {
            return Err(DomainError::NotRecording);
        }

        // Stop and drop the stream
        stream.take();

        let mut consumer = ring_consumer.take().ok_or(DomainError::NotRecording)?;

        let available = consumer.occupied_len();
        let mut samples = vec![0i16; available];
        let read = consumer.pop_slice(&mut samples);
        samples.truncate(read);

        current_level.store(SILENCE_DBFS.to_bits(), Ordering::Relaxed);

        state.store(CaptureState::Idle);
        let _ = event_sender.send(AudioEvent::StateChanged {
            from: CaptureState::Recording,
            to: CaptureState::Idle,
        });

        Ok(samples)
    };

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Start { reply } => {
                let result = (|| -> Result<(), DomainError> {
                    if !state.load().can_start_recording() {
                        return Err(DomainError::AlreadyRecording);
                    }

                    let device = audio_processing::default_input_device()?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                    let (stream_config, sample_format) =
                        audio_processing::build_stream_config(&device)?;

                    let ring = HeapRb::<i16>::new(config.buffer_capacity());
                    let (producer, consumer) = ring.split();

                    let new_stream = audio_processing::build_stream(
                        &device,
                        &stream_config,
                        sample_format,
                        config.sample_rate,
                        producer,
                        event_sender.clone(),
                        Arc::clone(&current_level),
                    )?;

                    new_stream
                        .play()
                        .map_err(|e| audio_processing::map_device_error(format!(
                            "Failed to start stream: {}",
                            e
                        )))?;

                    stream = Some(new_stream);
                    ring_consumer = Some(consumer);

                    state.store(CaptureState::Recording);
                    let _ = event_sender.send(AudioEvent::StateChanged {
                        from: CaptureState::Idle,
                        to: CaptureState::Recording,
                    });

                    info!(device = %device_name, "Recording started");
                    Ok(())
                })();
                let _ = reply.send(result);
            }
            CaptureCommand::Stop { reply } => {
                let result = teardown(
                    &mut stream,
                    &mut ring_consumer,
                    &state,
                    &current_level,
                    &event_sender,
                );
                if let Ok(samples) = &result {
                    info!(samples = samples.len(), "Recording stopped");
                }
                let _ = reply.send(result);
            }
            CaptureCommand::Cancel { reply } => {
                let result = teardown(
                    &mut stream,
                    &mut ring_consumer,
                    &state,
                    &current_level,
                    &event_sender,
                )
                .map(|samples| {
                    info!(discarded_samples = samples.len(), "Recording cancelled");
                });
                let _ = reply.send(result);
            }
            CaptureCommand::Shutdown => {
                break;
            }
        }
    }
    debug!("Audio thread shutting down");
}

/// cpal-based audio capture implementation.
///
/// Uses a dedicated audio thread to handle the non-Send Stream type;
/// start/stop/cancel are relayed as commands with oneshot replies. The
/// stream callback is the producer side of an SPSC ring whose consumer
/// is drained only at stop/cancel, so accumulator writes never race the
/// read-and-reset.
pub struct CpalAudioCapture {
    config: AudioConfig,
    state: Arc<AtomicCaptureState>,
    event_sender: broadcast::Sender<AudioEvent>,
    current_level: Arc<AtomicU32>,
    recording_start: Mutex<Option<Instant>>,
    cmd_tx: mpsc::Sender<CaptureCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalAudioCapture {
    /// Create a new CpalAudioCapture with default configuration.
    pub fn new() -> Result<Self, DomainError> {
        Self::with_config(AudioConfig::default())
    }

    /// Create a new CpalAudioCapture with custom configuration.
    pub fn with_config(config: AudioConfig) -> Result<Self, DomainError> {
        let state = Arc::new(AtomicCaptureState::default());
        let (event_sender, _) = broadcast::channel(64);
        let current_level = Arc::new(AtomicU32::new(SILENCE_DBFS.to_bits()));

        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let thread_config = config.clone();
        let thread_state = Arc::clone(&state);
        let thread_event_sender = event_sender.clone();
        let thread_level = Arc::clone(&current_level);

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                audio_thread_main(
                    thread_config,
                    thread_state,
                    thread_event_sender,
                    thread_level,
                    cmd_rx,
                )
            })
            .map_err(|e| DomainError::DeviceUnavailable {
                message: format!("Failed to spawn audio thread: {}", e),
            })?;

        info!(
            sample_rate = config.sample_rate,
            max_duration = config.max_duration_secs,
            "CpalAudioCapture initialized"
        );

        Ok(Self {
            config,
            state,
            event_sender,
            current_level,
            recording_start: Mutex::new(None),
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    async fn send_command<T>(
        &self,
        cmd: CaptureCommand,
        reply_rx: oneshot::Receiver<Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| DomainError::DeviceUnavailable {
                message: "Audio thread not running".to_string(),
            })?;

        reply_rx.await.map_err(|_| DomainError::DeviceUnavailable {
            message: "Audio thread did not respond".to_string(),
        })?
    }
}

impl Drop for CpalAudioCapture {
    fn drop(&mut self) {
        // Best-effort shutdown; try_send avoids blocking inside a runtime
        let _ = self.cmd_tx.try_send(CaptureCommand::Shutdown);

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl AudioCapture for CpalAudioCapture {
    async fn start_recording(&self) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(CaptureCommand::Start { reply: reply_tx }, reply_rx)
            .await?;

        *self.recording_start.lock() = Some(Instant::now());
        Ok(())
    }

    async fn stop_recording(&self) -> Result<AudioBuffer, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let samples = self
            .send_command(CaptureCommand::Stop { reply: reply_tx }, reply_rx)
            .await?;

        let duration = self
            .recording_start
            .lock()
            .take()
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0);

        let mut buffer = AudioBuffer::with_capacity(self.config.sample_rate, samples.len());
        buffer.push_samples(&samples);

        info!(
            duration_secs = duration,
            samples = buffer.len(),
            "Recording stopped"
        );

        Ok(buffer)
    }

    async fn cancel_recording(&self) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(CaptureCommand::Cancel { reply: reply_tx }, reply_rx)
            .await?;

        *self.recording_start.lock() = None;
        Ok(())
    }

    fn state(&self) -> CaptureState {
        self.state.load()
    }

    fn config(&self) -> AudioConfig {
        self.config.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.event_sender.subscribe()
    }

    fn current_duration(&self) -> f32 {
        self.recording_start
            .lock()
            .as_ref()
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    fn current_level_dbfs(&self) -> f32 {
        f32::from_bits(self.current_level.load(Ordering::Relaxed))
    }
}

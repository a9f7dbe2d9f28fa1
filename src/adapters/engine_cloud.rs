use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{AudioBuffer, CloudConfig, DomainError};
use crate::ports::{EngineState, SpeechToText};

/// Request wrapper expected by the backend functions.
#[derive(Debug, Serialize)]
struct FunctionRequest<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct TranscribePayload {
    /// Base64-encoded WAV container wrapping the recording.
    audio: String,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    #[serde(default)]
    result: Option<FunctionResult>,
}

#[derive(Debug, Deserialize)]
struct FunctionResult {
    #[serde(default)]
    text: String,
}

/// Remote HTTP speech-to-text engine.
///
/// `initialize()` only validates the configured endpoint, so the engine
/// moves from NotReady to Ready near-instantly; the Downloading state
/// of the contract is never entered. A failed transcribe call returns
/// the engine to Ready; transient network errors do not require
/// re-initialization.
pub struct CloudSttEngine {
    client: Client,
    config: CloudConfig,
    state: RwLock<EngineState>,
}

impl CloudSttEngine {
    pub fn new(config: CloudConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("voxnote/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DomainError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            state: RwLock::new(EngineState::NotReady),
        })
    }

    fn transcribe_url(&self) -> String {
        format!("{}/transcribe", self.config.base_url.trim_end_matches('/'))
    }

    async fn transcribe_inner(&self, audio: &AudioBuffer) -> Result<String, DomainError> {
        if audio.is_empty() {
            return Err(DomainError::TranscriptionFailed(
                "No audio captured".to_string(),
            ));
        }

        let wav = encode_wav(audio)?;
        debug!(
            pcm_samples = audio.len(),
            wav_bytes = wav.len(),
            duration_secs = audio.duration_secs(),
            "Uploading audio for transcription"
        );

        let request = FunctionRequest {
            data: TranscribePayload {
                audio: BASE64.encode(&wav),
            },
        };

        let response = self
            .client
            .post(self.transcribe_url())
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::TranscriptionFailed(describe_status(
                status.as_u16(),
            )));
        }

        let body: FunctionResponse = response
            .json()
            .await
            .map_err(|e| DomainError::TranscriptionFailed(format!("Malformed response: {}", e)))?;

        let text = body.result.map(|r| r.text).unwrap_or_default();

        info!(text_len = text.len(), "Transcription complete");
        Ok(text.trim().to_string())
    }
}

/// Map reqwest transport failures to short user-facing reasons.
fn map_transport_error(err: reqwest::Error) -> DomainError {
    let reason = if err.is_connect() {
        "Could not reach the transcription service. Check your connection.".to_string()
    } else if err.is_timeout() {
        "The transcription service did not respond in time.".to_string()
    } else {
        format!("Network error: {}", err)
    };
    DomainError::TranscriptionFailed(reason)
}

fn describe_status(status: u16) -> String {
    match status {
        401 | 403 => "The transcription service rejected the request. Check your account.".to_string(),
        429 => "Too many requests. Please wait a moment and try again.".to_string(),
        500..=599 => "The transcription service is experiencing issues. Try again later.".to_string(),
        other => format!("The transcription service returned status {}", other),
    }
}

/// Wrap raw PCM samples in a canonical 44-byte WAV container
/// (RIFF/WAVE, `fmt ` chunk with PCM format code 1, `data` chunk).
fn encode_wav(audio: &AudioBuffer) -> Result<Vec<u8>, DomainError> {
    let spec = hound::WavSpec {
        channels: audio.channels() as u16,
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| DomainError::TranscriptionFailed(format!("WAV encoding failed: {}", e)))?;

    for &sample in audio.samples() {
        writer
            .write_sample(sample)
            .map_err(|e| DomainError::TranscriptionFailed(format!("WAV encoding failed: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| DomainError::TranscriptionFailed(format!("WAV encoding failed: {}", e)))?;

    Ok(cursor.into_inner())
}

#[async_trait]
impl SpeechToText for CloudSttEngine {
    async fn initialize(&self) -> Result<(), DomainError> {
        {
            let mut state = self.state.write();
            if matches!(*state, EngineState::Ready) {
                return Ok(());
            }
            *state = EngineState::Initializing;
        }

        match Url::parse(&self.config.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                *self.state.write() = EngineState::Ready;
                info!(base_url = %self.config.base_url, "Cloud engine ready");
                Ok(())
            }
            _ => {
                let message = format!("Invalid service URL: {}", self.config.base_url);
                *self.state.write() = EngineState::Error {
                    message: message.clone(),
                };
                warn!(base_url = %self.config.base_url, "Cloud engine initialization failed");
                Err(DomainError::Config(message))
            }
        }
    }

    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, DomainError> {
        {
            let mut state = self.state.write();
            if !matches!(*state, EngineState::Ready) {
                return Err(DomainError::EngineNotReady);
            }
            *state = EngineState::Transcribing;
        }

        let result = self.transcribe_inner(audio).await;

        // Expected failures do not poison the engine
        *self.state.write() = EngineState::Ready;
        result
    }

    fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn release(&self) {
        *self.state.write() = EngineState::NotReady;
        debug!("Cloud engine released");
    }
}

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    AudioBuffer, DomainError, SessionConfig, TranscriptionMode, TranscriptionOutcome,
};
use crate::ports::{SpeechToText, TextPolisher};

/// Transcription orchestrator.
///
/// Drives one finished recording through engine selection and the
/// optional polish pass. Polish is best-effort: its failure degrades to
/// the unpolished engine output and never fails the run. The duration
/// gate fires before any network activity.
pub struct TranscriptionPipeline {
    engine: Arc<dyn SpeechToText>,
    polisher: Arc<dyn TextPolisher>,
    policy: SessionConfig,
}

impl TranscriptionPipeline {
    pub fn new(
        engine: Arc<dyn SpeechToText>,
        polisher: Arc<dyn TextPolisher>,
        policy: SessionConfig,
    ) -> Self {
        Self {
            engine,
            polisher,
            policy,
        }
    }

    /// Run the full pipeline on a captured buffer.
    ///
    /// `on_progress` receives a user-facing label at each phase change.
    pub async fn run(
        &self,
        audio: &AudioBuffer,
        mode: TranscriptionMode,
        on_progress: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<TranscriptionOutcome, DomainError> {
        let duration = audio.duration_secs();
        if duration < self.policy.min_duration_secs {
            debug!(duration_secs = duration, "Recording below minimum duration");
            return Err(DomainError::RecordingTooShort);
        }

        // Remote engines initialize near-instantly; doing it lazily here
        // also covers recovery after a release() or an earlier failure.
        if !self.engine.is_ready() {
            self.engine.initialize().await?;
        }

        on_progress("Transcribing...");
        let text = self.engine.transcribe(audio).await?;
        let text = text.trim().to_string();

        let mut used_ai_polish = false;
        let text = if mode.wants_polish() && text.chars().count() > self.policy.min_polish_chars {
            on_progress("Polishing...");
            match self.polisher.polish(&text).await {
                Some(polished) => {
                    used_ai_polish = true;
                    polished
                }
                None => text,
            }
        } else {
            text
        };

        info!(
            duration_secs = duration,
            text_len = text.len(),
            used_ai_polish,
            "Pipeline complete"
        );

        Ok(TranscriptionOutcome {
            text,
            used_remote_engine: self.engine.is_remote(),
            used_ai_polish,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::ports::EngineState;

    struct MockEngine {
        result: Result<String, String>,
        transcribe_calls: AtomicUsize,
    }

    impl MockEngine {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(text.to_string()),
                transcribe_calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(reason.to_string()),
                transcribe_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.transcribe_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechToText for MockEngine {
        async fn initialize(&self) -> Result<(), DomainError> {
            Ok(())
        }

        async fn transcribe(&self, _audio: &AudioBuffer) -> Result<String, DomainError> {
            self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(DomainError::TranscriptionFailed)
        }

        fn state(&self) -> EngineState {
            EngineState::Ready
        }

        fn is_remote(&self) -> bool {
            true
        }

        fn release(&self) {}
    }

    struct MockPolisher {
        result: Option<String>,
        polish_calls: AtomicUsize,
    }

    impl MockPolisher {
        fn returning(text: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Some(text.to_string()),
                polish_calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: None,
                polish_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.polish_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextPolisher for MockPolisher {
        async fn polish(&self, _text: &str) -> Option<String> {
            self.polish_calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn seconds_of_silence(secs: f32) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(16000);
        buffer.push_samples(&vec![0i16; (secs * 16000.0) as usize]);
        buffer
    }

    fn pipeline(
        engine: Arc<MockEngine>,
        polisher: Arc<MockPolisher>,
    ) -> TranscriptionPipeline {
        TranscriptionPipeline::new(engine, polisher, SessionConfig::default())
    }

    fn no_progress() -> impl Fn(&str) + Send + Sync {
        |_msg: &str| {}
    }

    const LONG_TEXT: &str = "this transcript is certainly long enough for polish";

    #[tokio::test]
    async fn test_short_recording_never_reaches_engine() {
        let engine = MockEngine::returning("never seen");
        let polisher = MockPolisher::failing();
        let pipeline = pipeline(Arc::clone(&engine), polisher);

        let result = pipeline
            .run(&seconds_of_silence(0.2), TranscriptionMode::Standard, &no_progress())
            .await;

        assert!(matches!(result, Err(DomainError::RecordingTooShort)));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_standard_mode_never_polishes() {
        let engine = MockEngine::returning("hello world");
        let polisher = MockPolisher::returning("Hello, world!");
        let pipeline = pipeline(engine, Arc::clone(&polisher));

        let outcome = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::Standard, &no_progress())
            .await
            .unwrap();

        assert_eq!(outcome.text, "hello world");
        assert!(outcome.used_remote_engine);
        assert!(!outcome.used_ai_polish);
        assert_eq!(polisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_polish_applied_when_requested() {
        let engine = MockEngine::returning(LONG_TEXT);
        let polisher = MockPolisher::returning("Polished output.");
        let pipeline = pipeline(engine, Arc::clone(&polisher));

        let outcome = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::WithAiPolish, &no_progress())
            .await
            .unwrap();

        assert_eq!(outcome.text, "Polished output.");
        assert!(outcome.used_ai_polish);
        assert_eq!(polisher.calls(), 1);
    }

    #[tokio::test]
    async fn test_polish_failure_falls_back_to_engine_text() {
        let engine = MockEngine::returning(LONG_TEXT);
        let polisher = MockPolisher::failing();
        let pipeline = pipeline(engine, Arc::clone(&polisher));

        let outcome = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::WithAiPolish, &no_progress())
            .await
            .unwrap();

        assert_eq!(outcome.text, LONG_TEXT);
        assert!(!outcome.used_ai_polish);
        assert_eq!(polisher.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_transcript_skips_polish() {
        let engine = MockEngine::returning("short phrase");
        let polisher = MockPolisher::returning("never used");
        let pipeline = pipeline(engine, Arc::clone(&polisher));

        let outcome = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::WithAiPolish, &no_progress())
            .await
            .unwrap();

        assert_eq!(outcome.text, "short phrase");
        assert!(!outcome.used_ai_polish);
        assert_eq!(polisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_transcript_passes_through() {
        let engine = MockEngine::returning("");
        let polisher = MockPolisher::returning("never used");
        let pipeline = pipeline(engine, Arc::clone(&polisher));

        let outcome = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::WithAiPolish, &no_progress())
            .await
            .unwrap();

        assert_eq!(outcome.text, "");
        assert!(!outcome.used_ai_polish);
        assert_eq!(polisher.calls(), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates_verbatim() {
        let engine = MockEngine::failing("service exploded");
        let polisher = MockPolisher::returning("never used");
        let pipeline = pipeline(engine, polisher);

        let result = pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::Standard, &no_progress())
            .await;

        match result {
            Err(DomainError::TranscriptionFailed(reason)) => {
                assert_eq!(reason, "service exploded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_progress_messages_in_order() {
        let engine = MockEngine::returning(LONG_TEXT);
        let polisher = MockPolisher::returning("Polished output.");
        let pipeline = pipeline(engine, polisher);

        let messages = Mutex::new(Vec::new());
        let on_progress = |msg: &str| messages.lock().push(msg.to_string());

        pipeline
            .run(&seconds_of_silence(2.0), TranscriptionMode::WithAiPolish, &on_progress)
            .await
            .unwrap();

        assert_eq!(*messages.lock(), vec!["Transcribing...", "Polishing..."]);
    }
}

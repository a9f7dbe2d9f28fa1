use async_trait::async_trait;

/// Port for the optional AI text-cleanup pass.
///
/// Polish is best-effort by contract: implementations return `None` on
/// any failure (and for blank or trivially short input) so the caller
/// falls back to the unpolished text. A polish failure is never allowed
/// to fail the transcription that produced its input.
#[async_trait]
pub trait TextPolisher: Send + Sync {
    /// Return an improved version of `text`, or `None` when polish was
    /// skipped or failed.
    async fn polish(&self, text: &str) -> Option<String>;
}

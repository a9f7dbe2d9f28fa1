use async_trait::async_trait;

use crate::domain::{DomainError, Transcript};

/// Port for transcript history persistence.
///
/// Ordering of `list` is owned by the store (newest first); the session
/// manager never sorts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All saved transcripts, newest first.
    async fn list(&self) -> Result<Vec<Transcript>, DomainError>;

    /// Persist a new transcript and return it with its assigned id.
    async fn insert(&self, timestamp: &str, text: &str) -> Result<Transcript, DomainError>;

    /// Replace the text of an existing transcript.
    async fn update(&self, id: i64, text: &str) -> Result<(), DomainError>;

    /// Delete a transcript.
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
}

use serde::{Deserialize, Serialize};

/// A saved voice note.
///
/// Created when a session completes with non-blank text, edited and
/// deleted explicitly through the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Store-assigned identifier.
    pub id: i64,
    /// RFC 3339 timestamp of when the transcript was created.
    pub timestamp: String,
    /// The transcribed text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_serde_roundtrip() {
        let transcript = Transcript {
            id: 7,
            timestamp: "2025-03-01T10:30:00+00:00".to_string(),
            text: "hello world".to_string(),
        };

        let json = serde_json::to_string(&transcript).unwrap();
        let restored: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, transcript);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recording as reported by the backend.  Records are immutable once
/// fetched; the client only ever replaces its cached list wholesale with a
/// fresh snapshot from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingRecord {
    /// Unique identifier — the backend keys play/reprocess/delete on this.
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl RecordingRecord {
    /// A transcript counts only when present and non-blank.  Whitespace-only
    /// transcripts render the placeholder and disable the copy control.
    pub fn has_transcript(&self) -> bool {
        self.transcript
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Ordered list of recordings.  Ordering is owned by the backend (newest
/// first by convention) and must be preserved verbatim — never re-sort.
pub type HistorySnapshot = Vec<RecordingRecord>;

//! Utterances: the unit of speech moved through the playback queue

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identifier for an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(u64);

impl UtteranceId {
    fn next() -> Self {
        UtteranceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One chat line to be read aloud
///
/// Immutable once created. Retries replay the same utterance; it is never
/// put back into the queue.
#[derive(Debug, Clone)]
pub struct Utterance {
    id: UtteranceId,
    text: String,
    speaker_name: String,
    enqueued_at: Instant,
}

impl Utterance {
    /// Create an utterance, or `None` if the text is blank
    pub fn new(speaker_name: impl Into<String>, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            id: UtteranceId::next(),
            text: trimmed.to_string(),
            speaker_name: speaker_name.into(),
            enqueued_at: Instant::now(),
        })
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Text handed to the speech engine
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker_name(&self) -> &str {
        &self.speaker_name
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Length used by the timeout policy, in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

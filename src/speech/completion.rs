//! One-shot completion handle shared between an engine and the speaker
//!
//! Platform engines report progress through callbacks (begin, end, stop,
//! error). The speaker wants a single awaited result. A [`Completion`] is
//! the engine-side half: it can be cloned into callbacks and resolved from
//! any of them, but only the first resolution wins. [`PendingSpeech`] is the
//! speaker-side half that is awaited.

use crate::error::SpeakError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type Outcome = std::result::Result<(), SpeakError>;

struct Shared {
    started: Arc<AtomicBool>,
    sender: Mutex<Option<oneshot::Sender<Outcome>>>,
}

/// Engine-side handle for reporting how an utterance ended
#[derive(Clone)]
pub struct Completion {
    shared: Arc<Shared>,
}

/// Speaker-side handle awaiting the terminal engine event
pub struct PendingSpeech {
    started: Arc<AtomicBool>,
    receiver: oneshot::Receiver<Outcome>,
}

impl Completion {
    /// Create a linked completion/pending pair
    pub fn pair() -> (Completion, PendingSpeech) {
        let (sender, receiver) = oneshot::channel();
        let started = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            started: Arc::clone(&started),
            sender: Mutex::new(Some(sender)),
        });
        (Completion { shared }, PendingSpeech { started, receiver })
    }

    /// Record that audio actually began
    pub fn mark_started(&self) {
        self.shared.started.store(true, Ordering::Release);
    }

    /// Resolve as spoken. Returns false if already resolved.
    pub fn succeed(&self) -> bool {
        self.resolve(Ok(()))
    }

    /// Resolve as failed. Returns false if already resolved.
    pub fn fail(&self, error: SpeakError) -> bool {
        self.resolve(Err(error))
    }

    pub fn is_resolved(&self) -> bool {
        self.lock_sender().is_none()
    }

    fn resolve(&self, outcome: Outcome) -> bool {
        match self.lock_sender().take() {
            // The receiver may already be gone (speaker timed out); that still
            // counts as the single resolution.
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    fn lock_sender(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<Outcome>>> {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PendingSpeech {
    /// Whether the engine reported that speech began
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Wait for the terminal event
    ///
    /// If every [`Completion`] clone is dropped unresolved, the engine lost
    /// track of the utterance and this reports an engine error.
    pub async fn wait(&mut self) -> Outcome {
        match (&mut self.receiver).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SpeakError::Engine(
                "engine dropped the utterance without reporting".to_string(),
            )),
        }
    }
}

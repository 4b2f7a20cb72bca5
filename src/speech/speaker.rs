//! Retrying, single-flight speaker
//!
//! Wraps a [`SpeechEngine`] so that each utterance ends in exactly one
//! [`SpeakOutcome`]. Engine errors are retried with a fixed backoff, stuck
//! utterances are caught by a per-utterance timeout, and `cancel` aborts
//! whatever is in flight. None of these errors escape to the caller.

use crate::error::SpeakError;
use crate::speech::{Completion, SpeechEngine};
use crate::utterance::Utterance;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Retry and timeout knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_backoff: Duration,
    /// Timeout budget per character of text
    pub timeout_per_char: Duration,
    /// Timeout floor
    pub min_timeout: Duration,
}

impl Default for SpeakerPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            timeout_per_char: Duration::from_millis(100),
            min_timeout: Duration::from_millis(5000),
        }
    }
}

impl SpeakerPolicy {
    /// Deadline for one attempt: `max(chars × per_char, min_timeout)`
    pub fn timeout_for(&self, utterance: &Utterance) -> Duration {
        let chars = u32::try_from(utterance.char_len()).unwrap_or(u32::MAX);
        self.timeout_per_char
            .checked_mul(chars)
            .unwrap_or(Duration::MAX)
            .max(self.min_timeout)
    }
}

/// Terminal result of one `speak` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Spoken, possibly after retries
    Spoken { attempts: u32 },
    /// Every attempt failed; the utterance is dropped
    Failed { attempts: u32, error: SpeakError },
    /// The engine reported a deliberate interruption
    Interrupted,
    /// `cancel` was called while this utterance was in flight
    Cancelled,
    /// No speech capability; nothing will ever be spoken
    Unavailable(String),
    /// Another utterance already owns the speaker
    Busy,
}

/// Handle that resolves when [`RetryingSpeaker::cancel`] is called
///
/// Taken before deciding to speak, so a cancel that races the decision is
/// still observed.
pub struct CancelSignal {
    rx: watch::Receiver<u64>,
}

impl CancelSignal {
    async fn cancelled(&mut self) {
        // An error means the speaker is gone, which also ends the utterance
        let _ = self.rx.changed().await;
    }

    fn is_cancelled(&self) -> bool {
        self.rx.has_changed().unwrap_or(true)
    }
}

/// Clears the busy flag when a `speak` call ends, including on drop
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared handle to the engine; locked only for non-blocking engine calls
type SharedEngine = Arc<Mutex<Box<dyn SpeechEngine>>>;

/// Speaker with bounded retry, timeout detection and cancellation
pub struct RetryingSpeaker {
    engine: SharedEngine,
    policy: SpeakerPolicy,
    busy: AtomicBool,
    cancel_epoch: watch::Sender<u64>,
}

impl RetryingSpeaker {
    pub fn new(engine: Box<dyn SpeechEngine>, policy: SpeakerPolicy) -> Self {
        let (cancel_epoch, _) = watch::channel(0);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            policy,
            busy: AtomicBool::new(false),
            cancel_epoch,
        }
    }

    pub fn policy(&self) -> &SpeakerPolicy {
        &self.policy
    }

    /// Whether an utterance is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Subscribe to future `cancel` calls
    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.cancel_epoch.subscribe(),
        }
    }

    /// Stop engine audio and abort any in-flight `speak`
    pub fn cancel(&self) {
        self.cancel_epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        self.lock_engine().cancel_all();
    }

    /// Speak an utterance to completion
    pub async fn speak(&self, utterance: &Utterance) -> SpeakOutcome {
        let signal = self.cancel_signal();
        self.speak_until_cancelled(utterance, signal).await
    }

    /// Speak an utterance, aborting when `signal` observes a cancel
    pub async fn speak_until_cancelled(
        &self,
        utterance: &Utterance,
        mut signal: CancelSignal,
    ) -> SpeakOutcome {
        if self.busy.swap(true, Ordering::AcqRel) {
            warn!("Speaker busy; refusing {}", utterance.id());
            return SpeakOutcome::Busy;
        }
        let _busy = BusyGuard(&self.busy);

        if signal.is_cancelled() {
            return SpeakOutcome::Cancelled;
        }

        let limit = self.policy.timeout_for(utterance);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    debug!("{} cancelled during attempt {}", utterance.id(), attempts);
                    return SpeakOutcome::Cancelled;
                }
                result = self.attempt(utterance, limit) => result,
            };

            let error = match result {
                Ok(()) => {
                    if attempts > 1 {
                        info!("{} spoken after {} attempts", utterance.id(), attempts);
                    }
                    return SpeakOutcome::Spoken { attempts };
                }
                Err(SpeakError::Interrupted) => {
                    debug!("{} interrupted", utterance.id());
                    return SpeakOutcome::Interrupted;
                }
                Err(SpeakError::EngineUnavailable(reason)) => {
                    return SpeakOutcome::Unavailable(reason);
                }
                Err(error) => error,
            };

            if attempts > self.policy.max_retries {
                warn!(
                    "Dropping {} after {} attempts: {}",
                    utterance.id(),
                    attempts,
                    error
                );
                return SpeakOutcome::Failed { attempts, error };
            }

            warn!(
                "Attempt {} for {} failed ({}); retrying in {:?}",
                attempts,
                utterance.id(),
                error,
                self.policy.retry_backoff
            );
            tokio::select! {
                biased;
                _ = signal.cancelled() => return SpeakOutcome::Cancelled,
                _ = tokio::time::sleep(self.policy.retry_backoff) => {}
            }
        }
    }

    /// One engine attempt: start, then wait for a terminal event or the deadline
    async fn attempt(
        &self,
        utterance: &Utterance,
        limit: Duration,
    ) -> std::result::Result<(), SpeakError> {
        let (completion, mut pending) = Completion::pair();
        {
            let mut engine = self.lock_engine();
            // Engines can carry stale state from an earlier utterance
            engine.cancel_all();
            debug!("{} starting {} on {}", engine.name(), utterance.id(), utterance.text());
            engine.start(utterance.text(), completion)?;
        }

        match tokio::time::timeout(limit, pending.wait()).await {
            Ok(result) => result,
            Err(_) if pending.has_started() => {
                debug!(
                    "{} still unconfirmed after {:?} but speech began; counting as spoken",
                    utterance.id(),
                    limit
                );
                Ok(())
            }
            Err(_) => Err(SpeakError::Timeout(
                u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, Box<dyn SpeechEngine>> {
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_floor() {
        let policy = SpeakerPolicy::default();
        let short = Utterance::new("ana", "hola").unwrap();
        assert_eq!(policy.timeout_for(&short), Duration::from_millis(5000));
    }

    #[test]
    fn test_timeout_scales_with_length() {
        let policy = SpeakerPolicy::default();
        let long = Utterance::new("ana", "a".repeat(80)).unwrap();
        assert_eq!(policy.timeout_for(&long), Duration::from_millis(8000));
    }

    #[test]
    fn test_default_policy() {
        let policy = SpeakerPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.retry_backoff, Duration::from_millis(500));
    }
}

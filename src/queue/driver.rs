//! Queue driver: the single loop that turns queued utterances into speech
//!
//! Producers call [`QueueDriver::enqueue`], [`QueueDriver::disable`] and
//! friends from any task. Those calls only touch the queue slots under a
//! short lock and never wait on speech. Exactly one spawned task per driver
//! moves utterances between slots and invokes the speaker, so at most one
//! utterance is ever audible. The loop sleeps on a [`Notify`] while idle and
//! is woken by the enqueue that makes the queue non-empty.

use crate::queue::playback::{Admission, PlaybackQueue};
use crate::speech::{RetryingSpeaker, SpeakOutcome};
use crate::utterance::Utterance;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Whether the driver currently owns the speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Speaking,
}

/// Read-only snapshot published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub state: DriverState,
    /// An utterance holds the active slot (possibly not yet picked up)
    pub active: bool,
    /// Utterances waiting behind the active one (0 or 1)
    pub depth: usize,
    pub enabled: bool,
    /// False once the engine reported that no voice exists
    pub available: bool,
}

/// Driver timing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPolicy {
    /// Pause between the end of one utterance and the start of the next
    pub cooldown: Duration,
    /// Whether playback starts enabled
    pub start_enabled: bool,
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(200),
            start_enabled: true,
        }
    }
}

struct Control {
    queue: PlaybackQueue,
    state: DriverState,
    available: bool,
    stopping: bool,
}

impl Control {
    fn status(&self) -> QueueStatus {
        QueueStatus {
            state: self.state,
            active: self.queue.active().is_some(),
            depth: self.queue.depth(),
            enabled: self.queue.is_enabled(),
            available: self.available,
        }
    }

    /// Drop everything queued and stop admitting
    fn reset(&mut self) {
        self.queue.clear();
        self.queue.set_enabled(false);
        self.state = DriverState::Idle;
    }
}

struct Inner {
    control: Mutex<Control>,
    speaker: RetryingSpeaker,
    wake: Notify,
    status: watch::Sender<QueueStatus>,
    policy: DriverPolicy,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, control: &Control) {
        let next = control.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Returns whether the loop should cool down and advance the queue
    fn settle(&self, utterance: &Utterance, outcome: &SpeakOutcome) -> bool {
        match outcome {
            SpeakOutcome::Spoken { attempts } => {
                debug!("{} spoken ({} attempts)", utterance.id(), attempts);
                true
            }
            SpeakOutcome::Failed { attempts, error } => {
                info!(
                    "Skipping {} from {} after {} attempts: {}",
                    utterance.id(),
                    utterance.speaker_name(),
                    attempts,
                    error
                );
                true
            }
            SpeakOutcome::Interrupted => true,
            SpeakOutcome::Cancelled => false,
            SpeakOutcome::Unavailable(reason) => {
                self.mark_unavailable(reason);
                false
            }
            SpeakOutcome::Busy => {
                error!(
                    "Driver invariant violated: speaker busy when {} was due; resetting queue",
                    utterance.id()
                );
                let mut control = self.lock();
                control.queue.clear();
                control.state = DriverState::Idle;
                self.publish(&control);
                false
            }
        }
    }

    fn mark_unavailable(&self, reason: &str) {
        let mut control = self.lock();
        if control.available {
            error!("Voice unavailable, playback disabled: {}", reason);
            control.available = false;
        }
        control.reset();
        self.publish(&control);
    }

    /// Move to the next utterance after `finished` ended
    fn advance(&self, finished: &Utterance) {
        let mut control = self.lock();

        // disable() may have reset the slots while the cool-down ran
        if control.queue.active().map(Utterance::id) != Some(finished.id()) {
            debug!("Queue was reset while {} finished", finished.id());
            return;
        }

        match control.queue.take_next() {
            Ok(Some(next)) => debug!("Next up: {}", next.id()),
            Ok(None) => control.state = DriverState::Idle,
            Err(e) => {
                error!("Driver invariant violated: {}; resetting queue", e);
                control.queue.clear();
                control.state = DriverState::Idle;
            }
        }
        self.publish(&control);
    }

    async fn run(self: Arc<Self>) {
        debug!("Queue driver started");

        loop {
            let job = {
                let mut control = self.lock();
                if control.stopping {
                    break;
                }
                match control.queue.active().cloned() {
                    Some(utterance) => {
                        control.state = DriverState::Speaking;
                        self.publish(&control);
                        // Subscribed under the lock so a concurrent disable()
                        // either empties the queue first or cancels us after.
                        Some((utterance, self.speaker.cancel_signal()))
                    }
                    None => {
                        control.state = DriverState::Idle;
                        self.publish(&control);
                        None
                    }
                }
            };

            let Some((utterance, signal)) = job else {
                self.wake.notified().await;
                continue;
            };

            debug!(
                "Speaking {} from {} (queued {:?} ago)",
                utterance.id(),
                utterance.speaker_name(),
                utterance.enqueued_at().elapsed()
            );
            let outcome = self.speaker.speak_until_cancelled(&utterance, signal).await;
            if !self.settle(&utterance, &outcome) {
                continue;
            }

            tokio::time::sleep(self.policy.cooldown).await;
            self.advance(&utterance);
        }

        debug!("Queue driver stopped");
    }
}

/// Handle to a running queue driver
///
/// Cheap to clone; all clones drive the same queue and speaker.
#[derive(Clone)]
pub struct QueueDriver {
    inner: Arc<Inner>,
}

impl QueueDriver {
    /// Start the driver loop on the current tokio runtime
    pub fn spawn(speaker: RetryingSpeaker, policy: DriverPolicy) -> Self {
        let control = Control {
            queue: PlaybackQueue::new(policy.start_enabled),
            state: DriverState::Idle,
            available: true,
            stopping: false,
        };
        let (status, _) = watch::channel(control.status());

        let inner = Arc::new(Inner {
            control: Mutex::new(control),
            speaker,
            wake: Notify::new(),
            status,
            policy,
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(Arc::clone(&inner).run());
        *inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        Self { inner }
    }

    /// Offer an utterance to the queue
    pub fn enqueue(&self, utterance: Utterance) -> Admission {
        let admission = {
            let mut control = self.inner.lock();
            let admission = control.queue.enqueue(utterance);
            self.inner.publish(&control);
            admission
        };

        if let Admission::Started = admission {
            self.wake();
        }
        admission
    }

    /// Nudge an idle loop; a no-op while speaking
    pub fn wake(&self) {
        if self.inner.lock().state == DriverState::Speaking {
            return;
        }
        self.inner.wake.notify_one();
    }

    /// Stop speech immediately, drop the queue and stop admitting
    pub fn disable(&self) {
        {
            let mut control = self.inner.lock();
            control.reset();
            self.inner.publish(&control);
        }
        self.inner.speaker.cancel();
        info!("Playback disabled");
    }

    /// Resume admitting utterances; nothing missed is replayed
    pub fn enable(&self) {
        let mut control = self.inner.lock();
        if !control.available {
            warn!("Voice unavailable; ignoring enable");
            return;
        }
        if !control.queue.is_enabled() {
            control.queue.set_enabled(true);
            self.inner.publish(&control);
            info!("Playback enabled");
        }
    }

    /// Apply an enable/disable toggle
    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    /// Permanently switch playback off because no voice exists
    pub fn mark_unavailable(&self, reason: &str) {
        self.inner.mark_unavailable(reason);
    }

    pub fn status(&self) -> QueueStatus {
        *self.inner.status.borrow()
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.inner.status.subscribe()
    }

    /// Disable playback and wait for the loop to exit
    pub async fn shutdown(&self) {
        self.inner.lock().stopping = true;
        self.disable();
        self.inner.wake.notify_one();

        let handle = self
            .inner
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Queue driver task failed: {}", e);
            }
        }
    }
}

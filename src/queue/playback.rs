//! Playback queue with latest-wins admission
//!
//! Holds at most one utterance being spoken (`active`) and at most one
//! waiting behind it. Live chat is bursty and a line loses its value once
//! newer lines exist, so a new arrival replaces the waiting one instead of
//! queueing behind it. The voice track can therefore never fall more than
//! one line behind the stream.

use crate::utterance::Utterance;
use log::debug;
use thiserror::Error;

/// What `enqueue` did with an utterance
#[derive(Debug, Clone)]
pub enum Admission {
    /// Playback is disabled; the utterance was dropped
    Rejected,
    /// Queue was empty; the utterance is active and the driver must wake
    Started,
    /// Placed behind the active utterance
    Queued,
    /// Replaced the waiting utterance, which is discarded
    Replaced { evicted: Utterance },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

/// Misuse of the queue by its driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("take_next called with no active utterance")]
    NoActiveUtterance,
}

/// Two-slot playback queue
#[derive(Debug)]
pub struct PlaybackQueue {
    waiting: Option<Utterance>,
    active: Option<Utterance>,
    enabled: bool,
}

impl PlaybackQueue {
    pub fn new(enabled: bool) -> Self {
        Self {
            waiting: None,
            active: None,
            enabled,
        }
    }

    /// Admit an utterance according to the latest-wins policy
    pub fn enqueue(&mut self, utterance: Utterance) -> Admission {
        if !self.enabled {
            debug!("Playback disabled; dropping {}", utterance.id());
            return Admission::Rejected;
        }

        if self.active.is_none() {
            // An idle queue never holds a waiting utterance
            debug_assert!(self.waiting.is_none());
            debug!("{} active immediately", utterance.id());
            self.active = Some(utterance);
            return Admission::Started;
        }

        match self.waiting.replace(utterance) {
            Some(evicted) => {
                debug!("Evicting stale {}", evicted.id());
                Admission::Replaced { evicted }
            }
            None => Admission::Queued,
        }
    }

    /// Promote the waiting utterance after the active one finished
    ///
    /// Returns the new active utterance, or `None` when the queue is idle.
    pub fn take_next(&mut self) -> Result<Option<&Utterance>, QueueError> {
        if self.active.is_none() {
            return Err(QueueError::NoActiveUtterance);
        }
        self.active = self.waiting.take();
        Ok(self.active.as_ref())
    }

    /// Drop both slots
    pub fn clear(&mut self) {
        if self.active.is_some() || self.waiting.is_some() {
            debug!(
                "Clearing queue (active: {:?}, waiting: {:?})",
                self.active.as_ref().map(Utterance::id),
                self.waiting.as_ref().map(Utterance::id)
            );
        }
        self.active = None;
        self.waiting = None;
    }

    pub fn active(&self) -> Option<&Utterance> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&Utterance> {
        self.waiting.as_ref()
    }

    /// Number of utterances waiting behind the active one (0 or 1)
    pub fn depth(&self) -> usize {
        usize::from(self.waiting.is_some())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

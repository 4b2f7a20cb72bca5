//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux
//! - AVFoundation on macOS
//! - WinRT / SAPI on Windows
//!
//! Completion is tracked through the crate's utterance callbacks; callbacks
//! for utterances already cancelled are dropped. Backends
//! without callbacks fall back to polling `is_speaking`, and when neither is
//! available the utterance is only marked as started, leaving the speaker's
//! timeout rule to classify it.

use crate::error::SpeakError;
use crate::speech::{Completion, SpeechEngine, VoiceSettings};
use crate::{ChatVoiceError, Result};
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tts::{Tts, UtteranceId};

/// How often `is_speaking` is polled on backends without callbacks
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the poller waits for playback to begin before trusting "not speaking"
const START_GRACE: Duration = Duration::from_millis(1000);

/// Stopped ids whose callbacks are still expected; oldest dropped first
const MAX_STALE: usize = 32;

/// The utterance the backend is currently speaking
struct InFlight<Id> {
    /// Backend id, known once `speak` has returned
    id: Option<Id>,
    completion: Completion,
}

/// Routes backend callbacks to the completion they belong to
///
/// Backends deliver stop and end callbacks asynchronously, so a callback for
/// a cancelled utterance can land after the next one was installed. Ids
/// stopped by `cancel` are remembered and their callbacks dropped.
struct Tracker<Id> {
    current: Option<InFlight<Id>>,
    stale: VecDeque<Id>,
}

impl<Id: Copy + PartialEq> Tracker<Id> {
    fn new() -> Self {
        Self {
            current: None,
            stale: VecDeque::new(),
        }
    }

    fn install(&mut self, completion: Completion) {
        self.current = Some(InFlight {
            id: None,
            completion,
        });
    }

    fn assign(&mut self, id: Option<Id>) {
        if let Some(current) = self.current.as_mut() {
            current.id = id;
        }
    }

    /// Forget the in-flight utterance, remembering its id as stale
    fn cancel(&mut self) -> Option<Completion> {
        let current = self.current.take()?;
        if let Some(id) = current.id {
            if self.stale.len() == MAX_STALE {
                self.stale.pop_front();
            }
            self.stale.push_back(id);
        }
        Some(current.completion)
    }

    fn is_stale(&self, id: Id) -> bool {
        self.stale.contains(&id)
    }

    /// Whether a callback for `id` belongs to the in-flight utterance
    fn owns(&self, id: Id) -> bool {
        if self.is_stale(id) {
            return false;
        }
        self.current
            .as_ref()
            .is_some_and(|current| current.id.map_or(true, |own| own == id))
    }

    fn on_begin(&mut self, id: Id) {
        if self.owns(id) {
            if let Some(current) = self.current.as_ref() {
                current.completion.mark_started();
            }
        }
    }

    /// Terminal callback: `outcome` resolves the owner, stale ids are consumed
    fn on_finish(&mut self, id: Id, outcome: std::result::Result<(), SpeakError>) {
        if let Some(pos) = self.stale.iter().position(|stale| *stale == id) {
            debug!("Ignoring late callback for a cancelled utterance");
            self.stale.remove(pos);
            return;
        }
        if !self.owns(id) {
            return;
        }
        if let Some(done) = self.current.take() {
            match outcome {
                Ok(()) => done.completion.succeed(),
                Err(e) => done.completion.fail(e),
            };
        }
    }
}

type Slot = Arc<Mutex<Tracker<UtteranceId>>>;

fn lock<Id>(slot: &Mutex<Tracker<Id>>) -> MutexGuard<'_, Tracker<Id>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Whether the poller may report the utterance as finished
fn poll_finished(speaking: bool, seen_speaking: bool, waited: Duration) -> bool {
    !speaking && (seen_speaking || waited >= START_GRACE)
}

/// Native TTS backend using the tts crate
pub struct NativeEngine {
    tts: Tts,
    tracker: Slot,
    callbacks: bool,
    can_poll: bool,
    can_stop: bool,
}

impl NativeEngine {
    /// Create a native engine and apply the voice settings
    pub fn new(voice: &VoiceSettings) -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = Tts::default().map_err(|e| {
            ChatVoiceError::EngineUnavailable(format!("Failed to initialize TTS: {}", e))
        })?;

        let features = tts.supported_features();
        let tracker: Slot = Arc::new(Mutex::new(Tracker::new()));

        let mut engine = Self {
            tts,
            tracker,
            callbacks: features.utterance_callbacks,
            can_poll: features.is_speaking,
            can_stop: features.stop,
        };

        if engine.callbacks {
            engine.register_callbacks()?;
        } else if engine.can_poll {
            warn!("Utterance callbacks not supported; polling for completion");
        } else {
            warn!("Completion cannot be observed on this platform; relying on timeouts");
        }

        engine.apply_voice(voice);
        debug!("Native TTS backend created successfully");
        Ok(engine)
    }

    fn register_callbacks(&mut self) -> Result<()> {
        let slot = Arc::clone(&self.tracker);
        self.tts
            .on_utterance_begin(Some(Box::new(move |id| lock(&slot).on_begin(id))))
            .map_err(|e| ChatVoiceError::Speech(format!("Failed to register callback: {}", e)))?;

        let slot = Arc::clone(&self.tracker);
        self.tts
            .on_utterance_end(Some(Box::new(move |id| lock(&slot).on_finish(id, Ok(())))))
            .map_err(|e| ChatVoiceError::Speech(format!("Failed to register callback: {}", e)))?;

        let slot = Arc::clone(&self.tracker);
        self.tts
            .on_utterance_stop(Some(Box::new(move |id| {
                lock(&slot).on_finish(id, Err(SpeakError::Interrupted))
            })))
            .map_err(|e| ChatVoiceError::Speech(format!("Failed to register callback: {}", e)))?;

        Ok(())
    }

    /// Apply rate, pitch, volume and voice, skipping unsupported controls
    fn apply_voice(&mut self, voice: &VoiceSettings) {
        let features = self.tts.supported_features();

        if features.rate {
            let rate = scale_relative(
                voice.rate,
                self.tts.normal_rate(),
                self.tts.min_rate(),
                self.tts.max_rate(),
            );
            if let Err(e) = self.tts.set_rate(rate) {
                warn!("Failed to set rate: {}", e);
            }
        } else {
            warn!("Rate control not supported on this platform");
        }

        if features.pitch {
            let pitch = scale_relative(
                voice.pitch,
                self.tts.normal_pitch(),
                self.tts.min_pitch(),
                self.tts.max_pitch(),
            );
            if let Err(e) = self.tts.set_pitch(pitch) {
                warn!("Failed to set pitch: {}", e);
            }
        }

        if features.volume {
            let volume = scale_fraction(voice.volume, self.tts.min_volume(), self.tts.max_volume());
            if let Err(e) = self.tts.set_volume(volume) {
                warn!("Failed to set volume: {}", e);
            }
        } else {
            warn!("Volume control not supported on this platform");
        }

        if features.voice {
            self.select_voice(voice);
        }
    }

    fn select_voice(&mut self, voice: &VoiceSettings) {
        let voices = match self.tts.voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to list voices: {}", e);
                return;
            }
        };

        let language = voice.language.to_lowercase();
        let hint = voice.voice_hint.to_lowercase();
        let chosen = voices
            .iter()
            .find(|v| !language.is_empty() && v.language().as_str().to_lowercase().starts_with(&language))
            .or_else(|| {
                voices
                    .iter()
                    .find(|v| !hint.is_empty() && v.name().to_lowercase().contains(&hint))
            });

        match chosen {
            Some(v) => {
                debug!("Selecting voice: {}", v.name());
                if let Err(e) = self.tts.set_voice(v) {
                    warn!("Failed to set voice: {}", e);
                }
            }
            None => warn!(
                "No voice matches language '{}' or hint '{}'; keeping default ({} voices)",
                voice.language,
                voice.voice_hint,
                voices.len()
            ),
        }
    }

    /// Watch `is_speaking` until the backend goes quiet
    fn spawn_poller(&self, completion: Completion) {
        let tts = self.tts.clone();
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut seen_speaking = false;
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if completion.is_resolved() {
                    break;
                }
                match tts.is_speaking() {
                    Ok(speaking) => {
                        if speaking {
                            seen_speaking = true;
                            completion.mark_started();
                        }
                        if poll_finished(speaking, seen_speaking, started.elapsed()) {
                            completion.succeed();
                            break;
                        }
                    }
                    Err(e) => {
                        completion.fail(SpeakError::Engine(format!("is_speaking failed: {}", e)));
                        break;
                    }
                }
            }
        });
    }
}

impl SpeechEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn start(&mut self, text: &str, completion: Completion) -> std::result::Result<(), SpeakError> {
        debug!("Speaking: {}", text);

        lock(&self.tracker).install(completion.clone());

        let id = match self.tts.speak(text, false) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to speak: {}", e);
                lock(&self.tracker).current = None;
                return Err(SpeakError::Engine(format!("Speak failed: {}", e)));
            }
        };

        if self.callbacks {
            lock(&self.tracker).assign(id);
        } else {
            // Without begin callbacks, an accepted request is the best
            // evidence that audio started.
            completion.mark_started();
            if self.can_poll {
                self.spawn_poller(completion);
            }
        }

        Ok(())
    }

    fn cancel_all(&mut self) {
        // Resolved here; the backend's own stop callback for it is dropped
        let stale = lock(&self.tracker).cancel();
        if let Some(stale) = stale {
            stale.fail(SpeakError::Interrupted);
        }

        if !self.can_stop {
            return;
        }
        debug!("Canceling speech");
        if let Err(e) = self.tts.stop() {
            error!("Failed to cancel speech: {}", e);
        }
    }
}

/// Map a multiplier of the engine's normal value into its range
fn scale_relative(factor: f32, normal: f32, min: f32, max: f32) -> f32 {
    (normal * factor).clamp(min, max)
}

/// Map a 0.0-1.0 fraction onto the engine's range
fn scale_fraction(fraction: f32, min: f32, max: f32) -> f32 {
    min + (max - min) * fraction.clamp(0.0, 1.0)
}

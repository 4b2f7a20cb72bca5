//! Speech engine abstraction
//!
//! Provides a unified interface over the platform text-to-speech backends.
//! The relay speaks every chat line through one of these.

use crate::error::SpeakError;
use crate::platform::is_wsl;
use crate::speech::Completion;
use crate::{ChatVoiceError, Result};
use log::info;

/// Voice parameters applied when a backend is created
///
/// `rate` and `pitch` are multipliers of the engine's normal value;
/// `volume` is a fraction of the engine's range.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub rate: f32,
    pub volume: f32,
    pub pitch: f32,
    /// Preferred voice language prefix, e.g. "es"
    pub language: String,
    /// Substring matched against voice names when no language match exists
    pub voice_hint: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            volume: 0.8,
            pitch: 1.0,
            language: "es".to_string(),
            voice_hint: "Spanish".to_string(),
        }
    }
}

/// Speech engine trait
///
/// An engine speaks one utterance at a time. `start` must return quickly:
/// the outcome is reported later through the [`Completion`], which the
/// engine resolves from its own callbacks or tasks.
pub trait SpeechEngine: Send {
    /// Short backend name for diagnostics
    fn name(&self) -> &str;

    /// Begin speaking `text`
    ///
    /// A synchronous failure (backend missing, process spawn failure) is
    /// returned directly and the completion is left untouched.
    fn start(&mut self, text: &str, completion: Completion) -> std::result::Result<(), SpeakError>;

    /// Silence all speech and resolve any pending completion as interrupted
    fn cancel_all(&mut self);
}

/// Create a platform-appropriate speech engine
///
/// **WSL:** espeak-ng through PulseAudio first, then the native backend.
///
/// **Native Linux:** Speech Dispatcher through the `tts` crate, then
/// espeak-ng.
///
/// **macOS / Windows:** the `tts` crate's native backend.
pub fn create_engine(voice: &VoiceSettings) -> Result<Box<dyn SpeechEngine>> {
    use super::backends::espeak::EspeakEngine;
    use super::backends::native::NativeEngine;

    let platform = std::env::consts::OS;

    if platform == "linux" && is_wsl() {
        info!("Detected WSL environment");

        match EspeakEngine::new(voice) {
            Ok(engine) => {
                info!("✓ Using espeak-ng backend");
                return Ok(Box::new(engine));
            }
            Err(e) => info!("✗ espeak-ng backend unavailable: {}", e),
        }

        return NativeEngine::new(voice)
            .map(|engine| Box::new(engine) as Box<dyn SpeechEngine>)
            .map_err(|e| {
                ChatVoiceError::EngineUnavailable(format!(
                    "No speech backend available on WSL. Tried:\n\
                     1. PulseAudio + espeak-ng (install: sudo apt install espeak-ng)\n\
                     2. Speech Dispatcher (not configured)\n\
                     Error: {}",
                    e
                ))
            });
    }

    if platform == "linux" {
        info!("Detected native Linux environment");

        match NativeEngine::new(voice) {
            Ok(engine) => {
                info!("✓ Using Speech Dispatcher backend");
                return Ok(Box::new(engine));
            }
            Err(e) => {
                info!("✗ Speech Dispatcher unavailable: {}", e);
                info!("To install: sudo apt install speech-dispatcher");
            }
        }

        return EspeakEngine::new(voice)
            .map(|engine| Box::new(engine) as Box<dyn SpeechEngine>)
            .map_err(|e| {
                ChatVoiceError::EngineUnavailable(format!(
                    "No speech backend available on Linux. Tried:\n\
                     1. Speech Dispatcher (install: sudo apt install speech-dispatcher)\n\
                     2. PulseAudio + espeak-ng (install: sudo apt install espeak-ng)\n\
                     Error: {}",
                    e
                ))
            });
    }

    info!("Creating native speech engine for platform: {}", platform);
    match NativeEngine::new(voice) {
        Ok(engine) => Ok(Box::new(engine)),
        Err(e) => Err(ChatVoiceError::EngineUnavailable(format!(
            "Failed to initialize speech backend for platform '{}': {}",
            platform, e
        ))),
    }
}

/// [`create_engine`] for async callers
///
/// Backend discovery runs subprocesses and connects to system services, so
/// it is moved onto tokio's blocking pool.
pub async fn open_engine(voice: VoiceSettings) -> Result<Box<dyn SpeechEngine>> {
    tokio::task::spawn_blocking(move || create_engine(&voice))
        .await
        .map_err(|e| ChatVoiceError::EngineUnavailable(format!("Engine setup task failed: {}", e)))?
}

/// Engine used when no backend could be created
///
/// Every start reports `EngineUnavailable`, which makes the driver switch
/// playback off once and surface "voice unavailable".
pub struct UnavailableEngine {
    reason: String,
}

impl UnavailableEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechEngine for UnavailableEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn start(&mut self, _text: &str, _completion: Completion) -> std::result::Result<(), SpeakError> {
        Err(SpeakError::EngineUnavailable(self.reason.clone()))
    }

    fn cancel_all(&mut self) {}
}

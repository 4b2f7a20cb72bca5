//! espeak-ng backend
//!
//! Runs one espeak-ng process per utterance. The process exit status is the
//! completion signal, so this backend never needs the timeout heuristic.
//! On WSL with WSLG, audio goes through the PulseAudio server exposed at
//! /mnt/wslg/PulseServer.
//!
//! Dependencies:
//! - espeak-ng (install with: sudo apt install espeak-ng)
//! - PulseAudio client libraries (usually pre-installed with WSLG)

use crate::error::SpeakError;
use crate::platform::is_wsl;
use crate::speech::{Completion, SpeechEngine, VoiceSettings};
use crate::{ChatVoiceError, Result};
use log::{debug, info, warn};
use std::process::{Command, Stdio};
use tokio::sync::oneshot;

/// espeak-ng's default speed in words per minute
const NORMAL_SPEED: f32 = 175.0;

/// espeak-ng's default pitch (0-99)
const NORMAL_PITCH: f32 = 50.0;

/// espeak-ng backend
pub struct EspeakEngine {
    espeak_path: String,
    voice: String,
    speed: u16,
    amplitude: u8,
    pitch: u8,
    /// Stops the process currently speaking, if any
    kill: Option<oneshot::Sender<()>>,
}

impl EspeakEngine {
    /// Setup PulseAudio server environment
    ///
    /// Auto-detects the WSLG PulseAudio server and sets PULSE_SERVER if needed.
    fn setup_pulseaudio() -> Result<()> {
        const WSLG_PULSE_PATH: &str = "/mnt/wslg/PulseServer";

        if std::env::var("PULSE_SERVER").is_ok() {
            debug!("PULSE_SERVER already set via environment");
            return Ok(());
        }

        if std::path::Path::new(WSLG_PULSE_PATH).exists() {
            info!("Auto-detected WSLG PulseAudio server at {}", WSLG_PULSE_PATH);
            std::env::set_var("PULSE_SERVER", WSLG_PULSE_PATH);
            return Ok(());
        }

        if is_wsl() {
            warn!("WSLG PulseAudio server not found at {}", WSLG_PULSE_PATH);
            warn!("You can also set the PULSE_SERVER environment variable");
            return Err(ChatVoiceError::Speech(
                "PulseAudio server not found. Install WSLg or set PULSE_SERVER environment variable."
                    .to_string(),
            ));
        }

        // Native Linux: espeak-ng uses the default audio configuration
        Ok(())
    }

    /// Create an espeak-ng engine
    pub fn new(voice: &VoiceSettings) -> Result<Self> {
        debug!("Creating espeak-ng backend");

        Self::setup_pulseaudio()?;

        let espeak_path = Self::find_espeak()?;
        debug!("Found espeak-ng at: {}", espeak_path);

        Ok(Self {
            espeak_path,
            voice: Self::voice_name(&voice.language),
            speed: Self::rate_to_speed(voice.rate),
            amplitude: Self::volume_to_amplitude(voice.volume),
            pitch: Self::pitch_to_espeak(voice.pitch),
            kill: None,
        })
    }

    fn find_espeak() -> Result<String> {
        for path in ["espeak-ng", "/usr/bin/espeak-ng"] {
            if let Ok(status) = Command::new(path)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                if status.success() {
                    return Ok(path.to_string());
                }
            }
        }

        Err(ChatVoiceError::EngineUnavailable(
            "espeak-ng not found. Install with: sudo apt install espeak-ng".to_string(),
        ))
    }

    /// Rate multiplier to espeak speed (80-450 wpm)
    fn rate_to_speed(rate: f32) -> u16 {
        (NORMAL_SPEED * rate).round().clamp(80.0, 450.0) as u16
    }

    /// Volume fraction (0.0-1.0) to espeak amplitude (0-200, 100 is normal)
    fn volume_to_amplitude(volume: f32) -> u8 {
        (volume * 100.0).round().clamp(0.0, 200.0) as u8
    }

    /// Pitch multiplier to espeak pitch (0-99)
    fn pitch_to_espeak(pitch: f32) -> u8 {
        (NORMAL_PITCH * pitch).round().clamp(0.0, 99.0) as u8
    }

    fn voice_name(language: &str) -> String {
        let language = language.trim();
        if language.is_empty() {
            "en".to_string()
        } else {
            language.to_lowercase()
        }
    }

    fn command(&self, text: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.espeak_path);
        cmd.arg("-v").arg(&self.voice);
        cmd.arg("-s").arg(self.speed.to_string());
        cmd.arg("-a").arg(self.amplitude.to_string());
        cmd.arg("-p").arg(self.pitch.to_string());
        cmd.arg("--").arg(text);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }
}

impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn start(&mut self, text: &str, completion: Completion) -> std::result::Result<(), SpeakError> {
        self.cancel_all();

        let mut child = self
            .command(text)
            .spawn()
            .map_err(|e| SpeakError::Engine(format!("Failed to start espeak-ng: {}", e)))?;
        debug!("espeak-ng process started");
        completion.mark_started();

        let (kill_tx, kill_rx) = oneshot::channel();
        self.kill = Some(kill_tx);

        tokio::spawn(async move {
            // The kill branch also fires when the engine drops the sender
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };

            match exited {
                Some(Ok(status)) if status.success() => {
                    completion.succeed();
                }
                Some(Ok(status)) => {
                    completion.fail(SpeakError::Engine(format!("espeak-ng exited with {}", status)));
                }
                Some(Err(e)) => {
                    completion.fail(SpeakError::Engine(format!("espeak-ng wait failed: {}", e)));
                }
                None => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill espeak-ng process: {}", e);
                    }
                    completion.fail(SpeakError::Interrupted);
                }
            }
        });

        Ok(())
    }

    fn cancel_all(&mut self) {
        if let Some(kill) = self.kill.take() {
            debug!("Killing espeak-ng process");
            let _ = kill.send(());
        }
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        debug!("Shutting down espeak-ng backend");
        self.cancel_all();
    }
}

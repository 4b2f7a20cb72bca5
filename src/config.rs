//! Configuration management

use crate::queue::DriverPolicy;
use crate::relay::RelaySettings;
use crate::speech::{SpeakerPolicy, VoiceSettings};
use crate::text::TextSettings;
use crate::{ChatVoiceError, Result};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name in the user's home directory
const CONFIG_FILE: &str = ".chatvoice.cfg";

/// Application configuration for the relay
///
/// Backed by an INI file with `[speech]`, `[queue]` and `[relay]` sections.
/// Missing keys fall back to the built-in defaults.
pub struct Config {
    ini: Ini,
    path: PathBuf,
}

impl Config {
    /// Load configuration from ~/.chatvoice.cfg, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from an explicit path, creating it if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| ChatVoiceError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| ChatVoiceError::Config(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Configuration with defaults only, not backed by a file on disk
    pub fn in_memory() -> Self {
        Self {
            ini: Self::default_config(),
            path: PathBuf::new(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| ChatVoiceError::Config(format!("Failed to save config: {}", e)))
    }

    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("rate", "0.9")
            .set("volume", "0.8")
            .set("pitch", "1.0")
            .set("language", "es")
            .set("voice_hint", "Spanish")
            .set("process_text", "true")
            .set("repeated_symbols", "true")
            .set("repeated_symbols_values", "!?.-=*#")
            .set("link_word", "enlace");

        ini.with_section(Some("queue"))
            .set("enabled", "true")
            .set("max_retries", "2")
            .set("retry_backoff_ms", "500")
            .set("cooldown_ms", "200")
            .set("timeout_per_char_ms", "100")
            .set("min_timeout_ms", "5000");

        ini.with_section(Some("relay"))
            .set("announce_format", "{user} dice: {text}")
            .set("test_user", "TestUser")
            .set("test_phrase", "Prueba de voz del lector de chat");

        ini
    }

    /// Get a boolean value from config
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get an unsigned integer value from config
    pub fn get_u64(&self, section: &str, key: &str, default: u64) -> u64 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &f32| v.is_finite())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    fn get_millis(&self, section: &str, key: &str, default: Duration) -> Duration {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.get_u64(section, key, default_ms))
    }

    // Typed views over the raw sections

    /// Voice parameters for the speech backend
    pub fn voice_settings(&self) -> VoiceSettings {
        let defaults = VoiceSettings::default();
        VoiceSettings {
            rate: self.get_float("speech", "rate", defaults.rate).max(0.0),
            volume: self.get_float("speech", "volume", defaults.volume).clamp(0.0, 1.0),
            pitch: self.get_float("speech", "pitch", defaults.pitch).max(0.0),
            language: self.get_string("speech", "language", &defaults.language),
            voice_hint: self.get_string("speech", "voice_hint", &defaults.voice_hint),
        }
    }

    /// Chat text clean-up options
    pub fn text_settings(&self) -> TextSettings {
        let defaults = TextSettings::default();
        TextSettings {
            process_text: self.get_bool("speech", "process_text", defaults.process_text),
            repeated_symbols: self.get_bool("speech", "repeated_symbols", defaults.repeated_symbols),
            repeated_symbols_values: self.get_string(
                "speech",
                "repeated_symbols_values",
                &defaults.repeated_symbols_values,
            ),
            link_word: self.get_string("speech", "link_word", &defaults.link_word),
        }
    }

    /// Retry and timeout policy for the speaker
    pub fn speaker_policy(&self) -> SpeakerPolicy {
        let defaults = SpeakerPolicy::default();
        SpeakerPolicy {
            max_retries: u32::try_from(self.get_u64(
                "queue",
                "max_retries",
                u64::from(defaults.max_retries),
            ))
            .unwrap_or(defaults.max_retries),
            retry_backoff: self.get_millis("queue", "retry_backoff_ms", defaults.retry_backoff),
            timeout_per_char: self.get_millis(
                "queue",
                "timeout_per_char_ms",
                defaults.timeout_per_char,
            ),
            min_timeout: self.get_millis("queue", "min_timeout_ms", defaults.min_timeout),
        }
    }

    /// Timing policy for the queue driver
    pub fn driver_policy(&self) -> DriverPolicy {
        let defaults = DriverPolicy::default();
        DriverPolicy {
            cooldown: self.get_millis("queue", "cooldown_ms", defaults.cooldown),
            start_enabled: self.get_bool("queue", "enabled", defaults.start_enabled),
        }
    }

    /// Announcement and diagnostic phrase settings
    pub fn relay_settings(&self) -> RelaySettings {
        let defaults = RelaySettings::default();
        RelaySettings {
            announce_format: self.get_string("relay", "announce_format", &defaults.announce_format),
            test_user: self.get_string("relay", "test_user", &defaults.test_user),
            test_phrase: self.get_string("relay", "test_phrase", &defaults.test_phrase),
        }
    }
}

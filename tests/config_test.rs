//! Configuration loading tests
//!
//! Tests that the relay configuration file is created with defaults
//! and that edits survive a save and reload

use chatvoice::config::Config;
use chatvoice::speech::SpeakerPolicy;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chatvoice.cfg");

    let config = Config::load_from(&path).expect("Failed to load config");

    assert!(path.exists());
    assert_eq!(config.path(), path.as_path());
    assert_eq!(config.speaker_policy(), SpeakerPolicy::default());
    assert!(config.driver_policy().start_enabled);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[queue]"));
    assert!(written.contains("announce_format"));
}

#[test]
fn test_saved_overrides_are_reloaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chatvoice.cfg");

    let mut config = Config::load_from(&path).unwrap();
    config.set("queue", "cooldown_ms", "50");
    config.set("queue", "enabled", "false");
    config.set("relay", "announce_format", "{user}: {text}");
    config.save().unwrap();

    let reloaded = Config::load_from(&path).unwrap();
    let driver = reloaded.driver_policy();
    assert_eq!(driver.cooldown, Duration::from_millis(50));
    assert!(!driver.start_enabled);
    assert_eq!(reloaded.relay_settings().announce_format, "{user}: {text}");
}

#[test]
fn test_hand_edited_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chatvoice.cfg");
    std::fs::write(
        &path,
        "[speech]\nrate = 1.5\nlanguage = en\n\n[queue]\nmax_retries = 0\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();

    let voice = config.voice_settings();
    assert!((voice.rate - 1.5).abs() < f32::EPSILON);
    assert_eq!(voice.language, "en");
    // Keys absent from the file keep their defaults
    assert_eq!(voice.voice_hint, "Spanish");
    assert_eq!(config.speaker_policy().max_retries, 0);
    assert_eq!(
        config.speaker_policy().min_timeout,
        Duration::from_millis(5000)
    );
}

#[test]
fn test_unreadable_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    // A directory cannot be parsed as an INI file
    let path = dir.path().join("nested");
    std::fs::create_dir(&path).unwrap();

    assert!(Config::load_from(&path).is_err());
}

//! Platform-specific speech backends

// Native TTS backend using the tts crate (cross-platform)
pub mod native;

// espeak-ng subprocess backend (Linux fallback, WSL/WSLG)
pub mod espeak;

//! Error types for chatvoice

use std::io;
use thiserror::Error;

/// Main error type for chatvoice
#[derive(Error, Debug)]
pub enum ChatVoiceError {
    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for chatvoice operations
pub type Result<T> = std::result::Result<T, ChatVoiceError>;

impl From<String> for ChatVoiceError {
    fn from(s: String) -> Self {
        ChatVoiceError::Other(s)
    }
}

impl From<&str> for ChatVoiceError {
    fn from(s: &str) -> Self {
        ChatVoiceError::Other(s.to_string())
    }
}

/// Failures reported while speaking a single utterance
///
/// These never leave the speaker: they are classified there into a
/// terminal [`SpeakOutcome`](crate::speech::SpeakOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeakError {
    /// The platform has no usable speech capability
    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Speech was deliberately cancelled by a newer command
    #[error("speech interrupted")]
    Interrupted,

    /// No terminal event arrived in time and speech never began
    #[error("speech timed out after {0} ms without starting")]
    Timeout(u64),

    /// Engine-reported failure
    #[error("speech failed: {0}")]
    Engine(String),
}

impl SpeakError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpeakError::Timeout(_) | SpeakError::Engine(_))
    }
}

impl From<SpeakError> for ChatVoiceError {
    fn from(e: SpeakError) -> Self {
        match e {
            SpeakError::EngineUnavailable(msg) => ChatVoiceError::EngineUnavailable(msg),
            other => ChatVoiceError::Speech(other.to_string()),
        }
    }
}

//! Inbound chat events
//!
//! The upstream session client pushes JSON objects tagged by `type`, one
//! per line. Only the fields the relay acts on are modelled; anything else
//! in the object is ignored.

use crate::Result;
use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// One event from the chat session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A viewer wrote in chat
    ChatMessage {
        user: String,
        message: String,
        #[serde(default)]
        timestamp: Option<String>,
        /// Whether the sender wants this line read aloud
        #[serde(default = "default_true")]
        tts_enabled: bool,
    },
    /// TTS was switched on or off
    TtsStatus { enabled: bool },
    /// Speak the diagnostic phrase
    TestMessage {
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Upstream session connected or dropped
    ConnectionStatus {
        connected: bool,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Any event type the relay does not handle
    #[serde(other)]
    Unknown,
}

impl ChatEvent {
    /// Parse one JSON line
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_message() {
        let event = ChatEvent::parse(
            r#"{"type":"chat_message","user":"ana","message":"hola","timestamp":"2024-01-01T00:00:00","tts_enabled":false}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ChatEvent::ChatMessage {
                user: "ana".into(),
                message: "hola".into(),
                timestamp: Some("2024-01-01T00:00:00".into()),
                tts_enabled: false,
            }
        );
    }

    #[test]
    fn test_tts_flag_defaults_on() {
        let event = ChatEvent::parse(r#"{"type":"chat_message","user":"a","message":"b"}"#).unwrap();
        assert!(matches!(event, ChatEvent::ChatMessage { tts_enabled: true, .. }));
    }

    #[test]
    fn test_parse_status_and_test() {
        assert_eq!(
            ChatEvent::parse(r#"{"type":"tts_status","enabled":false}"#).unwrap(),
            ChatEvent::TtsStatus { enabled: false }
        );
        assert_eq!(
            ChatEvent::parse(r#"{"type":"test_message"}"#).unwrap(),
            ChatEvent::TestMessage {
                user: None,
                message: None
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            ChatEvent::parse(r#"{"type":"gift","amount":5}"#).unwrap(),
            ChatEvent::Unknown
        );
    }

    #[test]
    fn test_malformed_line() {
        assert!(ChatEvent::parse("not json").is_err());
        assert!(ChatEvent::parse(r#"{"type":"chat_message"}"#).is_err());
    }
}

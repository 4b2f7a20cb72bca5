//! Chat relay: routes session events into the playback queue
//!
//! Message events become utterances, toggles enable or disable playback,
//! and the test trigger speaks a fixed phrase through the very same enqueue
//! path as any chat line.

use crate::events::ChatEvent;
use crate::queue::{Admission, QueueDriver};
use crate::text::TextProcessor;
use crate::utterance::Utterance;
use crate::Result;
use log::{debug, info, warn};

/// Announcement and diagnostic phrase settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Spoken form of a message; `{user}` and `{text}` are substituted
    pub announce_format: String,
    pub test_user: String,
    pub test_phrase: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            announce_format: "{user} dice: {text}".to_string(),
            test_user: "TestUser".to_string(),
            test_phrase: "Prueba de voz del lector de chat".to_string(),
        }
    }
}

/// Connects the chat event stream to a [`QueueDriver`]
pub struct ChatRelay {
    driver: QueueDriver,
    settings: RelaySettings,
    text: TextProcessor,
}

impl ChatRelay {
    pub fn new(driver: QueueDriver, settings: RelaySettings, text: TextProcessor) -> Self {
        Self {
            driver,
            settings,
            text,
        }
    }

    pub fn driver(&self) -> &QueueDriver {
        &self.driver
    }

    /// Parse and handle one JSON line
    pub fn handle_line(&self, line: &str) -> Result<Option<Admission>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let event = ChatEvent::parse(line)?;
        Ok(self.handle_event(event))
    }

    /// Handle one event; returns the queue decision when something was offered
    pub fn handle_event(&self, event: ChatEvent) -> Option<Admission> {
        match event {
            ChatEvent::ChatMessage {
                user,
                message,
                tts_enabled,
                ..
            } => {
                if !tts_enabled {
                    debug!("Message from {} not flagged for speech", user);
                    return None;
                }
                self.announce(&user, &message)
            }
            ChatEvent::TtsStatus { enabled } => {
                self.driver.set_enabled(enabled);
                None
            }
            ChatEvent::TestMessage { user, message } => {
                let user = user.unwrap_or_else(|| self.settings.test_user.clone());
                let message = message.unwrap_or_else(|| self.settings.test_phrase.clone());
                info!("Speaking test phrase");
                self.announce(&user, &message)
            }
            ChatEvent::ConnectionStatus {
                connected,
                username,
                error,
            } => {
                match (connected, error) {
                    (true, _) => info!(
                        "Chat session connected to @{}",
                        username.as_deref().unwrap_or("?")
                    ),
                    (false, Some(error)) => warn!("Chat session disconnected: {}", error),
                    (false, None) => info!("Chat session disconnected"),
                }
                None
            }
            ChatEvent::Unknown => {
                debug!("Ignoring unhandled event type");
                None
            }
        }
    }

    /// Build the spoken form of a message and offer it to the queue
    pub fn announce(&self, user: &str, message: &str) -> Option<Admission> {
        let text = self.text.process(message);
        if text.is_empty() {
            debug!("Nothing speakable from {}", user);
            return None;
        }

        let spoken = self.format_announcement(user, &text);
        let utterance = Utterance::new(user, spoken)?;
        Some(self.driver.enqueue(utterance))
    }

    fn format_announcement(&self, user: &str, text: &str) -> String {
        self.settings
            .announce_format
            .replace("{user}", user)
            .replace("{text}", text)
    }
}


//! chatvoice - read live chat aloud
//!
//! Chat events arrive from a live-stream session and are spoken one at a
//! time through the platform text-to-speech engine. A two-slot playback
//! queue keeps the voice close to the live stream: while a line is being
//! spoken only the newest arrival waits behind it.

pub mod config;
pub mod error;
pub mod events;
pub mod platform;
pub mod queue;
pub mod relay;
pub mod speech;
pub mod text;
pub mod utterance;

pub use error::{ChatVoiceError, Result, SpeakError};
pub use queue::{Admission, DriverState, QueueDriver, QueueStatus};
pub use relay::ChatRelay;
pub use utterance::{Utterance, UtteranceId};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "chatvoice";

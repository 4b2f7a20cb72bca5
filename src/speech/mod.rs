//! Speech output: engines and the retrying speaker

pub mod backends;
pub mod completion;
pub mod engine;
pub mod speaker;

pub use completion::{Completion, PendingSpeech};
pub use engine::{create_engine, open_engine, SpeechEngine, UnavailableEngine, VoiceSettings};
pub use speaker::{CancelSignal, RetryingSpeaker, SpeakOutcome, SpeakerPolicy};

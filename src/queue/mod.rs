//! Playback queue and the driver loop that drains it

pub mod driver;
pub mod playback;

pub use driver::{DriverPolicy, DriverState, QueueDriver, QueueStatus};
pub use playback::{Admission, PlaybackQueue, QueueError};

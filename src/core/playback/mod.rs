//! Ordered audio playback.

#[cfg(feature = "playback")]
mod device;
mod output;
mod queue;

#[cfg(feature = "playback")]
pub use device::DeviceOutput;
pub use output::{AudioOutput, NullOutput, PlaybackError};
pub use queue::{PlaybackOutcome, PlaybackQueue};

pub mod clock;
pub mod controller;

pub use clock::{PlaybackClock, PlaybackSnapshot, TickOutcome};
pub use controller::PlaybackController;

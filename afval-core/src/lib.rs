//! Core types and the polling loop for the afval-led waste collection indicator.

/// Calendar helpers producing the date strings the providers compare against.
pub mod calendar;
/// Mapping of provider waste-type codes onto LED colors.
pub mod colors;
/// Output driver translating collection days into solid and blinking LEDs.
pub mod leds;
/// Domain models shared by all providers.
pub mod model;
/// Traits describing the external collaborators and the fail-soft result type.
pub mod ports;
/// Hourly poll and time-sync loop.
pub mod scheduler;

pub use calendar::*;
pub use colors::*;
pub use leds::*;
pub use model::*;
pub use ports::*;
pub use scheduler::*;

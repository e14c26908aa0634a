//! Periodic real-time scheduling module
//!
//! Contains the task parameter descriptor, the scheduler state machine,
//! and the clock/plugin seams it is built on.

mod clock;
mod error;
mod params;
mod plugin;
mod scheduler;

pub use clock::*;
pub use error::*;
pub use params::*;
pub use plugin::*;
pub use scheduler::*;

//! Testing utilities for tally crates

#![warn(missing_docs)]

mod check_lifecycle;
mod event_capture;
mod type_helpers;

pub use check_lifecycle::check_lifecycle;
pub use event_capture::EventCapture;
pub use type_helpers::*;

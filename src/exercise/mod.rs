//! The overflow exercises
//!
//! Each exercise is a buffer placed right below a sentinel, an unchecked copy
//! that fills the buffer from outside input, and a check of the sentinel
//! afterwards:
//!
//! 1. [`config`] describes an exercise and its policies (four presets).
//! 2. [`copy`] and [`format`] move the payload into the buffer.
//! 3. [`evaluator`] classifies the sentinel.
//! 4. [`capability`] holds the one way to call an attacker-chosen address.
//! 5. [`driver`] runs the whole thing and records snapshots.

pub mod capability;
pub mod config;
pub mod constants;
pub mod copy;
pub mod driver;
pub mod errors;
pub mod evaluator;
pub mod format;

pub use config::ExerciseConfig;
pub use driver::{Driver, Phase, RunReport, Termination};
pub use errors::{ExerciseError, Fault, FormatError};
pub use evaluator::{Classification, Evaluation};

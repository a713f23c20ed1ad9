//! Cursor integration and cross-stream fusion.
//!
//! This crate owns the back half of the pipeline: turning conditioned
//! samples plus detector events into a stream of [`saccade_types::Action`]s.
//! The per-sample ordering is fixed (cursor motion is resolved before any
//! command dispatch) so that the first sample of a command gesture freezes
//! the pointer cleanly.

pub mod actuate;
pub mod cursor;
pub mod fusion;

pub use actuate::{Actuator, JsonLinesActuator, RecordingActuator, TraceActuator};
pub use cursor::{CursorDriver, ProportionalDriver, StateSpaceDriver};
pub use fusion::{scroll_amount, ActionDispatcher, FusionOutput};

#[derive(thiserror::Error, Debug)]
pub enum ActuateError {
    #[error("action sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("action encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

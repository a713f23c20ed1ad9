//! Temporal event recognizers.
//!
//! Each detector is a plain record with a step function taking the current
//! sample value and the caller-supplied time: `(state, sample, now)` in,
//! `(state, event)` out. None of them touches a system clock, which keeps
//! free-running replay and the test suite honest.
//!
//! All "last fired" timestamps start at negative infinity so the very
//! first qualifying gesture is never blocked by a cooldown.

pub mod blink;
pub mod gaze;
pub mod nod;
pub mod roll;

pub use blink::BlinkDetector;
pub use gaze::{HorizontalGaze, HorizontalGazeDetector, VerticalGazeDetector};
pub use nod::DoubleNodDetector;
pub use roll::RollFlickDetector;

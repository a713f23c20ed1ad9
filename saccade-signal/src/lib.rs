//! Per-sample signal conditioning ahead of the event detectors.
//!
//! Two concerns live here: low-pass filtering of the EOG channels (EMG and
//! power-line noise would otherwise trip the blink thresholds) and removal
//! of the slowly drifting gyroscope bias that makes an untreated cursor
//! creep across the screen.

pub mod bias;
pub mod lowpass;
pub mod window;

pub use bias::{AxisBiasFilter, GyroBiasFilter, GyroCalibration};
pub use lowpass::LowPassFilter;
pub use window::SlidingWindow;

#[derive(thiserror::Error, Debug)]
pub enum SignalError {
    #[error("unsupported filter order {0}: must be an even positive number")]
    UnsupportedFilterOrder(usize),
    #[error("cutoff {cutoff_hz} Hz is not below Nyquist for {sample_rate_hz} Hz sampling")]
    CutoffAboveNyquist { cutoff_hz: f64, sample_rate_hz: f64 },
    #[error("bias tracker update failed: {0}")]
    Kalman(String),
}

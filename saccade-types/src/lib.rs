//! Core data model for the saccade assistive-input pipeline.
//!
//! The pipeline converts a 200 Hz stream of dual-channel EOG plus a
//! three-axis gyroscope into discrete user-interface actions. This crate
//! holds the types shared by every stage: the raw [`SensorPacket`], the
//! intermediate [`EogEvent`] / [`ImuEvent`] classifications, the final
//! [`Action`] emitted to the actuator, and the tuning parameters.

use serde::{Deserialize, Serialize};

/// Sensor sample rate, fixed by the microcontroller firmware.
pub const SAMPLE_RATE_HZ: f64 = 200.0;

/// Interval between samples (5 ms).
pub const SAMPLE_DT: f64 = 1.0 / SAMPLE_RATE_HZ;

/// Midpoint of the 12-bit ADC, the EOG reading for a centered relaxed eye.
pub const EOG_BASELINE: u16 = 2048;

/// Largest representable 12-bit ADC reading.
pub const ADC_MAX: u16 = 4095;

/// One sample from the sensor head.
///
/// ADC fields are guaranteed to be in `0..=ADC_MAX` by the source adapter;
/// packets failing that are dropped before they reach the pipeline.
/// `host_time` is seconds on a monotonic host clock (or a synthesized
/// equivalent during replay) and strictly increases packet to packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPacket {
    /// Milliseconds since source reset (32-bit counter on the device).
    pub device_ms: u32,
    /// Vertical EOG channel (blinks, up/down gaze).
    pub eog_v: u16,
    /// Horizontal EOG channel (left/right gaze).
    pub eog_h: u16,
    /// Raw gyro, pitch axis (nod).
    pub gyro_x: i32,
    /// Raw gyro, yaw axis (turn).
    pub gyro_y: i32,
    /// Raw gyro, roll axis (tilt).
    pub gyro_z: i32,
    /// Host-side arrival time, seconds, monotonic.
    pub host_time: f64,
}

/// Discrete eye event recognized on one sample.
///
/// Blink variants and gaze variants are mutually exclusive: blink-scale
/// deflections are rejected by the gaze classifiers, and a sample inside a
/// blink never reports gaze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EogEvent {
    #[default]
    None,
    DoubleBlink,
    TripleBlink,
    LongBlink,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
}

impl EogEvent {
    /// True for the blink family (as opposed to gaze or `None`).
    pub fn is_blink(&self) -> bool {
        matches!(
            self,
            EogEvent::DoubleBlink | EogEvent::TripleBlink | EogEvent::LongBlink
        )
    }
}

/// Discrete head-motion event recognized on one sample.
///
/// Only produced while the cursor is frozen (horizontal gaze held), so
/// ordinary head steering can never fire one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImuEvent {
    #[default]
    None,
    HeadRollFlick,
    DoubleNod,
}

/// Final action produced by the fusion layer for the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    MoveCursor { dx: f64, dy: f64 },
    LeftClick,
    RightClick,
    DoubleClick,
    ScrollUp(u32),
    ScrollDown(u32),
    NavBack,
    NavForward,
    SwitchWindow,
    CenterCursor,
}

impl Action {
    /// True for actions other than cursor motion. These start the
    /// post-gesture grace window that suppresses residual coupled motion.
    pub fn is_command(&self) -> bool {
        !matches!(self, Action::MoveCursor { .. })
    }
}

/// What a recognized double nod maps to. Hardware revisions disagreed, so
/// the wiring is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodAction {
    #[default]
    CenterCursor,
    DoubleClick,
}

/// EOG low-pass filter parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LowpassParams {
    /// Cutoff frequency in Hz. Must stay below Nyquist.
    pub cutoff_hz: f64,
    /// Butterworth order; realized as `order / 2` second-order sections.
    pub order: usize,
}

impl Default for LowpassParams {
    fn default() -> Self {
        Self {
            cutoff_hz: 30.0,
            order: 4,
        }
    }
}

/// Blink state machine thresholds, windows and cooldowns (seconds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlinkParams {
    /// Vertical EOG level above which the eye is considered closed.
    pub threshold: f64,
    /// Shorter pulses are discarded as noise.
    pub min_duration: f64,
    /// Longest duration of a normal (clickable) blink.
    pub max_duration: f64,
    /// A second blink must start within this window of the first release.
    pub double_window: f64,
    /// A third blink must start within this window of the second release.
    pub triple_window: f64,
    pub double_cooldown: f64,
    pub triple_cooldown: f64,
    /// Held-closed duration range recognized as a long blink.
    pub long_min_duration: f64,
    pub long_max_duration: f64,
    pub long_cooldown: f64,
}

impl Default for BlinkParams {
    fn default() -> Self {
        Self {
            threshold: 3000.0,
            min_duration: 0.05,
            max_duration: 0.25,
            double_window: 0.6,
            triple_window: 0.6,
            double_cooldown: 0.8,
            triple_cooldown: 1.0,
            long_min_duration: 0.4,
            long_max_duration: 2.5,
            long_cooldown: 1.0,
        }
    }
}

/// Sustained-gaze classifier thresholds (ADC counts) and hold times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GazeParams {
    pub up_threshold: f64,
    pub down_threshold: f64,
    pub right_threshold: f64,
    pub left_threshold: f64,
    /// Vertical gaze must be held this long before it is reported.
    pub vertical_min_hold: f64,
    /// Horizontal gaze needs a slightly longer hold to avoid false nav.
    pub horizontal_min_hold: f64,
    /// Minimum spacing between debounced horizontal gaze reports.
    pub horizontal_cooldown: f64,
}

impl Default for GazeParams {
    fn default() -> Self {
        Self {
            up_threshold: 2800.0,
            down_threshold: 1200.0,
            right_threshold: 2800.0,
            left_threshold: 1200.0,
            vertical_min_hold: 0.1,
            horizontal_min_hold: 0.15,
            horizontal_cooldown: 1.0,
        }
    }
}

/// Gyro conditioning: deadzone and startup calibration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GyroParams {
    /// Corrected readings with magnitude below this are treated as zero.
    pub deadzone: f64,
    /// Samples averaged for the stationary bias estimate (2 s at 200 Hz).
    pub calibration_samples: usize,
    /// Samples discarded before averaging while the sensor settles.
    pub calibration_discard: usize,
}

impl Default for GyroParams {
    fn default() -> Self {
        Self {
            deadzone: 300.0,
            calibration_samples: 400,
            calibration_discard: 50,
        }
    }
}

/// Per-axis bias tracker noise model.
///
/// The rate process noise dwarfs the bias process noise, so a sustained
/// offset is gradually attributed to bias drift while quick motion passes
/// straight through as rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiasKalmanParams {
    /// Process noise of the angular rate (large: rate is white).
    pub q_rate: f64,
    /// Process noise of the bias (tiny: bias drifts slowly).
    pub q_bias: f64,
    /// Measurement noise variance of the gyro reading.
    pub r: f64,
}

impl Default for BiasKalmanParams {
    fn default() -> Self {
        Self {
            q_rate: 1000.0,
            q_bias: 0.001,
            r: 500.0,
        }
    }
}

/// Head-roll flick recognizer parameters (roll axis, window switching).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RollFlickParams {
    pub threshold: f64,
    /// The spike must return below threshold within this time.
    pub max_duration: f64,
    pub cooldown: f64,
}

impl Default for RollFlickParams {
    fn default() -> Self {
        Self {
            threshold: 3000.0,
            max_duration: 0.3,
            cooldown: 1.0,
        }
    }
}

/// Double-nod recognizer parameters (pitch axis).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DoubleNodParams {
    pub threshold: f64,
    /// Maximum duration of each individual nod pulse.
    pub max_duration: f64,
    /// The second nod must complete within this window of the first.
    pub pair_window: f64,
    pub cooldown: f64,
}

impl Default for DoubleNodParams {
    fn default() -> Self {
        Self {
            threshold: 3000.0,
            max_duration: 0.3,
            pair_window: 0.8,
            cooldown: 1.0,
        }
    }
}

/// Cursor integrator tuning, shared by both driver variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CursorParams {
    /// Gyro-to-pixel scale of the proportional driver.
    pub proportional_sensitivity: f64,
    /// Input gain of the state-space driver.
    pub input_gain: f64,
    /// Velocity retained per step by the state-space driver
    /// (0.8 stops quickly, 0.99 glides for a long time).
    pub velocity_retain: f64,
    /// Integration time step.
    pub dt: f64,
}

impl Default for CursorParams {
    fn default() -> Self {
        Self {
            proportional_sensitivity: 0.01,
            input_gain: 0.05,
            velocity_retain: 0.95,
            dt: SAMPLE_DT,
        }
    }
}

/// Fusion-layer cooldowns and action wiring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionParams {
    /// Minimum spacing between scroll events.
    pub scroll_cooldown: f64,
    /// Base scroll magnitude; scales with head speed over the deadzone.
    pub scroll_base_amount: u32,
    /// Minimum spacing between navigation (back/forward) events.
    pub nav_cooldown: f64,
    /// Cursor suppression window after any non-motion action, absorbing
    /// residual coupled head motion.
    pub grace_window: f64,
    /// Smallest cursor delta worth forwarding to the actuator, pixels.
    pub min_move: f64,
    pub nod_action: NodAction,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            scroll_cooldown: 0.08,
            scroll_base_amount: 30,
            nav_cooldown: 1.0,
            grace_window: 0.3,
            min_move: 0.1,
            nod_action: NodAction::CenterCursor,
        }
    }
}

/// Sliding-window classifier parameters (`ml` mode).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Samples per classification window (0.5 s at 200 Hz).
    pub window_size: usize,
    /// Samples between successive classifications.
    pub window_step: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            window_size: 100,
            window_step: 20,
        }
    }
}

/// Every tunable of the pipeline in one place.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PipelineParams {
    pub lowpass: LowpassParams,
    pub blink: BlinkParams,
    pub gaze: GazeParams,
    pub gyro: GyroParams,
    pub bias: BiasKalmanParams,
    pub roll: RollFlickParams,
    pub nod: DoubleNodParams,
    pub cursor: CursorParams,
    pub fusion: FusionParams,
    pub classifier: ClassifierParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_round_trips_through_json() {
        let packet = SensorPacket {
            device_ms: 12345,
            eog_v: 2048,
            eog_h: 2100,
            gyro_x: -512,
            gyro_y: 17,
            gyro_z: 0,
            host_time: 1.25,
        };
        let buf = serde_json::to_string(&packet).unwrap();
        let back: SensorPacket = serde_json::from_str(&buf).unwrap();
        assert_eq!(packet, back);
    }

    #[test]
    fn default_params_are_consistent() {
        let p = PipelineParams::default();
        assert!(p.blink.min_duration < p.blink.max_duration);
        assert!(p.blink.max_duration < p.blink.long_min_duration);
        assert!(p.blink.long_min_duration < p.blink.long_max_duration);
        assert!(p.gaze.down_threshold < p.gaze.up_threshold);
        assert!(p.gaze.up_threshold < p.blink.threshold);
        assert!(p.lowpass.cutoff_hz < SAMPLE_RATE_HZ / 2.0);
        assert!(p.classifier.window_step <= p.classifier.window_size);
    }

    #[test]
    fn command_actions_exclude_motion() {
        assert!(!Action::MoveCursor { dx: 1.0, dy: 0.0 }.is_command());
        assert!(Action::SwitchWindow.is_command());
        assert!(Action::ScrollUp(3).is_command());
    }
}

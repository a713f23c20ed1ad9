//! Sustained-gaze classifiers.
//!
//! A gaze is a deviation that parks between the gaze threshold and the
//! blink threshold and stays there; requiring a minimum hold separates it
//! from the fast transient of a blink or a glance.

use saccade_types::{EogEvent, GazeParams};

/// Vertical channel: look up / look down.
///
/// Blink-scale signals are not gaze, so anything above the blink threshold
/// resets the classifier. Once a direction has been held for the minimum
/// time, it is reported on every subsequent sample for as long as the
/// level persists, which the fusion layer needs for continuous scrolling.
#[derive(Debug)]
pub struct VerticalGazeDetector {
    up_threshold: f64,
    down_threshold: f64,
    blink_threshold: f64,
    min_hold: f64,
    current: EogEvent,
    start: f64,
}

impl VerticalGazeDetector {
    pub fn new(params: &GazeParams, blink_threshold: f64) -> Self {
        Self {
            up_threshold: params.up_threshold,
            down_threshold: params.down_threshold,
            blink_threshold,
            min_hold: params.vertical_min_hold,
            current: EogEvent::None,
            start: 0.0,
        }
    }

    pub fn step(&mut self, eog_v: f64, now: f64) -> EogEvent {
        if eog_v > self.blink_threshold {
            self.current = EogEvent::None;
            return EogEvent::None;
        }

        let observed = if eog_v > self.up_threshold {
            EogEvent::LookUp
        } else if eog_v < self.down_threshold {
            EogEvent::LookDown
        } else {
            self.current = EogEvent::None;
            return EogEvent::None;
        };

        if observed != self.current {
            self.current = observed;
            self.start = now;
            return EogEvent::None;
        }

        if now - self.start >= self.min_hold {
            self.current
        } else {
            EogEvent::None
        }
    }

    pub fn reset(&mut self) {
        self.current = EogEvent::None;
    }
}

/// Output of the horizontal classifier for one sample.
///
/// `event` is the debounced, cooldown-gated report that feeds navigation
/// fusion. `cursor_frozen` is the instantaneous level test that gates the
/// ballistic head-gesture detectors and the cursor integrator; conflating
/// the two would either delay freezes or spam navigation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalGaze {
    pub event: EogEvent,
    pub cursor_frozen: bool,
}

/// Horizontal channel: look left / look right, plus the freeze gate.
#[derive(Debug)]
pub struct HorizontalGazeDetector {
    right_threshold: f64,
    left_threshold: f64,
    min_hold: f64,
    cooldown: f64,
    current: EogEvent,
    start: f64,
    last_trigger: f64,
}

impl HorizontalGazeDetector {
    pub fn new(params: &GazeParams) -> Self {
        Self {
            right_threshold: params.right_threshold,
            left_threshold: params.left_threshold,
            min_hold: params.horizontal_min_hold,
            cooldown: params.horizontal_cooldown,
            current: EogEvent::None,
            start: 0.0,
            last_trigger: f64::NEG_INFINITY,
        }
    }

    pub fn step(&mut self, eog_h: f64, now: f64) -> HorizontalGaze {
        let observed = if eog_h > self.right_threshold {
            EogEvent::LookRight
        } else if eog_h < self.left_threshold {
            EogEvent::LookLeft
        } else {
            self.current = EogEvent::None;
            return HorizontalGaze {
                event: EogEvent::None,
                cursor_frozen: false,
            };
        };

        if observed != self.current {
            self.current = observed;
            self.start = now;
            return HorizontalGaze {
                event: EogEvent::None,
                cursor_frozen: true,
            };
        }

        let event = if now - self.start >= self.min_hold
            && now - self.last_trigger > self.cooldown
        {
            self.last_trigger = now;
            self.current
        } else {
            EogEvent::None
        };
        HorizontalGaze {
            event,
            cursor_frozen: true,
        }
    }

    pub fn reset(&mut self) {
        self.current = EogEvent::None;
        self.last_trigger = f64::NEG_INFINITY;
    }
}

//! Blink pattern recognizer on the vertical EOG channel.
//!
//! A four-state machine distinguishes single (ignored), double, triple and
//! long blinks. Multi-blink decisions are deferred: a long blink fires on
//! release rather than while held, and a double blink only fires once the
//! window for a third blink has expired, so the patterns never pre-empt
//! each other.

use tracing::debug;

use saccade_types::{BlinkParams, EogEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlinkState {
    /// Waiting for the signal to rise above threshold.
    Idle,
    /// Above threshold, blink in progress.
    InBlink,
    /// One blink released, watching for a second.
    WaitSecond,
    /// Two blinks released, watching for a third.
    WaitThird,
}

#[derive(Debug)]
pub struct BlinkDetector {
    params: BlinkParams,
    state: BlinkState,
    /// When the current blink rose above threshold.
    blink_start: f64,
    /// When the previous blink released.
    blink_end: f64,
    /// Blinks seen in the current pattern (1..=3).
    count: u8,
    last_event: f64,
}

impl BlinkDetector {
    pub fn new(params: BlinkParams) -> Self {
        Self {
            params,
            state: BlinkState::Idle,
            blink_start: 0.0,
            blink_end: 0.0,
            count: 0,
            last_event: f64::NEG_INFINITY,
        }
    }

    /// Feed one filtered vertical EOG sample.
    pub fn step(&mut self, eog_v: f64, now: f64) -> EogEvent {
        let high = eog_v > self.params.threshold;

        match self.state {
            BlinkState::Idle => {
                if high {
                    self.state = BlinkState::InBlink;
                    self.blink_start = now;
                    self.count = 1;
                }
                EogEvent::None
            }
            BlinkState::InBlink => {
                if high {
                    return EogEvent::None;
                }
                let duration = now - self.blink_start;
                if duration <= self.params.min_duration {
                    // Noise pulse.
                    self.state = BlinkState::Idle;
                    EogEvent::None
                } else if self.count >= 3 {
                    self.state = BlinkState::Idle;
                    if duration <= self.params.max_duration
                        && now - self.last_event > self.params.triple_cooldown
                    {
                        self.last_event = now;
                        debug!(duration, "triple blink");
                        EogEvent::TripleBlink
                    } else {
                        EogEvent::None
                    }
                } else if self.count >= 2 {
                    if duration <= self.params.max_duration {
                        self.blink_end = now;
                        self.state = BlinkState::WaitThird;
                    } else {
                        self.state = BlinkState::Idle;
                    }
                    EogEvent::None
                } else if duration >= self.params.long_min_duration {
                    self.state = BlinkState::Idle;
                    if duration <= self.params.long_max_duration
                        && now - self.last_event > self.params.long_cooldown
                    {
                        self.last_event = now;
                        debug!(duration, "long blink");
                        EogEvent::LongBlink
                    } else {
                        EogEvent::None
                    }
                } else if duration <= self.params.max_duration {
                    self.blink_end = now;
                    self.state = BlinkState::WaitSecond;
                    EogEvent::None
                } else {
                    // Ambiguous gap between a normal and a long blink.
                    self.state = BlinkState::Idle;
                    EogEvent::None
                }
            }
            BlinkState::WaitSecond => {
                let elapsed = now - self.blink_end;
                if high && elapsed < self.params.double_window {
                    self.state = BlinkState::InBlink;
                    self.blink_start = now;
                    self.count = 2;
                } else if elapsed >= self.params.double_window {
                    // Lone blink, deliberately ignored.
                    self.state = BlinkState::Idle;
                }
                EogEvent::None
            }
            BlinkState::WaitThird => {
                let elapsed = now - self.blink_end;
                if high && elapsed < self.params.triple_window {
                    self.state = BlinkState::InBlink;
                    self.blink_start = now;
                    self.count = 3;
                    EogEvent::None
                } else if elapsed >= self.params.triple_window {
                    self.state = BlinkState::Idle;
                    if now - self.last_event > self.params.double_cooldown {
                        self.last_event = now;
                        debug!("double blink");
                        EogEvent::DoubleBlink
                    } else {
                        EogEvent::None
                    }
                } else {
                    EogEvent::None
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = BlinkState::Idle;
        self.count = 0;
        self.last_event = f64::NEG_INFINITY;
    }
}

//! Double-nod recognizer on the (bias-corrected) pitch axis.
//!
//! Two ballistic pulses completing within the pair window make a double
//! nod. Gated by the cursor-frozen flag exactly like the roll detector,
//! with the same held-too-long suppression latch per pulse.

use tracing::debug;

use saccade_types::{DoubleNodParams, ImuEvent};

#[derive(Debug)]
pub struct DoubleNodDetector {
    params: DoubleNodParams,
    last_trigger: f64,
    spike_start: Option<f64>,
    suppressed: bool,
    /// Completion time of a pending first nod.
    first_nod: Option<f64>,
}

impl DoubleNodDetector {
    pub fn new(params: DoubleNodParams) -> Self {
        Self {
            params,
            last_trigger: f64::NEG_INFINITY,
            spike_start: None,
            suppressed: false,
            first_nod: None,
        }
    }

    /// Feed one corrected pitch-axis sample.
    pub fn step(&mut self, gx: f64, now: f64, cursor_frozen: bool) -> ImuEvent {
        if !cursor_frozen {
            self.spike_start = None;
            self.suppressed = false;
            self.first_nod = None;
            return ImuEvent::None;
        }

        let above = gx.abs() > self.params.threshold;

        if above {
            if self.suppressed {
                // Waiting for the signal to drop.
            } else if self.spike_start.is_none() {
                self.spike_start = Some(now);
            } else if now - self.spike_start.unwrap_or(now) > self.params.max_duration {
                self.spike_start = None;
                self.suppressed = true;
            }
            return ImuEvent::None;
        }

        let mut event = ImuEvent::None;
        if self.suppressed {
            self.suppressed = false;
        } else if let Some(start) = self.spike_start.take() {
            let duration = now - start;
            if duration <= self.params.max_duration {
                match self.first_nod {
                    Some(first)
                        if now - first <= self.params.pair_window
                            && now - self.last_trigger > self.params.cooldown =>
                    {
                        self.first_nod = None;
                        self.last_trigger = now;
                        debug!("double nod");
                        event = ImuEvent::DoubleNod;
                    }
                    _ => {
                        // Window expired or cooldown running: this nod
                        // becomes the new first.
                        self.first_nod = Some(now);
                    }
                }
            }
        }

        if let Some(first) = self.first_nod {
            if now - first > self.params.pair_window {
                self.first_nod = None;
            }
        }
        event
    }

    pub fn reset(&mut self) {
        self.last_trigger = f64::NEG_INFINITY;
        self.spike_start = None;
        self.suppressed = false;
        self.first_nod = None;
    }
}

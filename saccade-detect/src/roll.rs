//! Head-roll flick recognizer on the (bias-corrected) roll axis.
//!
//! A flick is a ballistic pulse: the magnitude crosses the threshold and
//! returns within the maximum duration. The detector only runs while the
//! cursor is frozen; outside that gate all state is cleared so stale
//! spikes from ordinary head steering cannot leak in when the user later
//! freezes the cursor.

use tracing::debug;

use saccade_types::{ImuEvent, RollFlickParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RollDirection {
    Left,
    Right,
}

#[derive(Debug)]
pub struct RollFlickDetector {
    params: RollFlickParams,
    last_trigger: f64,
    spike_start: Option<f64>,
    direction: Option<RollDirection>,
    /// Set when a spike is held past the maximum duration; stays set until
    /// the signal drops below threshold, so a long static tilt cannot
    /// retry the instant it briefly dips.
    suppressed: bool,
}

impl RollFlickDetector {
    pub fn new(params: RollFlickParams) -> Self {
        Self {
            params,
            last_trigger: f64::NEG_INFINITY,
            spike_start: None,
            direction: None,
            suppressed: false,
        }
    }

    /// Feed one corrected roll-axis sample.
    pub fn step(&mut self, gz: f64, now: f64, cursor_frozen: bool) -> ImuEvent {
        if !cursor_frozen {
            self.spike_start = None;
            self.direction = None;
            self.suppressed = false;
            return ImuEvent::None;
        }

        let above = gz.abs() > self.params.threshold;

        if above {
            if self.suppressed {
                // Still held after a held-too-long discard.
            } else if self.spike_start.is_none() {
                self.spike_start = Some(now);
                self.direction = Some(if gz > 0.0 {
                    RollDirection::Right
                } else {
                    RollDirection::Left
                });
            } else if now - self.spike_start.unwrap_or(now) > self.params.max_duration {
                self.spike_start = None;
                self.direction = None;
                self.suppressed = true;
            }
            return ImuEvent::None;
        }

        if self.suppressed {
            self.suppressed = false;
        } else if let Some(start) = self.spike_start.take() {
            let duration = now - start;
            let direction = self.direction.take();
            if duration <= self.params.max_duration
                && now - self.last_trigger > self.params.cooldown
            {
                self.last_trigger = now;
                debug!(duration, ?direction, "head roll flick");
                return ImuEvent::HeadRollFlick;
            }
        }
        ImuEvent::None
    }

    pub fn reset(&mut self) {
        self.last_trigger = f64::NEG_INFINITY;
        self.spike_start = None;
        self.direction = None;
        self.suppressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.005;

    fn feed(det: &mut RollFlickDetector, spans: &[(usize, f64, bool)], i0: &mut usize) -> usize {
        let mut fired = 0;
        for &(n, gz, frozen) in spans {
            for _ in 0..n {
                let now = *i0 as f64 * DT;
                if det.step(gz, now, frozen) == ImuEvent::HeadRollFlick {
                    fired += 1;
                }
                *i0 += 1;
            }
        }
        fired
    }

    #[test]
    fn flick_fires_when_frozen() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        // 50 ms pulse inside a frozen window.
        let fired = feed(
            &mut det,
            &[(20, 0.0, true), (10, 4000.0, true), (20, 0.0, true)],
            &mut i,
        );
        assert_eq!(fired, 1);
    }

    #[test]
    fn negative_direction_also_fires() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        let fired = feed(
            &mut det,
            &[(20, 0.0, true), (10, -4000.0, true), (20, 0.0, true)],
            &mut i,
        );
        assert_eq!(fired, 1);
    }

    #[test]
    fn ignored_without_freeze() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        let fired = feed(
            &mut det,
            &[(20, 0.0, false), (10, 4000.0, false), (20, 0.0, false)],
            &mut i,
        );
        assert_eq!(fired, 0);
    }

    #[test]
    fn unfreeze_clears_pending_spike() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        // Spike starts while frozen, but the freeze lapses before release.
        let fired = feed(
            &mut det,
            &[
                (10, 4000.0, true),
                (2, 4000.0, false),
                (20, 0.0, true),
            ],
            &mut i,
        );
        assert_eq!(fired, 0);
    }

    #[test]
    fn held_tilt_is_suppressed_through_brief_dip() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        // 400 ms hold exceeds the 300 ms flick limit; the drop afterwards
        // clears the latch without firing.
        let fired = feed(&mut det, &[(80, 4000.0, true), (20, 0.0, true)], &mut i);
        assert_eq!(fired, 0);
        // A fresh short pulse then counts.
        let fired = feed(&mut det, &[(10, 4000.0, true), (10, 0.0, true)], &mut i);
        assert_eq!(fired, 1);
    }

    #[test]
    fn cooldown_spaces_flicks() {
        let mut det = RollFlickDetector::new(RollFlickParams::default());
        let mut i = 0;
        // Two quick pulses 100 ms apart: second blocked by 1 s cooldown.
        let fired = feed(
            &mut det,
            &[
                (10, 4000.0, true),
                (20, 0.0, true),
                (10, 4000.0, true),
                (20, 0.0, true),
            ],
            &mut i,
        );
        assert_eq!(fired, 1);
        // After the cooldown has elapsed a new flick goes through.
        let fired = feed(
            &mut det,
            &[(200, 0.0, true), (10, 4000.0, true), (10, 0.0, true)],
            &mut i,
        );
        assert_eq!(fired, 1);
    }
}

//! Per-sample orchestration: detectors in, actions out.
//!
//! The dispatcher owns every detector, the cursor driver and all
//! per-action-class cooldowns. Order within a sample is fixed: the
//! suppression flag and cursor motion are resolved first, then discrete
//! commands, so a gesture's first sample freezes motion before anything
//! else happens.

use tracing::{debug, info};

use saccade_detect::{
    BlinkDetector, DoubleNodDetector, HorizontalGazeDetector, RollFlickDetector,
    VerticalGazeDetector,
};
use saccade_types::{Action, EogEvent, ImuEvent, NodAction, PipelineParams};

use crate::cursor::CursorDriver;

/// Last-fire timestamps per action class. The invariant enforced here:
/// no class fires again until its cooldown has fully elapsed.
#[derive(Debug, Clone, Copy)]
struct CooldownLedger {
    scroll: f64,
    nav: f64,
    /// Most recent non-motion action of any class; starts the grace
    /// window that suppresses cursor motion.
    command: f64,
}

impl CooldownLedger {
    fn new() -> Self {
        Self {
            scroll: f64::NEG_INFINITY,
            nav: f64::NEG_INFINITY,
            command: f64::NEG_INFINITY,
        }
    }
}

/// Everything the fusion layer concluded about one sample.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    /// The sample's eye classification (blink takes precedence over gaze).
    pub eog_event: EogEvent,
    /// The sample's head-gesture classification.
    pub imu_event: ImuEvent,
    /// Whether the cursor was frozen this tick.
    pub cursor_frozen: bool,
    /// Actions to hand to the actuator, in dispatch order.
    pub actions: Vec<Action>,
}

pub struct ActionDispatcher {
    params: PipelineParams,
    blink: BlinkDetector,
    vertical: VerticalGazeDetector,
    horizontal: HorizontalGazeDetector,
    roll: RollFlickDetector,
    nod: DoubleNodDetector,
    driver: Box<dyn CursorDriver + Send>,
    cooldowns: CooldownLedger,
}

impl ActionDispatcher {
    pub fn new(params: PipelineParams, driver: Box<dyn CursorDriver + Send>) -> Self {
        Self {
            blink: BlinkDetector::new(params.blink),
            vertical: VerticalGazeDetector::new(&params.gaze, params.blink.threshold),
            horizontal: HorizontalGazeDetector::new(&params.gaze),
            roll: RollFlickDetector::new(params.roll),
            nod: DoubleNodDetector::new(params.nod),
            driver,
            cooldowns: CooldownLedger::new(),
            params,
        }
    }

    /// Process one conditioned sample.
    ///
    /// `eog_v`/`eog_h` are low-pass-filtered ADC levels; `gx`/`gy`/`gz`
    /// are bias-corrected gyro rates. `frozen_override` lets an external
    /// event source (the windowed classifier) force the cursor-frozen
    /// state when it has recognized horizontal gaze on its own.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        eog_v: f64,
        eog_h: f64,
        gx: f64,
        gy: f64,
        gz: f64,
        now: f64,
        frozen_override: bool,
    ) -> FusionOutput {
        let p = &self.params;
        let deadzone = p.gyro.deadzone;
        let mut actions = Vec::new();

        // 1. Composite suppression. Vertical gaze and the freeze are
        // instantaneous level tests; the grace window after the last
        // discrete action absorbs residual coupled motion.
        let horizontal = self.horizontal.step(eog_h, now);
        let cursor_frozen = horizontal.cursor_frozen || frozen_override;
        let gaze_vertical = eog_v > p.gaze.up_threshold || eog_v < p.gaze.down_threshold;
        let any_action = gaze_vertical
            || cursor_frozen
            || now - self.cooldowns.command < p.fusion.grace_window;

        // 2. Cursor motion, before any command dispatch.
        let (dx, dy) = self.driver.step(gx, gy, any_action);
        if dx.abs() > p.fusion.min_move || dy.abs() > p.fusion.min_move {
            actions.push(Action::MoveCursor { dx, dy });
        }

        // 3. Blink patterns. The detector's internal cooldowns already
        // space these out.
        let blink = self.blink.step(eog_v, now);
        match blink {
            EogEvent::DoubleBlink => {
                info!("double blink -> left click");
                actions.push(Action::LeftClick);
            }
            EogEvent::LongBlink => {
                info!("long blink -> right click");
                actions.push(Action::RightClick);
            }
            EogEvent::TripleBlink => {
                info!("triple blink -> double click");
                actions.push(Action::DoubleClick);
            }
            _ => {}
        }

        // 4. Scroll requires eye and head to agree on the vertical axis.
        let vertical = self.vertical.step(eog_v, now);
        match vertical {
            EogEvent::LookUp if gx < -deadzone => {
                if now - self.cooldowns.scroll > p.fusion.scroll_cooldown {
                    let amount = scroll_amount(gx, deadzone, p.fusion.scroll_base_amount);
                    debug!(amount, "scroll up");
                    actions.push(Action::ScrollUp(amount));
                    self.cooldowns.scroll = now;
                }
            }
            EogEvent::LookDown if gx > deadzone => {
                if now - self.cooldowns.scroll > p.fusion.scroll_cooldown {
                    let amount = scroll_amount(gx, deadzone, p.fusion.scroll_base_amount);
                    debug!(amount, "scroll down");
                    actions.push(Action::ScrollDown(amount));
                    self.cooldowns.scroll = now;
                }
            }
            _ => {}
        }

        // 5. Navigation requires eye and head to agree on the horizontal
        // axis; the debounced gaze report is used here, not the raw level.
        match horizontal.event {
            EogEvent::LookLeft if gy < -deadzone => {
                if now - self.cooldowns.nav > p.fusion.nav_cooldown {
                    info!("eye left + head left -> back");
                    actions.push(Action::NavBack);
                    self.cooldowns.nav = now;
                }
            }
            EogEvent::LookRight if gy > deadzone => {
                if now - self.cooldowns.nav > p.fusion.nav_cooldown {
                    info!("eye right + head right -> forward");
                    actions.push(Action::NavForward);
                    self.cooldowns.nav = now;
                }
            }
            _ => {}
        }

        // 6. Window switch: roll flick, gated on the freeze. The
        // detector's own cooldown spaces repeats.
        let roll = self.roll.step(gz, now, cursor_frozen);
        if roll == ImuEvent::HeadRollFlick {
            info!("head roll flick -> switch window");
            actions.push(Action::SwitchWindow);
        }

        // 7. Double nod, same gate; wiring is configurable.
        let nod = self.nod.step(gx, now, cursor_frozen);
        if nod == ImuEvent::DoubleNod {
            let action = match p.fusion.nod_action {
                NodAction::CenterCursor => Action::CenterCursor,
                NodAction::DoubleClick => Action::DoubleClick,
            };
            info!(?action, "double nod");
            actions.push(action);
        }

        if actions.iter().any(|a| a.is_command()) {
            self.cooldowns.command = now;
        }

        let eog_event = if blink != EogEvent::None {
            blink
        } else if vertical != EogEvent::None {
            vertical
        } else {
            horizontal.event
        };
        let imu_event = if roll != ImuEvent::None { roll } else { nod };

        FusionOutput {
            eog_event,
            imu_event,
            cursor_frozen,
            actions,
        }
    }

    /// Hard-stop any retained cursor motion (used by the classifier mode
    /// while a non-idle, non-gaze event is in progress).
    pub fn halt_cursor(&mut self) {
        self.driver.halt();
    }

    /// Return every detector, the driver and the cooldown ledger to the
    /// power-on state.
    pub fn reset(&mut self) {
        self.blink.reset();
        self.vertical.reset();
        self.horizontal.reset();
        self.roll.reset();
        self.nod.reset();
        self.driver.reset();
        self.cooldowns = CooldownLedger::new();
    }
}

/// Scroll magnitude scales with how far past the deadzone the head moved.
pub fn scroll_amount(gx: f64, deadzone: f64, base: u32) -> u32 {
    let scaled = (gx.abs() / deadzone * base as f64).round() as u32;
    scaled.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_amount_scales_and_clamps() {
        assert_eq!(scroll_amount(-600.0, 300.0, 30), 60);
        assert_eq!(scroll_amount(301.0, 300.0, 30), 30);
        assert_eq!(scroll_amount(5.0, 300.0, 30), 1);
    }
}

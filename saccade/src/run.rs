//! The control loop: source -> conditioning -> detectors -> fusion ->
//! actuator, one packet at a time, no suspension points in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use saccade_control::{
    ActionDispatcher, Actuator, CursorDriver, JsonLinesActuator, ProportionalDriver,
    StateSpaceDriver, TraceActuator,
};
use saccade_ml::{GestureClass, MlError, WindowClassifier};
use saccade_signal::{GyroBiasFilter, GyroCalibration, LowPassFilter, SignalError};
use saccade_sources::{DemoSource, PacketSource, ReplaySource, SerialSource, SourceError};
use saccade_types::{Action, PipelineParams, SensorPacket, EOG_BASELINE, SAMPLE_RATE_HZ};

use crate::{Cli, Mode};

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Interrupted,
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Classifier(#[from] MlError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error("installing interrupt handler: {0}")]
    Setup(#[from] ctrlc::Error),
    #[error("source ended during gyro calibration")]
    CalibrationTruncated,
}

pub fn run(cli: Cli) -> Result<RunOutcome, RunError> {
    let params = build_params(&cli);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
    }

    let mut source = make_source(&cli)?;
    log_startup(&cli, &params);

    // The demo script synthesizes bias-free data; hardware and recordings
    // need the stationary calibration followed by the runtime tracker.
    let mut corrector = if cli.simulate {
        None
    } else {
        match calibrate(source.as_mut(), &params, &interrupted)? {
            Some(filter) => Some(filter),
            None => return Ok(RunOutcome::Interrupted),
        }
    };

    let mut actuator: Box<dyn Actuator> = if cli.dry_run {
        Box::new(TraceActuator)
    } else {
        Box::new(JsonLinesActuator::stdout())
    };

    match cli.mode {
        Mode::Threshold | Mode::Statespace => {
            let driver: Box<dyn CursorDriver + Send> = match cli.mode {
                Mode::Threshold => {
                    Box::new(ProportionalDriver::new(&params.cursor, params.gyro.deadzone))
                }
                _ => Box::new(StateSpaceDriver::new(&params.cursor, params.gyro.deadzone)),
            };
            let dispatcher = ActionDispatcher::new(params, driver);
            detector_loop(
                source.as_mut(),
                dispatcher,
                corrector.as_mut(),
                &params,
                actuator.as_mut(),
                &interrupted,
            )
        }
        Mode::Ml => {
            let classifier = WindowClassifier::load(&cli.model, &cli.scaler, &params.classifier)?;
            let driver = Box::new(StateSpaceDriver::new(&params.cursor, params.gyro.deadzone));
            let dispatcher = ActionDispatcher::new(params, driver);
            classifier_loop(
                source.as_mut(),
                classifier,
                dispatcher,
                corrector.as_mut(),
                &params,
                actuator.as_mut(),
                &interrupted,
            )
        }
    }
}

fn build_params(cli: &Cli) -> PipelineParams {
    let mut params = PipelineParams::default();
    if let Some(sensitivity) = cli.sensitivity {
        params.cursor.proportional_sensitivity = sensitivity;
        params.cursor.input_gain = sensitivity;
    }
    if let Some(retain) = cli.velocity_retain {
        params.cursor.velocity_retain = retain;
    }
    if let Some(deadzone) = cli.deadzone {
        params.gyro.deadzone = deadzone;
    }
    if let Some(threshold) = cli.blink_threshold {
        params.blink.threshold = threshold;
    }
    params.fusion.grace_window = cli.grace;
    params.fusion.nod_action = cli.nod_action.into();
    params
}

fn make_source(cli: &Cli) -> Result<Box<dyn PacketSource>, RunError> {
    if let Some(path) = &cli.replay {
        let source = ReplaySource::open(path, !cli.replay_fast, cli.replay_loop)?;
        info!(
            samples = source.num_samples(),
            seconds = source.duration_seconds(),
            fast = cli.replay_fast,
            looping = cli.replay_loop,
            "source: replay {}",
            path.display()
        );
        Ok(Box::new(source))
    } else if cli.simulate {
        Ok(Box::new(DemoSource::new()))
    } else {
        Ok(Box::new(SerialSource::connect(&cli.port, cli.baudrate)?))
    }
}

fn log_startup(cli: &Cli, params: &PipelineParams) {
    info!(mode = ?cli.mode, "saccade starting");
    info!(
        blink_threshold = params.blink.threshold,
        deadzone = params.gyro.deadzone,
        grace = params.fusion.grace_window,
        "double blink = left click, long blink = right click, triple = double click"
    );
    info!("scroll: eye up/down + head tilt; nav: eye left/right + head turn");
    info!(nod_action = ?params.fusion.nod_action, "freeze (look left/right) gates roll flick and double nod");
}

/// Stationary startup calibration feeding the runtime bias tracker.
/// Returns `None` on interrupt.
fn calibrate(
    source: &mut dyn PacketSource,
    params: &PipelineParams,
    interrupted: &AtomicBool,
) -> Result<Option<GyroBiasFilter>, RunError> {
    info!(
        discard = params.gyro.calibration_discard,
        samples = params.gyro.calibration_samples,
        "calibrating gyroscope; keep the device still"
    );
    let mut calibration = GyroCalibration::new(&params.gyro);
    loop {
        if interrupted.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let packet = source
            .next_packet()?
            .ok_or(RunError::CalibrationTruncated)?;
        if let Some(bias) = calibration.push(&packet) {
            info!(
                bx = bias[0],
                by = bias[1],
                bz = bias[2],
                "gyro bias calibrated; bias tracker active"
            );
            let mut filter = GyroBiasFilter::new(&params.bias);
            filter.seed(bias);
            return Ok(Some(filter));
        }
    }
}

/// Correct one packet's gyro readings, or pass them through raw when no
/// tracker is active (demo source).
fn corrected_gyro(
    corrector: &mut Option<&mut GyroBiasFilter>,
    packet: &SensorPacket,
) -> Result<(i32, i32, i32), RunError> {
    match corrector {
        Some(filter) => Ok(filter.step(packet.gyro_x, packet.gyro_y, packet.gyro_z)?),
        None => Ok((packet.gyro_x, packet.gyro_y, packet.gyro_z)),
    }
}

/// Host UI injection is best-effort: a refused action is logged, never
/// fatal to the loop.
fn deliver(actuator: &mut dyn Actuator, actions: &[Action]) {
    for action in actions {
        if let Err(e) = actuator.act(action) {
            warn!(?action, error = %e, "actuator refused action");
        }
    }
}

fn detector_loop(
    source: &mut dyn PacketSource,
    mut dispatcher: ActionDispatcher,
    mut corrector: Option<&mut GyroBiasFilter>,
    params: &PipelineParams,
    actuator: &mut dyn Actuator,
    interrupted: &AtomicBool,
) -> Result<RunOutcome, RunError> {
    let mut filter_v =
        LowPassFilter::butterworth(params.lowpass.order, params.lowpass.cutoff_hz, SAMPLE_RATE_HZ)?;
    let mut filter_h =
        LowPassFilter::butterworth(params.lowpass.order, params.lowpass.cutoff_hz, SAMPLE_RATE_HZ)?;

    while !interrupted.load(Ordering::Relaxed) {
        let Some(packet) = source.next_packet()? else {
            info!("source exhausted");
            return Ok(RunOutcome::Finished);
        };
        let eog_v = filter_v.apply(packet.eog_v as f64);
        let eog_h = filter_h.apply(packet.eog_h as f64);
        let (gx, gy, gz) = corrected_gyro(&mut corrector, &packet)?;
        let out = dispatcher.step(
            eog_v,
            eog_h,
            gx as f64,
            gy as f64,
            gz as f64,
            packet.host_time,
            false,
        );
        deliver(actuator, &out.actions);
    }
    info!("interrupted");
    Ok(RunOutcome::Interrupted)
}

/// `ml` mode: the classifier replaces the threshold eye detectors, while
/// cursor motion and the frozen-gated head gestures still run through the
/// dispatcher (fed baseline EOG so its own eye detectors stay quiet).
#[allow(clippy::too_many_arguments)]
fn classifier_loop(
    source: &mut dyn PacketSource,
    mut classifier: WindowClassifier,
    mut dispatcher: ActionDispatcher,
    mut corrector: Option<&mut GyroBiasFilter>,
    params: &PipelineParams,
    actuator: &mut dyn Actuator,
    interrupted: &AtomicBool,
) -> Result<RunOutcome, RunError> {
    let deadzone = params.gyro.deadzone;
    let baseline = EOG_BASELINE as f64;
    let mut last_class = GestureClass::Idle;
    let mut last_blink = f64::NEG_INFINITY;
    let mut last_scroll = f64::NEG_INFINITY;
    let mut last_nav = f64::NEG_INFINITY;

    while !interrupted.load(Ordering::Relaxed) {
        let Some(packet) = source.next_packet()? else {
            info!("source exhausted");
            return Ok(RunOutcome::Finished);
        };
        let now = packet.host_time;
        // Classification runs on raw EOG, matching the training data.
        let prediction = classifier.push(packet.eog_v as f64, packet.eog_h as f64);
        if let Some(class) = prediction {
            // Only one window in `window_step` produces a prediction;
            // remember it so suppression stays continuous in between.
            last_class = class;
        }
        let (gx, gy, gz) = corrected_gyro(&mut corrector, &packet)?;

        let mut actions = Vec::new();
        if let Some(class) = prediction {
            match class {
                GestureClass::DoubleBlink if now - last_blink > params.blink.double_cooldown => {
                    info!("ml: double blink -> left click");
                    actions.push(Action::LeftClick);
                    last_blink = now;
                }
                GestureClass::LongBlink if now - last_blink > params.blink.long_cooldown => {
                    info!("ml: long blink -> right click");
                    actions.push(Action::RightClick);
                    last_blink = now;
                }
                GestureClass::LookUp
                    if (gx as f64) < -deadzone
                        && now - last_scroll > params.fusion.scroll_cooldown =>
                {
                    let n = saccade_control::scroll_amount(
                        gx as f64,
                        deadzone,
                        params.fusion.scroll_base_amount,
                    );
                    actions.push(Action::ScrollUp(n));
                    last_scroll = now;
                }
                GestureClass::LookDown
                    if (gx as f64) > deadzone
                        && now - last_scroll > params.fusion.scroll_cooldown =>
                {
                    let n = saccade_control::scroll_amount(
                        gx as f64,
                        deadzone,
                        params.fusion.scroll_base_amount,
                    );
                    actions.push(Action::ScrollDown(n));
                    last_scroll = now;
                }
                GestureClass::LookLeft
                    if (gy as f64) < -deadzone && now - last_nav > params.fusion.nav_cooldown =>
                {
                    info!("ml: eye left + head left -> back");
                    actions.push(Action::NavBack);
                    last_nav = now;
                }
                GestureClass::LookRight
                    if (gy as f64) > deadzone && now - last_nav > params.fusion.nav_cooldown =>
                {
                    info!("ml: eye right + head right -> forward");
                    actions.push(Action::NavForward);
                    last_nav = now;
                }
                _ => {}
            }
        }

        // Cursor and frozen-gated gestures. While the classifier reports
        // horizontal gaze, the dispatcher gets real gyro input plus the
        // freeze override so roll and nod still work; during any other
        // recognized gesture the cursor is halted outright.
        let frozen = last_class.is_horizontal_gaze();
        let (cursor_gx, cursor_gy) = if frozen {
            (gx, gy)
        } else if last_class != GestureClass::Idle {
            dispatcher.halt_cursor();
            (0, 0)
        } else {
            (gx, gy)
        };
        let out = dispatcher.step(
            baseline,
            baseline,
            cursor_gx as f64,
            cursor_gy as f64,
            gz as f64,
            now,
            frozen,
        );
        actions.extend(out.actions);
        deliver(actuator, &actions);
    }
    info!("interrupted");
    Ok(RunOutcome::Interrupted)
}

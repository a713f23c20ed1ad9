//! `saccade`: drive a pointer with head motion, issue commands with eye
//! gestures. One control loop pulls 200 Hz sensor packets from a serial
//! port (or a replay file, or the built-in demo script), conditions them,
//! recognizes gestures and emits actions as JSON lines on stdout for the
//! host-side injector.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use saccade_types::NodAction;

mod run;

use run::{run, RunError, RunOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Proportional cursor, threshold event detection.
    Threshold,
    /// Inertial state-space cursor, threshold event detection.
    Statespace,
    /// Inertial cursor with the pre-trained window classifier as the eye
    /// event source.
    Ml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NodActionArg {
    /// Double nod re-centers the pointer.
    Center,
    /// Legacy wiring: double nod double-clicks.
    DoubleClick,
}

impl From<NodActionArg> for NodAction {
    fn from(arg: NodActionArg) -> Self {
        match arg {
            NodActionArg::Center => NodAction::CenterCursor,
            NodActionArg::DoubleClick => NodAction::DoubleClick,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "saccade", version, about)]
pub struct Cli {
    /// Control mode.
    #[arg(long, value_enum, default_value_t = Mode::Threshold)]
    pub mode: Mode,

    /// Serial device streaming sensor packets.
    #[arg(long, default_value = "/dev/ttyACM0")]
    pub port: String,

    #[arg(long, default_value_t = 115_200)]
    pub baudrate: u32,

    /// Run the scripted demo source instead of hardware.
    #[arg(long)]
    pub simulate: bool,

    /// Replay a recorded CSV file as the packet source.
    #[arg(long, value_name = "CSV")]
    pub replay: Option<PathBuf>,

    /// Replay at maximum speed instead of the 200 Hz grid.
    #[arg(long, requires = "replay")]
    pub replay_fast: bool,

    /// Loop the replay file continuously.
    #[arg(long, requires = "replay")]
    pub replay_loop: bool,

    /// Override cursor sensitivity (both driver variants).
    #[arg(long)]
    pub sensitivity: Option<f64>,

    /// Override the state-space velocity retention factor.
    #[arg(long)]
    pub velocity_retain: Option<f64>,

    /// Override the gyro deadzone.
    #[arg(long)]
    pub deadzone: Option<f64>,

    /// Override the blink detection threshold.
    #[arg(long)]
    pub blink_threshold: Option<f64>,

    /// Cursor suppression window after any discrete gesture, seconds.
    #[arg(long, default_value_t = 0.3)]
    pub grace: f64,

    /// What a double nod does.
    #[arg(long, value_enum, default_value_t = NodActionArg::Center)]
    pub nod_action: NodActionArg,

    /// Log actions instead of emitting them on stdout.
    #[arg(long)]
    pub dry_run: bool,

    /// Classifier model blob (`ml` mode).
    #[arg(long, default_value = "models/eog_model.json")]
    pub model: PathBuf,

    /// Classifier scaler blob (`ml` mode).
    #[arg(long, default_value = "models/eog_scaler.json")]
    pub scaler: PathBuf,

    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Actions go to stdout; everything human-facing goes to stderr.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let event_format = fmt::format()
        .with_timer(fmt::time::Uptime::default())
        .compact();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(event_format)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn exit_code(err: &RunError) -> u8 {
    match err {
        RunError::Classifier(_) => 1,
        _ => 2,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(RunOutcome::Finished) => ExitCode::SUCCESS,
        Ok(RunOutcome::Interrupted) => ExitCode::from(130),
        Err(err) => {
            error!("{err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_flags_require_replay() {
        assert!(Cli::try_parse_from(["saccade", "--replay-fast"]).is_err());
        assert!(Cli::try_parse_from(["saccade", "--replay", "x.csv", "--replay-fast"]).is_ok());
    }

    #[test]
    fn dry_run_flag_parses() {
        let cli = Cli::try_parse_from(["saccade", "--simulate", "--dry-run"]).unwrap();
        assert!(cli.dry_run);
        let cli = Cli::try_parse_from(["saccade"]).unwrap();
        assert!(!cli.dry_run);
    }

    #[test]
    fn missing_classifier_maps_to_exit_one() {
        let err = RunError::Classifier(saccade_ml::MlError::MissingModel("x".into()));
        assert_eq!(exit_code(&err), 1);
        let err = RunError::Source(saccade_sources::SourceError::EmptyReplay);
        assert_eq!(exit_code(&err), 2);
    }
}

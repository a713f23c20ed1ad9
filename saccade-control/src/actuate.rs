//! Output actuators.
//!
//! The pipeline ends at an abstract capability set; host-OS pointer and
//! keystroke injection lives outside this repository. The live default
//! writes one JSON object per action to a stream (stdout in practice) for
//! an external injector to consume; tests use the recording stub.

use std::io::Write;

use tracing::info;

use saccade_types::Action;

use crate::ActuateError;

pub trait Actuator {
    fn act(&mut self, action: &Action) -> Result<(), ActuateError>;
}

/// Collects every action; test instrumentation.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub actions: Vec<Action>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actuator for RecordingActuator {
    fn act(&mut self, action: &Action) -> Result<(), ActuateError> {
        self.actions.push(*action);
        Ok(())
    }
}

/// Logs each action and otherwise does nothing; backs `--dry-run`.
#[derive(Debug, Default)]
pub struct TraceActuator;

impl Actuator for TraceActuator {
    fn act(&mut self, action: &Action) -> Result<(), ActuateError> {
        info!(?action, "act");
        Ok(())
    }
}

/// Serializes actions as newline-delimited JSON on a writer.
pub struct JsonLinesActuator<W: Write> {
    writer: W,
}

impl JsonLinesActuator<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            writer: std::io::stdout(),
        }
    }
}

impl<W: Write> JsonLinesActuator<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Actuator for JsonLinesActuator<W> {
    fn act(&mut self, action: &Action) -> Result<(), ActuateError> {
        serde_json::to_writer(&mut self.writer, action)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_actuator_keeps_order() {
        let mut rec = RecordingActuator::new();
        rec.act(&Action::LeftClick).unwrap();
        rec.act(&Action::ScrollUp(3)).unwrap();
        assert_eq!(rec.actions, vec![Action::LeftClick, Action::ScrollUp(3)]);
    }

    #[test]
    fn trace_actuator_accepts_every_action() {
        let mut trace = TraceActuator;
        for action in [
            Action::MoveCursor { dx: 0.5, dy: 0.5 },
            Action::LeftClick,
            Action::ScrollDown(10),
            Action::CenterCursor,
        ] {
            trace.act(&action).unwrap();
        }
    }

    #[test]
    fn json_lines_are_one_action_per_line() {
        let mut sink = JsonLinesActuator::new(Vec::new());
        sink.act(&Action::NavBack).unwrap();
        sink.act(&Action::MoveCursor { dx: 1.5, dy: -2.0 }).unwrap();
        let buf = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "\"NavBack\"");
        let back: Action = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back, Action::MoveCursor { dx: 1.5, dy: -2.0 });
    }
}

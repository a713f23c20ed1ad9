//! Packet sources feeding the control loop.
//!
//! Three adapters share one contract: yield [`SensorPacket`]s one at a
//! time with strictly monotonic `host_time`, absorb transient per-line
//! parse problems internally, and surface only terminal conditions (EOF
//! or transport loss) to the loop.

pub mod demo;
pub mod replay;
pub mod serial;

pub use demo::DemoSource;
pub use replay::ReplaySource;
pub use serial::SerialSource;

use saccade_types::SensorPacket;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error("serial transport lost: {0}")]
    Transport(String),
    #[error("replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("replay CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("replay CSV is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("replay CSV contains no usable samples")]
    EmptyReplay,
}

/// A lazy sequence of sensor packets.
///
/// `Ok(None)` is clean end-of-stream (replay EOF); errors are terminal.
pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<SensorPacket>, SourceError>;
}

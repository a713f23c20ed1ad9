//! Serial source for the sensor head.
//!
//! The firmware streams one CSV line per sample at 115200 baud. A
//! background thread owns the port, parses lines and hands packets to the
//! control loop over a bounded channel, so a slow write on the port side
//! can never stall mid-sample processing. The thread is the only producer;
//! the loop is the only consumer.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use saccade_types::{SensorPacket, ADC_MAX, EOG_BASELINE};

use crate::{PacketSource, SourceError};

/// Packets buffered between the reader thread and the loop. At 200 Hz
/// this is more than a second of slack.
const QUEUE_DEPTH: usize = 256;

/// Port read timeout; also bounds how long shutdown can take.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Parse one wire line into a packet.
///
/// Preferred 6-field form: `device_ms,eog_v,eog_h,gx,gy,gz`. The legacy
/// 5-field form lacks the horizontal channel, which is filled with the
/// baseline. Returns `None` for anything else, including ADC readings
/// outside the 12-bit range.
pub fn parse_line(line: &str, host_time: f64) -> Option<SensorPacket> {
    let mut fields = [0i64; 6];
    let mut count = 0;
    for part in line.trim().split(',') {
        if count == 6 {
            return None;
        }
        fields[count] = part.trim().parse::<i64>().ok()?;
        count += 1;
    }

    let (device_ms, eog_v, eog_h, gx, gy, gz) = match count {
        6 => (
            fields[0], fields[1], fields[2], fields[3], fields[4], fields[5],
        ),
        5 => (
            fields[0],
            fields[1],
            EOG_BASELINE as i64,
            fields[2],
            fields[3],
            fields[4],
        ),
        _ => return None,
    };

    let adc_ok = |v: i64| (0..=ADC_MAX as i64).contains(&v);
    if !adc_ok(eog_v) || !adc_ok(eog_h) {
        return None;
    }
    let device_ms = u32::try_from(device_ms).ok()?;
    let gx = i32::try_from(gx).ok()?;
    let gy = i32::try_from(gy).ok()?;
    let gz = i32::try_from(gz).ok()?;

    Some(SensorPacket {
        device_ms,
        eog_v: eog_v as u16,
        eog_h: eog_h as u16,
        gyro_x: gx,
        gyro_y: gy,
        gyro_z: gz,
        host_time,
    })
}

pub struct SerialSource {
    rx: Receiver<SensorPacket>,
    shutdown: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
    reader: Option<JoinHandle<()>>,
}

impl SerialSource {
    /// Open the port and start the reader thread. Stale input buffered by
    /// the OS is discarded so the stream starts on a fresh sample.
    pub fn connect(port_name: &str, baud_rate: u32) -> Result<Self, SourceError> {
        info!(port_name, baud_rate, "opening serial port");
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        let _ = port.clear(serialport::ClearBuffer::Input);

        let (tx, rx) = bounded(QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(Mutex::new(None));

        let thread_shutdown = shutdown.clone();
        let thread_fault = fault.clone();
        let reader = std::thread::Builder::new()
            .name("saccade-serial".into())
            .spawn(move || read_loop(port, tx, thread_shutdown, thread_fault))
            .map_err(SourceError::Io)?;

        Ok(Self {
            rx,
            shutdown,
            fault,
            reader: Some(reader),
        })
    }

    fn take_fault(&self) -> SourceError {
        let msg = self
            .fault
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| "reader thread exited".to_string());
        SourceError::Transport(msg)
    }
}

fn read_loop(
    port: Box<dyn serialport::SerialPort>,
    tx: Sender<SensorPacket>,
    shutdown: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
) {
    let epoch = Instant::now();
    let mut reader = BufReader::new(port);
    let mut line = String::new();
    let mut dropped: u64 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                if let Ok(mut slot) = fault.lock() {
                    *slot = Some("serial port closed".to_string());
                }
                break;
            }
            Ok(_) => {
                if line.trim().is_empty() {
                    continue;
                }
                let host_time = epoch.elapsed().as_secs_f64();
                match parse_line(&line, host_time) {
                    Some(packet) => {
                        if tx.send(packet).is_err() {
                            // Consumer gone; shut down quietly.
                            break;
                        }
                    }
                    None => {
                        dropped += 1;
                        if dropped % 100 == 1 {
                            warn!(dropped, line = line.trim(), "dropping malformed line");
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                if let Ok(mut slot) = fault.lock() {
                    *slot = Some(e.to_string());
                }
                break;
            }
        }
    }
}

/// Consecutive quiet read-timeouts tolerated before the link is declared
/// dead. The firmware streams continuously at 200 Hz, so several seconds
/// of silence means the device is gone even if the port is still open.
const SILENT_LIMIT: u32 = 5;

impl PacketSource for SerialSource {
    fn next_packet(&mut self) -> Result<Option<SensorPacket>, SourceError> {
        let mut quiet = 0;
        loop {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(packet) => return Ok(Some(packet)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.reader.as_ref().map_or(true, |h| h.is_finished()) {
                        return Err(self.take_fault());
                    }
                    quiet += 1;
                    if quiet >= SILENT_LIMIT {
                        return Err(SourceError::Transport(
                            "device stopped streaming".to_string(),
                        ));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.take_fault()),
            }
        }
    }
}

impl Drop for SerialSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            // The read timeout bounds how long this join can block.
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_field_line() {
        let p = parse_line("1234,2048,2100,-5,17,0", 0.5).unwrap();
        assert_eq!(p.device_ms, 1234);
        assert_eq!(p.eog_v, 2048);
        assert_eq!(p.eog_h, 2100);
        assert_eq!(p.gyro_x, -5);
        assert_eq!(p.gyro_y, 17);
        assert_eq!(p.gyro_z, 0);
        assert_eq!(p.host_time, 0.5);
    }

    #[test]
    fn parses_legacy_five_field_line() {
        let p = parse_line("99,3000,-100,200,-300", 0.0).unwrap();
        assert_eq!(p.eog_v, 3000);
        assert_eq!(p.eog_h, EOG_BASELINE);
        assert_eq!(p.gyro_x, -100);
        assert_eq!(p.gyro_y, 200);
        assert_eq!(p.gyro_z, -300);
    }

    #[test]
    fn tolerates_crlf_and_spaces() {
        assert!(parse_line("1, 2048, 2048, 0, 0, 0\r\n", 0.0).is_some());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("", 0.0).is_none());
        assert!(parse_line("1,2,3", 0.0).is_none());
        assert!(parse_line("1,2048,2048,0,0,0,7", 0.0).is_none());
        assert!(parse_line("a,2048,2048,0,0,0", 0.0).is_none());
        assert!(parse_line("1,2048,2048,0,0,nan", 0.0).is_none());
    }

    #[test]
    fn rejects_out_of_range_adc() {
        assert!(parse_line("1,4096,2048,0,0,0", 0.0).is_none());
        assert!(parse_line("1,2048,-1,0,0,0", 0.0).is_none());
        assert!(parse_line("1,4095,0,0,0,0", 0.0).is_some());
    }
}

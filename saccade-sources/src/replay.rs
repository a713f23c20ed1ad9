//! CSV replay source for offline runs and debugging.
//!
//! Reads a recorded session and replays it as if the hardware were
//! streaming: paced to the 200 Hz grid by default, free-running with
//! `realtime = false`. Host times are synthesized on the sample grid in
//! both cases so detector timing is identical from run to run, and stay
//! monotonic across loop restarts.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{info, warn};

use saccade_types::{SensorPacket, ADC_MAX, EOG_BASELINE, SAMPLE_DT};

use crate::{PacketSource, SourceError};

/// One row of a recorded session. Only the EOG vertical channel and the
/// gyro axes are mandatory; old recordings lack the rest.
#[derive(Debug, Deserialize)]
struct ReplayRow {
    #[serde(default)]
    timestamp: Option<u32>,
    #[serde(alias = "eog")]
    eog_v: i64,
    #[serde(default)]
    eog_h: Option<i64>,
    gyro_x: i32,
    gyro_y: i32,
    gyro_z: i32,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug)]
pub struct ReplaySource {
    packets: Vec<SensorPacket>,
    index: usize,
    realtime: bool,
    looping: bool,
    /// Accumulated host-time offset from completed loop passes.
    base_time: f64,
    epoch: Instant,
}

impl ReplaySource {
    pub fn open(path: &Path, realtime: bool, looping: bool) -> Result<Self, SourceError> {
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        let has = |name: &str| headers.iter().any(|h| h == name);
        if !has("eog_v") && !has("eog") {
            return Err(SourceError::MissingColumn("eog_v"));
        }
        for required in ["gyro_x", "gyro_y", "gyro_z"] {
            if !has(required) {
                return Err(SourceError::MissingColumn(required));
            }
        }

        let mut packets = Vec::new();
        let mut labels: Vec<(String, usize)> = Vec::new();
        let mut dropped: u64 = 0;
        for (i, row) in reader.deserialize::<ReplayRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    dropped += 1;
                    if dropped % 100 == 1 {
                        warn!(row = i + 1, error = %e, "dropping malformed replay row");
                    }
                    continue;
                }
            };
            let eog_h = row.eog_h.unwrap_or(EOG_BASELINE as i64);
            let adc_ok = |v: i64| (0..=ADC_MAX as i64).contains(&v);
            if !adc_ok(row.eog_v) || !adc_ok(eog_h) {
                dropped += 1;
                if dropped % 100 == 1 {
                    warn!(row = i + 1, "dropping replay row with out-of-range ADC value");
                }
                continue;
            }
            let index = packets.len();
            packets.push(SensorPacket {
                device_ms: row
                    .timestamp
                    .unwrap_or((index as u32).saturating_mul(5)),
                eog_v: row.eog_v as u16,
                eog_h: eog_h as u16,
                gyro_x: row.gyro_x,
                gyro_y: row.gyro_y,
                gyro_z: row.gyro_z,
                host_time: 0.0,
            });
            if let Some(label) = row.label {
                match labels.iter_mut().find(|(name, _)| *name == label) {
                    Some((_, n)) => *n += 1,
                    None => labels.push((label, 1)),
                }
            }
        }

        if packets.is_empty() {
            return Err(SourceError::EmptyReplay);
        }
        info!(
            samples = packets.len(),
            seconds = packets.len() as f64 * SAMPLE_DT,
            dropped,
            "loaded replay file {}",
            path.display()
        );
        for (label, n) in &labels {
            info!(label = label.as_str(), count = *n, "replay labels");
        }

        Ok(Self {
            packets,
            index: 0,
            realtime,
            looping,
            base_time: 0.0,
            epoch: Instant::now(),
        })
    }

    pub fn num_samples(&self) -> usize {
        self.packets.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.packets.len() as f64 * SAMPLE_DT
    }
}

impl PacketSource for ReplaySource {
    fn next_packet(&mut self) -> Result<Option<SensorPacket>, SourceError> {
        if self.index == self.packets.len() {
            if !self.looping {
                return Ok(None);
            }
            self.base_time += self.packets.len() as f64 * SAMPLE_DT;
            self.index = 0;
            info!("replay loop: restarting from beginning");
        }

        let mut packet = self.packets[self.index];
        packet.host_time = self.base_time + self.index as f64 * SAMPLE_DT;
        self.index += 1;

        if self.realtime {
            let due = Duration::from_secs_f64(packet.host_time);
            let elapsed = self.epoch.elapsed();
            if due > elapsed {
                std::thread::sleep(due - elapsed);
            }
        }
        Ok(Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn drain(source: &mut ReplaySource) -> Vec<SensorPacket> {
        let mut out = Vec::new();
        while let Some(p) = source.next_packet().unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn loads_full_format() {
        let file = write_csv(
            "timestamp,eog_v,eog_h,gyro_x,gyro_y,gyro_z,label\n\
             0,2048,2048,0,0,0,idle\n\
             5,3500,2048,1,2,3,blink\n",
        );
        let mut source = ReplaySource::open(file.path(), false, false).unwrap();
        assert_eq!(source.num_samples(), 2);
        let packets = drain(&mut source);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].eog_v, 3500);
        assert_eq!(packets[1].device_ms, 5);
        // Host times are synthesized on the 5 ms grid.
        assert_eq!(packets[0].host_time, 0.0);
        assert_eq!(packets[1].host_time, SAMPLE_DT);
    }

    #[test]
    fn legacy_eog_column_and_missing_fields() {
        let file = write_csv(
            "eog,gyro_x,gyro_y,gyro_z\n\
             2048,0,0,0\n\
             2100,5,-5,9\n",
        );
        let mut source = ReplaySource::open(file.path(), false, false).unwrap();
        let packets = drain(&mut source);
        assert_eq!(packets[0].eog_h, EOG_BASELINE);
        assert_eq!(packets[1].eog_v, 2100);
        // Synthesized 5 ms device timestamps.
        assert_eq!(packets[0].device_ms, 0);
        assert_eq!(packets[1].device_ms, 5);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let file = write_csv("eog_v,gyro_x,gyro_y\n2048,0,0\n");
        match ReplaySource::open(file.path(), false, false) {
            Err(SourceError::MissingColumn(col)) => assert_eq!(col, "gyro_z"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_rows_are_dropped() {
        let file = write_csv(
            "eog_v,gyro_x,gyro_y,gyro_z\n\
             2048,0,0,0\n\
             oops,0,0,0\n\
             9999,0,0,0\n\
             2050,1,1,1\n",
        );
        let mut source = ReplaySource::open(file.path(), false, false).unwrap();
        let packets = drain(&mut source);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1].eog_v, 2050);
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = write_csv("eog_v,gyro_x,gyro_y,gyro_z\n");
        assert!(matches!(
            ReplaySource::open(file.path(), false, false),
            Err(SourceError::EmptyReplay)
        ));
    }

    #[test]
    fn looping_keeps_host_time_monotonic() {
        let file = write_csv("eog_v,gyro_x,gyro_y,gyro_z\n2048,0,0,0\n2048,0,0,0\n");
        let mut source = ReplaySource::open(file.path(), false, true).unwrap();
        let mut last = f64::NEG_INFINITY;
        for _ in 0..10 {
            let p = source.next_packet().unwrap().unwrap();
            assert!(p.host_time > last);
            last = p.host_time;
        }
    }
}

//! Scripted demo source: a deterministic gesture script rendered to noisy
//! synthetic packets at 200 Hz, so the full pipeline can be exercised with
//! no hardware attached. The script loops until interrupted.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

use saccade_types::{SensorPacket, ADC_MAX, EOG_BASELINE, SAMPLE_DT};

use crate::{PacketSource, SourceError};

/// ADC noise floor, matching what the analog front end shows in practice.
const EOG_NOISE_STD: f64 = 50.0;
const GYRO_NOISE_STD: f64 = 100.0;

/// What the simulated user is doing during one script segment.
#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    /// Eyes closed (blink-scale vertical deflection).
    Blink,
    /// Sustained vertical gaze plus the matching head tilt.
    LookUp { tilt: f64 },
    LookDown { tilt: f64 },
    /// Sustained horizontal gaze plus an optional head turn.
    LookLeft { turn: f64 },
    LookRight { turn: f64 },
    /// Plain head steering.
    Steer { gx: f64, gy: f64 },
    /// Horizontal gaze held while the head rolls sharply.
    FrozenRoll,
    /// Horizontal gaze held while the head nods sharply.
    FrozenNod,
}

struct Segment {
    samples: usize,
    gesture: Gesture,
}

fn seg(seconds: f64, gesture: Gesture) -> Segment {
    Segment {
        samples: (seconds / SAMPLE_DT).round() as usize,
        gesture,
    }
}

/// The default demo script: every supported action once, then repeat.
fn demo_script() -> Vec<Segment> {
    use Gesture::*;
    vec![
        seg(2.0, Idle),
        // Double blink -> left click.
        seg(0.1, Blink),
        seg(0.2, Idle),
        seg(0.1, Blink),
        seg(1.5, Idle),
        // Long blink -> right click.
        seg(0.6, Blink),
        seg(1.5, Idle),
        // Scroll up, then down.
        seg(1.0, LookUp { tilt: -600.0 }),
        seg(1.0, Idle),
        seg(1.0, LookDown { tilt: 600.0 }),
        seg(1.0, Idle),
        // Browser back / forward.
        seg(1.0, LookLeft { turn: -600.0 }),
        seg(1.0, Idle),
        seg(1.0, LookRight { turn: 600.0 }),
        seg(1.0, Idle),
        // Cursor steering, right then down.
        seg(1.0, Steer { gx: 0.0, gy: 1500.0 }),
        seg(1.0, Steer { gx: 1500.0, gy: 0.0 }),
        seg(1.0, Idle),
        // Freeze then roll flick -> window switch.
        seg(0.4, LookLeft { turn: 0.0 }),
        seg(0.1, FrozenRoll),
        seg(0.5, LookLeft { turn: 0.0 }),
        seg(1.0, Idle),
        // Freeze then double nod -> center cursor.
        seg(0.4, LookLeft { turn: 0.0 }),
        seg(0.1, FrozenNod),
        seg(0.2, LookLeft { turn: 0.0 }),
        seg(0.1, FrozenNod),
        seg(0.5, LookLeft { turn: 0.0 }),
        seg(2.0, Idle),
    ]
}

pub struct DemoSource {
    script: Vec<Segment>,
    segment: usize,
    offset: usize,
    index: u64,
    rng: StdRng,
    eog_noise: Normal<f64>,
    gyro_noise: Normal<f64>,
    realtime: bool,
    epoch: Instant,
}

impl DemoSource {
    pub fn new() -> Self {
        Self::with_pacing(true)
    }

    /// `realtime = false` free-runs; used by tests.
    pub fn with_pacing(realtime: bool) -> Self {
        info!("demo source: scripted gesture loop, no hardware");
        Self {
            script: demo_script(),
            segment: 0,
            offset: 0,
            index: 0,
            rng: StdRng::seed_from_u64(0x5acc_ade0),
            eog_noise: Normal::new(0.0, EOG_NOISE_STD).expect("valid noise std"),
            gyro_noise: Normal::new(0.0, GYRO_NOISE_STD).expect("valid noise std"),
            realtime,
            epoch: Instant::now(),
        }
    }

    fn render(&mut self, gesture: Gesture) -> SensorPacket {
        let mut eog_v = EOG_BASELINE as f64 + self.eog_noise.sample(&mut self.rng);
        let mut eog_h = EOG_BASELINE as f64 + self.eog_noise.sample(&mut self.rng);
        let mut gx = self.gyro_noise.sample(&mut self.rng);
        let mut gy = self.gyro_noise.sample(&mut self.rng);
        let mut gz = self.gyro_noise.sample(&mut self.rng);

        match gesture {
            Gesture::Idle => {}
            Gesture::Blink => {
                eog_v += 1500.0 + self.rng.random_range(-200.0..200.0);
            }
            Gesture::LookUp { tilt } => {
                eog_v += 850.0;
                gx += tilt;
            }
            Gesture::LookDown { tilt } => {
                eog_v -= 1050.0;
                gx += tilt;
            }
            Gesture::LookLeft { turn } => {
                eog_h -= 1050.0;
                gy += turn;
            }
            Gesture::LookRight { turn } => {
                eog_h += 850.0;
                gy += turn;
            }
            Gesture::Steer { gx: sx, gy: sy } => {
                gx += sx;
                gy += sy;
            }
            Gesture::FrozenRoll => {
                eog_h -= 1050.0;
                gz += 4000.0;
            }
            Gesture::FrozenNod => {
                eog_h -= 1050.0;
                gx += 4000.0;
            }
        }

        let clamp_adc = |v: f64| v.round().clamp(0.0, ADC_MAX as f64) as u16;
        SensorPacket {
            device_ms: (self.index * 5) as u32,
            eog_v: clamp_adc(eog_v),
            eog_h: clamp_adc(eog_h),
            gyro_x: gx.round() as i32,
            gyro_y: gy.round() as i32,
            gyro_z: gz.round() as i32,
            host_time: self.index as f64 * SAMPLE_DT,
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketSource for DemoSource {
    fn next_packet(&mut self) -> Result<Option<SensorPacket>, SourceError> {
        while self.offset >= self.script[self.segment].samples {
            self.offset = 0;
            self.segment = (self.segment + 1) % self.script.len();
        }
        let gesture = self.script[self.segment].gesture;
        let packet = self.render(gesture);
        self.offset += 1;
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

    #[test]
    fn produces_monotonic_valid_packets() {
        let mut source = DemoSource::with_pacing(false);
        let mut last = f64::NEG_INFINITY;
        for _ in 0..5000 {
            let p = source.next_packet().unwrap().unwrap();
            assert!(p.eog_v <= ADC_MAX);
            assert!(p.eog_h <= ADC_MAX);
            assert!(p.host_time > last);
            last = p.host_time;
        }
    }

    #[test]
    fn script_contains_blink_and_freeze_material() {
        let mut source = DemoSource::with_pacing(false);
        let mut saw_blink_level = false;
        let mut saw_left_gaze = false;
        let mut saw_roll_spike = false;
        // One full script pass is well under 30 s of samples.
        for _ in 0..6000 {
            let p = source.next_packet().unwrap().unwrap();
            saw_blink_level |= p.eog_v > 3000;
            saw_left_gaze |= p.eog_h < 1200;
            saw_roll_spike |= p.gyro_z.abs() > 3000;
        }
        assert!(saw_blink_level);
        assert!(saw_left_gaze);
        assert!(saw_roll_spike);
    }
}

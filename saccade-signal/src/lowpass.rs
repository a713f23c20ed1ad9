//! Butterworth low-pass filter realized as cascaded second-order sections.
//!
//! Second-order sections keep the order-4 filter numerically tame at the
//! low normalized cutoff used here (30 Hz at 200 Hz sampling). Each section
//! runs in transposed direct form II with two delay states.

use std::f64::consts::PI;

use crate::SignalError;

#[derive(Debug, Clone, Copy)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// One biquad of the Butterworth cascade, via the bilinear transform
    /// prewarped at the cutoff. `q` is the pole-pair quality factor.
    fn lowpass(cutoff_hz: f64, sample_rate_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let (sw, cw) = w0.sin_cos();
        let alpha = sw / (2.0 * q);
        let a0 = 1.0 + alpha;
        Section {
            b0: (1.0 - cw) / 2.0 / a0,
            b1: (1.0 - cw) / a0,
            b2: (1.0 - cw) / 2.0 / a0,
            a1: -2.0 * cw / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    z1: f64,
    z2: f64,
}

/// Stateful per-channel low-pass filter.
///
/// The delay memory is seeded from the first sample so that the output
/// starts at the input's DC level instead of ramping up from zero. The EOG
/// baseline sits near 2048, and the startup ramp of a zero-initialized
/// filter would sweep through every gaze threshold on the way up.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    sections: Vec<Section>,
    state: Vec<SectionState>,
    primed: bool,
}

impl LowPassFilter {
    /// Design an order-`order` Butterworth low-pass. Only even orders are
    /// supported (each pole pair becomes one section).
    pub fn butterworth(
        order: usize,
        cutoff_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, SignalError> {
        if order == 0 || order % 2 != 0 {
            return Err(SignalError::UnsupportedFilterOrder(order));
        }
        if cutoff_hz <= 0.0 || cutoff_hz >= sample_rate_hz / 2.0 {
            return Err(SignalError::CutoffAboveNyquist {
                cutoff_hz,
                sample_rate_hz,
            });
        }
        let sections: Vec<Section> = (1..=order / 2)
            .map(|k| {
                // Butterworth pole angles give the per-section Q values.
                let theta = PI * (2 * k - 1) as f64 / (2 * order) as f64;
                let q = 1.0 / (2.0 * theta.cos());
                Section::lowpass(cutoff_hz, sample_rate_hz, q)
            })
            .collect();
        let state = vec![SectionState::default(); sections.len()];
        Ok(Self {
            sections,
            state,
            primed: false,
        })
    }

    /// Filter one sample, updating internal state.
    pub fn apply(&mut self, sample: f64) -> f64 {
        if !self.primed {
            self.prime(sample);
            self.primed = true;
        }
        let mut x = sample;
        for (section, state) in self.sections.iter().zip(self.state.iter_mut()) {
            let y = section.b0 * x + state.z1;
            state.z1 = section.b1 * x - section.a1 * y + state.z2;
            state.z2 = section.b2 * x - section.a2 * y;
            x = y;
        }
        x
    }

    /// Clear the delay memory; the filter re-seeds on the next sample.
    pub fn reset(&mut self) {
        for state in self.state.iter_mut() {
            *state = SectionState::default();
        }
        self.primed = false;
    }

    /// Set each section's delay line to its steady state for constant
    /// input `level`. Every section has unit DC gain, so the level feeds
    /// through unchanged.
    fn prime(&mut self, level: f64) {
        for (section, state) in self.sections.iter().zip(self.state.iter_mut()) {
            state.z1 = (1.0 - section.b0) * level;
            state.z2 = (section.b2 - section.a2) * level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use saccade_types::SAMPLE_RATE_HZ;

    fn eog_filter() -> LowPassFilter {
        LowPassFilter::butterworth(4, 30.0, SAMPLE_RATE_HZ).unwrap()
    }

    #[test]
    fn rejects_bad_designs() {
        assert!(LowPassFilter::butterworth(3, 30.0, 200.0).is_err());
        assert!(LowPassFilter::butterworth(0, 30.0, 200.0).is_err());
        assert!(LowPassFilter::butterworth(4, 100.0, 200.0).is_err());
    }

    #[test]
    fn first_output_matches_first_input() {
        let mut f = eog_filter();
        assert_relative_eq!(f.apply(2048.0), 2048.0, epsilon = 1e-9);
        // And it stays there.
        for _ in 0..100 {
            assert_relative_eq!(f.apply(2048.0), 2048.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn step_converges_within_one_second() {
        let mut f = eog_filter();
        f.apply(2048.0);
        let mut y = 0.0;
        for _ in 0..(SAMPLE_RATE_HZ as usize) {
            y = f.apply(3000.0);
        }
        assert!((y - 3000.0).abs() < 0.01 * 3000.0, "converged to {y}");
    }

    #[test]
    fn passes_slow_signals() {
        let mut f = eog_filter();
        let n = 1000;
        let mut peak = 0.0f64;
        for i in 0..n {
            let t = i as f64 / SAMPLE_RATE_HZ;
            let x = 2048.0 + 500.0 * (2.0 * PI * 1.0 * t).sin();
            let y = f.apply(x);
            if i > n / 2 {
                peak = peak.max((y - 2048.0).abs());
            }
        }
        assert!(peak > 0.95 * 500.0, "1 Hz attenuated to {peak}");
    }

    #[test]
    fn attenuates_fast_signals() {
        let mut f = eog_filter();
        let n = 1000;
        let mut peak = 0.0f64;
        for i in 0..n {
            let t = i as f64 / SAMPLE_RATE_HZ;
            let x = 2048.0 + 500.0 * (2.0 * PI * 80.0 * t).sin();
            let y = f.apply(x);
            if i > n / 2 {
                peak = peak.max((y - 2048.0).abs());
            }
        }
        assert!(peak < 0.1 * 500.0, "80 Hz only attenuated to {peak}");
    }

    #[test]
    fn reset_reprimes_at_new_level() {
        let mut f = eog_filter();
        for _ in 0..50 {
            f.apply(3000.0);
        }
        f.reset();
        assert_relative_eq!(f.apply(1000.0), 1000.0, epsilon = 1e-9);
    }
}

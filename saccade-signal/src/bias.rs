//! Gyroscope bias removal: stationary calibration plus a per-axis Kalman
//! bias tracker.
//!
//! Each axis carries an independent two-state filter with state
//! `[rate, bias]`. The rate has no memory (white process, large Q) while
//! the bias persists with tiny process noise, so any sustained offset in
//! the readings is slowly absorbed into the bias estimate without an
//! explicit is-the-head-still test.

use adskalman::{
    CovarianceUpdateMethod, ObservationModel, StateAndCovariance, TransitionModelLinearNoControl,
};
use nalgebra::{Matrix1, Matrix2, OMatrix, OVector, Vector1, Vector2, U1, U2};
use tracing::debug;

use saccade_types::{BiasKalmanParams, GyroParams, SensorPacket};

use crate::SignalError;

/// State covariance at startup, before any calibration is available.
const INITIAL_VARIANCE: f64 = 1000.0;

/// Bias variance after calibration seeds the estimate.
const SEEDED_BIAS_VARIANCE: f64 = 100.0;

/// Transition: rate is white (no memory), bias persists.
#[derive(Debug)]
struct BiasTransition {
    f: Matrix2<f64>,
    ft: Matrix2<f64>,
    q: Matrix2<f64>,
}

impl BiasTransition {
    fn new(params: &BiasKalmanParams) -> Self {
        #[rustfmt::skip]
        let f = Matrix2::new(
            0.0, 0.0,
            0.0, 1.0,
        );
        let ft = f.transpose();
        let q = Matrix2::new(params.q_rate, 0.0, 0.0, params.q_bias);
        Self { f, ft, q }
    }
}

impl TransitionModelLinearNoControl<f64, U2> for BiasTransition {
    fn F(&self) -> &OMatrix<f64, U2, U2> {
        &self.f
    }
    fn FT(&self) -> &OMatrix<f64, U2, U2> {
        &self.ft
    }
    fn Q(&self) -> &OMatrix<f64, U2, U2> {
        &self.q
    }
}

/// Observation: the gyro reads the sum of rate and bias.
#[derive(Debug)]
struct SensedRateObservation {
    h: OMatrix<f64, U1, U2>,
    ht: OMatrix<f64, U2, U1>,
    r: Matrix1<f64>,
}

impl SensedRateObservation {
    fn new(params: &BiasKalmanParams) -> Self {
        let h = OMatrix::<f64, U1, U2>::new(1.0, 1.0);
        let ht = h.transpose();
        let r = Matrix1::new(params.r);
        Self { h, ht, r }
    }
}

impl ObservationModel<f64, U2, U1> for SensedRateObservation {
    fn H(&self) -> &OMatrix<f64, U1, U2> {
        &self.h
    }
    fn HT(&self) -> &OMatrix<f64, U2, U1> {
        &self.ht
    }
    fn R(&self) -> &OMatrix<f64, U1, U1> {
        &self.r
    }
    fn predict_observation(&self, state: &OVector<f64, U2>) -> OVector<f64, U1> {
        &self.h * state
    }
}

/// Bias tracker for a single gyro axis.
#[derive(Debug)]
pub struct AxisBiasFilter {
    transition: BiasTransition,
    observation: SensedRateObservation,
    estimate: StateAndCovariance<f64, U2>,
}

impl AxisBiasFilter {
    pub fn new(params: &BiasKalmanParams) -> Self {
        let estimate = StateAndCovariance::new(
            Vector2::zeros(),
            Matrix2::new(INITIAL_VARIANCE, 0.0, 0.0, INITIAL_VARIANCE),
        );
        Self {
            transition: BiasTransition::new(params),
            observation: SensedRateObservation::new(params),
            estimate,
        }
    }

    /// Seed the bias from the stationary calibration, shrinking its
    /// uncertainty so the filter starts converged instead of hunting.
    pub fn seed_bias(&mut self, bias: f64) {
        let mut state = *self.estimate.state();
        state[1] = bias;
        let mut covariance = *self.estimate.covariance();
        covariance[(1, 1)] = SEEDED_BIAS_VARIANCE;
        self.estimate = StateAndCovariance::new(state, covariance);
    }

    /// Feed one raw reading, returning the bias-corrected angular rate.
    pub fn step(&mut self, reading: f64) -> Result<f64, SignalError> {
        let prior = self.transition.predict(&self.estimate);
        let posterior = self
            .observation
            .update(
                &prior,
                &Vector1::new(reading),
                CovarianceUpdateMethod::JosephForm,
            )
            .map_err(|e| SignalError::Kalman(format!("{e}")))?;
        self.estimate = posterior;
        Ok(self.rate())
    }

    /// Current estimated true angular rate.
    pub fn rate(&self) -> f64 {
        self.estimate.state()[0]
    }

    /// Current bias estimate.
    pub fn bias(&self) -> f64 {
        self.estimate.state()[1]
    }
}

/// Three independent axis trackers presenting the packet-level interface.
#[derive(Debug)]
pub struct GyroBiasFilter {
    x: AxisBiasFilter,
    y: AxisBiasFilter,
    z: AxisBiasFilter,
}

impl GyroBiasFilter {
    pub fn new(params: &BiasKalmanParams) -> Self {
        Self {
            x: AxisBiasFilter::new(params),
            y: AxisBiasFilter::new(params),
            z: AxisBiasFilter::new(params),
        }
    }

    /// Seed all three axes from a stationary calibration result.
    pub fn seed(&mut self, bias: [f64; 3]) {
        self.x.seed_bias(bias[0]);
        self.y.seed_bias(bias[1]);
        self.z.seed_bias(bias[2]);
        debug!(
            bx = bias[0],
            by = bias[1],
            bz = bias[2],
            "bias tracker seeded"
        );
    }

    /// Correct one sample's worth of raw readings. Outputs are rounded to
    /// integers to match the raw gyro scale used by the detectors.
    pub fn step(&mut self, gx: i32, gy: i32, gz: i32) -> Result<(i32, i32, i32), SignalError> {
        let cx = self.x.step(gx as f64)?;
        let cy = self.y.step(gy as f64)?;
        let cz = self.z.step(gz as f64)?;
        Ok((
            cx.round() as i32,
            cy.round() as i32,
            cz.round() as i32,
        ))
    }

    /// Current per-axis bias estimates.
    pub fn bias(&self) -> [f64; 3] {
        [self.x.bias(), self.y.bias(), self.z.bias()]
    }
}

/// Startup bias estimation. The head must be still while this runs.
///
/// The first `calibration_discard` samples are thrown away while the
/// sensor settles, then `calibration_samples` are averaged per axis.
#[derive(Debug)]
pub struct GyroCalibration {
    discard: usize,
    target: usize,
    seen: usize,
    kept: usize,
    sum: [f64; 3],
}

impl GyroCalibration {
    pub fn new(params: &GyroParams) -> Self {
        Self {
            discard: params.calibration_discard,
            target: params.calibration_samples,
            seen: 0,
            kept: 0,
            sum: [0.0; 3],
        }
    }

    /// Feed one packet. Returns the per-axis mean bias once enough
    /// samples have accumulated, `None` until then.
    pub fn push(&mut self, packet: &SensorPacket) -> Option<[f64; 3]> {
        self.seen += 1;
        if self.seen <= self.discard {
            return None;
        }
        self.sum[0] += packet.gyro_x as f64;
        self.sum[1] += packet.gyro_y as f64;
        self.sum[2] += packet.gyro_z as f64;
        self.kept += 1;
        if self.kept < self.target {
            return None;
        }
        let n = self.kept as f64;
        Some([self.sum[0] / n, self.sum[1] / n, self.sum[2] / n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saccade_types::EOG_BASELINE;

    fn packet(gx: i32, gy: i32, gz: i32) -> SensorPacket {
        SensorPacket {
            device_ms: 0,
            eog_v: EOG_BASELINE,
            eog_h: EOG_BASELINE,
            gyro_x: gx,
            gyro_y: gy,
            gyro_z: gz,
            host_time: 0.0,
        }
    }

    #[test]
    fn calibration_discards_then_averages() {
        let params = GyroParams {
            calibration_discard: 2,
            calibration_samples: 3,
            ..GyroParams::default()
        };
        let mut cal = GyroCalibration::new(&params);
        // Discarded settling samples with wild values.
        assert!(cal.push(&packet(9999, 9999, 9999)).is_none());
        assert!(cal.push(&packet(-9999, 0, 0)).is_none());
        assert!(cal.push(&packet(10, 20, 30)).is_none());
        assert!(cal.push(&packet(20, 20, 30)).is_none());
        let bias = cal.push(&packet(30, 20, 30)).unwrap();
        assert_eq!(bias, [20.0, 20.0, 30.0]);
    }

    #[test]
    fn constant_offset_is_absorbed_as_bias() {
        // A constant raw reading of 300 with the bias seeded at zero must
        // end up attributed to bias, not motion.
        let mut axis = AxisBiasFilter::new(&BiasKalmanParams::default());
        axis.seed_bias(0.0);
        let mut rate = f64::MAX;
        for _ in 0..2000 {
            rate = axis.step(300.0).unwrap();
        }
        assert!(rate.abs() < 30.0, "rate {rate}");
        assert!((axis.bias() - 300.0).abs() < 30.0, "bias {}", axis.bias());
    }

    #[test]
    fn quick_motion_passes_through_as_rate() {
        let mut axis = AxisBiasFilter::new(&BiasKalmanParams::default());
        axis.seed_bias(100.0);
        // Settle on the bias first.
        for _ in 0..500 {
            axis.step(100.0).unwrap();
        }
        // A sudden swing should read mostly as rate immediately.
        let rate = axis.step(2100.0).unwrap();
        assert!(rate > 1000.0, "rate {rate}");
        assert!(axis.bias() < 300.0, "bias {}", axis.bias());
    }

    #[test]
    fn seeding_speeds_convergence() {
        let params = BiasKalmanParams::default();
        let mut seeded = AxisBiasFilter::new(&params);
        seeded.seed_bias(250.0);
        let mut cold = AxisBiasFilter::new(&params);
        let mut seeded_rate = 0.0;
        let mut cold_rate = 0.0;
        for _ in 0..20 {
            seeded_rate = seeded.step(250.0).unwrap();
            cold_rate = cold.step(250.0).unwrap();
        }
        assert!(seeded_rate.abs() < cold_rate.abs());
    }

    #[test]
    fn tracks_slow_bias_drift() {
        let mut axis = AxisBiasFilter::new(&BiasKalmanParams::default());
        axis.seed_bias(0.0);
        // Bias ramps 0 -> 200 over 20 s of stationary readings.
        let n = 4000;
        for i in 0..n {
            let bias = 200.0 * i as f64 / n as f64;
            axis.step(bias).unwrap();
        }
        assert!((axis.bias() - 200.0).abs() < 50.0, "bias {}", axis.bias());
    }

    #[test]
    fn three_axis_wrapper_rounds() {
        let mut filter = GyroBiasFilter::new(&BiasKalmanParams::default());
        filter.seed([10.0, 20.0, 30.0]);
        let mut out = (0, 0, 0);
        for _ in 0..1000 {
            out = filter.step(10, 20, 30).unwrap();
        }
        assert!(out.0.abs() <= 2 && out.1.abs() <= 2 && out.2.abs() <= 2);
        let bias = filter.bias();
        assert!((bias[0] - 10.0).abs() < 5.0);
        assert!((bias[1] - 20.0).abs() < 5.0);
        assert!((bias[2] - 30.0).abs() < 5.0);
    }
}

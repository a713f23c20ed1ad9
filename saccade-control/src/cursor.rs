//! Cursor integrators: head motion in, pixel deltas out.
//!
//! Two interchangeable variants share the whole fusion/dispatch layer and
//! differ only in how gyro rates become pixels. Coordinate mapping in both:
//! a head turn (yaw, `gy`) moves the pointer horizontally, a head tilt
//! (pitch, `gx`) moves it vertically.

use nalgebra::{Matrix4, Matrix4x2, Vector2, Vector4};

use saccade_types::CursorParams;

pub trait CursorDriver {
    /// Integrate one sample. `suppress` kills input for this tick (and,
    /// for the inertial variant, velocity too, so the pointer stops dead
    /// the moment a command gesture begins). Returns the pixel delta.
    fn step(&mut self, gx: f64, gy: f64, suppress: bool) -> (f64, f64);

    /// Zero any retained motion without touching configuration.
    fn halt(&mut self);

    /// Return to the power-on state.
    fn reset(&mut self);
}

/// Direct proportional mapping, no inertia.
#[derive(Debug)]
pub struct ProportionalDriver {
    sensitivity: f64,
    deadzone: f64,
}

impl ProportionalDriver {
    pub fn new(params: &CursorParams, deadzone: f64) -> Self {
        Self {
            sensitivity: params.proportional_sensitivity,
            deadzone,
        }
    }
}

impl CursorDriver for ProportionalDriver {
    fn step(&mut self, gx: f64, gy: f64, suppress: bool) -> (f64, f64) {
        if suppress {
            return (0.0, 0.0);
        }
        let dx = if gy.abs() > self.deadzone {
            gy * self.sensitivity
        } else {
            0.0
        };
        let dy = if gx.abs() > self.deadzone {
            gx * self.sensitivity
        } else {
            0.0
        };
        (dx, dy)
    }

    fn halt(&mut self) {}

    fn reset(&mut self) {}
}

/// Second-order state-space integrator with velocity retention.
///
/// State `[px, vx, py, vy]` evolves as `s' = A s + B u`. Position is a
/// per-tick accumulator: it is emitted as the pixel delta and zeroed after
/// every step, so only velocity persists. Releasing the head leaves an
/// exponentially decaying velocity tail, the glide.
#[derive(Debug)]
pub struct StateSpaceDriver {
    a: Matrix4<f64>,
    b: Matrix4x2<f64>,
    state: Vector4<f64>,
    deadzone: f64,
}

impl StateSpaceDriver {
    pub fn new(params: &CursorParams, deadzone: f64) -> Self {
        let dt = params.dt;
        let alpha = params.velocity_retain;
        let k = params.input_gain;
        #[rustfmt::skip]
        let a = Matrix4::new(
            1.0,  dt, 0.0, 0.0,
            0.0, alpha, 0.0, 0.0,
            0.0, 0.0, 1.0,  dt,
            0.0, 0.0, 0.0, alpha,
        );
        #[rustfmt::skip]
        let b = Matrix4x2::new(
            0.0, 0.0,
              k, 0.0,
            0.0, 0.0,
            0.0,   k,
        );
        Self {
            a,
            b,
            state: Vector4::zeros(),
            deadzone,
        }
    }

    /// Current velocity components, exposed for tests.
    pub fn velocity(&self) -> (f64, f64) {
        (self.state[1], self.state[3])
    }
}

impl CursorDriver for StateSpaceDriver {
    fn step(&mut self, gx: f64, gy: f64, suppress: bool) -> (f64, f64) {
        let u = if suppress {
            // Force-zero velocity so the stop is instant, not a decay.
            self.state[1] = 0.0;
            self.state[3] = 0.0;
            Vector2::zeros()
        } else {
            let ux = if gy.abs() > self.deadzone { gy } else { 0.0 };
            let uy = if gx.abs() > self.deadzone { gx } else { 0.0 };
            Vector2::new(ux, uy)
        };

        self.state = self.a * self.state + self.b * u;

        let delta = (self.state[0], self.state[2]);
        // Flush the position accumulator; velocity carries over.
        self.state[0] = 0.0;
        self.state[2] = 0.0;
        delta
    }

    fn halt(&mut self) {
        self.state[1] = 0.0;
        self.state[3] = 0.0;
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
    }
}

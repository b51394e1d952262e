// src/analysis/ball_filter.rs
//
// Linear Kalman filter with a constant-velocity motion model, tracking the
// ball center in image-plane coordinates.
//
// State vector x = [px, py, vx, vy]ᵀ. Only position is observed; velocity
// is inferred through the position/velocity coupling in F. Measurements are
// intermittent (the detector misses the ball in many frames), so predict()
// runs every frame and the state dead-reckons on the last velocity estimate
// until a detection resumes.

use crate::types::FilterConfig;
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};

/// Position/velocity estimate exposed to the display layer.
#[derive(Debug, Clone, Copy)]
pub struct BallState {
    pub position: (f64, f64),
    pub velocity: (f64, f64),
    pub initialized: bool,
}

pub struct BallFilter {
    /// State [px, py, vx, vy]
    x: Vector4<f64>,
    /// State covariance
    p: Matrix4<f64>,
    /// Transition model (constant velocity, fixed dt)
    f: Matrix4<f64>,
    /// Position-only observation model
    h: Matrix2x4<f64>,
    /// Process noise covariance
    q: Matrix4<f64>,
    /// Measurement noise covariance
    r: Matrix2<f64>,
    initialized: bool,
}

impl BallFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let dt = config.dt;
        let mut f = Matrix4::<f64>::identity();
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;

        let mut h = Matrix2x4::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        Self {
            x: Vector4::zeros(),
            p: Matrix4::identity() * 500.0,
            f,
            h,
            q: Matrix4::identity() * config.process_noise_std,
            r: Matrix2::identity() * config.measurement_noise_std,
            initialized: false,
        }
    }

    /// Advance one time step. Must be called exactly once per frame, whether
    /// or not a measurement arrives.
    pub fn predict(&mut self) {
        self.x = self.f * self.x;
        self.p = self.f * self.p * self.f.transpose() + self.q;
    }

    /// Absorb a position measurement. The first measurement bootstraps the
    /// position directly; there is no velocity information yet.
    pub fn update(&mut self, measurement: (f32, f32)) {
        let z = Vector2::new(measurement.0 as f64, measurement.1 as f64);

        if !self.initialized {
            self.x[0] = z[0];
            self.x[1] = z[1];
            self.initialized = true;
            return;
        }

        // Innovation: y = z − H·x
        let y = z - self.h * self.x;

        // Innovation covariance: S = H·P·Hᵀ + R
        let s = self.h * self.p * self.h.transpose() + self.r;

        // Singular S cannot happen with strictly positive measurement noise
        let s_inv = s
            .try_inverse()
            .expect("Innovation covariance S is singular");

        // Gain: K = P·Hᵀ·S⁻¹
        let k: Matrix4x2<f64> = self.p * self.h.transpose() * s_inv;

        self.x += k * y;
        self.p = (Matrix4::identity() - k * self.h) * self.p;
    }

    pub fn state(&self) -> BallState {
        BallState {
            position: (self.x[0], self.x[1]),
            velocity: (self.x[2], self.x[3]),
            initialized: self.initialized,
        }
    }

    #[cfg(test)]
    fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }
}

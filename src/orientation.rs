//! Gravity tracking from gyroscope integration.
//!
//! After calibration the gravity estimate is kept aligned with the device
//! by integrating gyroscope rates: each step rotates the estimate by the
//! negated incremental angle about x, then y, then z. The device turned by
//! `+Δ`, so gravity as seen in device coordinates turned by `-Δ`.
//!
//! Two heuristics keep the estimate usable:
//! - **Dead zone**: per-axis increments below a threshold are dropped, so
//!   gyro noise is not integrated while the device is still.
//! - **Reacquisition**: when the live accelerometer magnitude stays inside
//!   the acceptance band for a full run of samples, the device is assumed
//!   stationary and the estimate is snapped to the raw reading, discarding
//!   accumulated integration drift.
//!
//! The plane rotations are applied in sequence and never re-orthonormalized.
//! Per-step angles are small at 100 Hz-class rates, and reacquisition bounds
//! the error that builds up between snaps.

use crate::calibration::GravityEstimate;
use crate::vector::Vector3;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Outcome of feeding one gyroscope sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GyroStep {
    /// First gyro sample since reset: timestamp recorded, nothing integrated.
    Seeded,
    /// The estimate was rotated by the given (dead-zoned) angles in radians.
    Integrated(Vector3),
}

/// Tracks the gravity estimate while the engine is measuring.
#[derive(Debug, Clone)]
pub struct OrientationTracker {
    /// Gravity estimate, `None` until calibration completes.
    estimate: Option<GravityEstimate>,

    /// Timestamp of the last gyro sample (ns), `None` when unset.
    previous_gyro_ns: Option<i64>,

    /// Remaining in-band samples before a snap, `None` when no run is active.
    reacquisition: Option<u32>,

    dead_zone: f64,
    run_length: u32,
}

impl OrientationTracker {
    /// Create a tracker with the given dead zone (rad) and reacquisition run
    /// length (samples).
    pub fn new(dead_zone: f64, run_length: u32) -> Self {
        Self {
            estimate: None,
            previous_gyro_ns: None,
            reacquisition: None,
            dead_zone,
            run_length,
        }
    }

    /// Drops the estimate and all integration state.
    pub fn reset(&mut self) {
        self.estimate = None;
        self.previous_gyro_ns = None;
        self.reacquisition = None;
    }

    /// Installs a freshly calibrated estimate.
    pub fn set_estimate(&mut self, estimate: GravityEstimate) {
        self.estimate = Some(estimate);
        self.reacquisition = None;
    }

    /// Records a gyro timestamp without integrating. Used while calibrating
    /// so the first measuring step integrates a real interval.
    pub fn seed_timestamp(&mut self, timestamp_ns: i64) {
        self.previous_gyro_ns = Some(timestamp_ns);
    }

    /// Current estimate, if calibrated.
    pub fn estimate(&self) -> Option<&GravityEstimate> {
        self.estimate.as_ref()
    }

    /// Timestamp of the last gyro sample seen.
    pub fn previous_gyro_timestamp(&self) -> Option<i64> {
        self.previous_gyro_ns
    }

    /// Remaining samples in the active reacquisition run.
    pub fn reacquisition_countdown(&self) -> Option<u32> {
        self.reacquisition
    }

    /// Integrates one gyroscope reading (rad/s) taken at `timestamp_ns`.
    ///
    /// The stored timestamp is always advanced, so consecutive samples
    /// integrate the true elapsed interval.
    pub fn integrate_gyro(&mut self, timestamp_ns: i64, rate: Vector3) -> GyroStep {
        let previous = self.previous_gyro_ns.replace(timestamp_ns);
        let Some(previous) = previous else {
            return GyroStep::Seeded;
        };

        let dt = timestamp_ns.saturating_sub(previous) as f64 / NANOS_PER_SECOND;
        let delta = Vector3::new(
            self.limit_noise(rate.x * dt),
            self.limit_noise(rate.y * dt),
            self.limit_noise(rate.z * dt),
        );

        if let Some(estimate) = self.estimate.as_mut() {
            estimate.vector = estimate
                .vector
                .rotate_x(-delta.x)
                .rotate_y(-delta.y)
                .rotate_z(-delta.z);
        }
        GyroStep::Integrated(delta)
    }

    /// Feeds one accelerometer reading to the reacquisition heuristic.
    ///
    /// Returns `true` when this reading completed a run and the estimate was
    /// snapped to it.
    pub fn observe_accel(&mut self, accel: Vector3) -> bool {
        let Some(estimate) = self.estimate.as_mut() else {
            return false;
        };

        if !estimate.in_band(accel.magnitude()) {
            self.reacquisition = None;
            return false;
        }

        let remaining = self
            .reacquisition
            .unwrap_or(self.run_length)
            .saturating_sub(1);
        if remaining == 0 {
            estimate.vector = accel;
            self.reacquisition = None;
            true
        } else {
            self.reacquisition = Some(remaining);
            false
        }
    }

    fn limit_noise(&self, angle: f64) -> f64 {
        if angle.abs() < self.dead_zone {
            0.0
        } else {
            angle
        }
    }
}

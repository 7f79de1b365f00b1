//! Gravity calibration.
//!
//! While the engine is calibrating, every accelerometer reading is summed.
//! When the global sample counter reaches the window limit the sum is
//! averaged into the initial gravity estimate, together with an acceptance
//! band of ±tolerance around its magnitude.
//!
//! Design note: the window is counted in samples, not in wall-clock time,
//! so the calibration duration follows the rate the host delivers samples
//! at. Averaging over a long window assumes the device is roughly still
//! during setup and suppresses single-sample noise.

use crate::vector::Vector3;

/// Current best estimate of gravity in device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityEstimate {
    /// Gravity vector. Rotated by the gyro path and re-snapped by the
    /// reacquisition path while measuring.
    pub vector: Vector3,

    /// Magnitude of the calibrated vector. Fixed until the next calibration.
    pub magnitude: f64,

    /// Upper bound of the acceptance band.
    pub high_band: f64,

    /// Lower bound of the acceptance band.
    pub low_band: f64,
}

impl GravityEstimate {
    /// Builds an estimate and its acceptance band from an averaged vector.
    pub fn from_vector(vector: Vector3, tolerance: f64) -> Self {
        let magnitude = vector.magnitude();
        Self {
            vector,
            magnitude,
            high_band: magnitude * (1.0 + tolerance),
            low_band: magnitude * (1.0 - tolerance),
        }
    }

    /// Whether `len` lies strictly inside the acceptance band.
    pub fn in_band(&self, len: f64) -> bool {
        self.low_band < len && len < self.high_band
    }
}

/// Result of checking the calibration window after a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    /// The window is still open.
    Pending,
    /// The window closed without any accelerometer sample and was extended
    /// to the given limit.
    Extended(u64),
    /// Calibration finished with this estimate.
    Complete(GravityEstimate),
}

/// Accumulator for the calibration window.
#[derive(Debug, Clone)]
pub struct Calibrator {
    sum: Vector3,
    accel_samples: u64,
    limit: u64,
    window: u64,
    tolerance: f64,
}

impl Calibrator {
    /// Create a calibrator with the given window length (in samples) and
    /// band tolerance.
    pub fn new(window: u64, tolerance: f64) -> Self {
        Self {
            sum: Vector3::ZERO,
            accel_samples: 0,
            limit: window,
            window,
            tolerance,
        }
    }

    /// Clears the accumulator and restores the initial limit.
    pub fn reset(&mut self) {
        self.sum = Vector3::ZERO;
        self.accel_samples = 0;
        self.limit = self.window;
    }

    /// Adds one accelerometer reading to the sum.
    pub fn accumulate(&mut self, accel: Vector3) {
        self.sum = self.sum + accel;
        self.accel_samples += 1;
    }

    /// Checks the window against the global sample counter.
    ///
    /// Must be called once per sample while calibrating, after the sample
    /// has been counted and accumulated. An empty window is extended rather
    /// than failed, so calibration always ends on at least one
    /// accelerometer reading.
    pub fn check(&mut self, sample_counter: u64) -> CalibrationStatus {
        if sample_counter < self.limit {
            return CalibrationStatus::Pending;
        }

        if self.accel_samples == 0 {
            self.limit += self.window;
            log::debug!("Increasing calibrating limit to {} samples", self.limit);
            return CalibrationStatus::Extended(self.limit);
        }

        let average = self.sum / self.accel_samples as f64;
        let estimate = GravityEstimate::from_vector(average, self.tolerance);
        log::debug!(
            "Calibrated gravity vector: x: {}; y: {}; z: {}; len: {} ({} accelerometer samples)",
            estimate.vector.x,
            estimate.vector.y,
            estimate.vector.z,
            estimate.magnitude,
            self.accel_samples
        );
        CalibrationStatus::Complete(estimate)
    }

    /// Current window limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of accelerometer readings accumulated so far.
    pub fn accel_samples(&self) -> u64 {
        self.accel_samples
    }
}

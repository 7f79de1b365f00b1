//! Core data types for the linear acceleration engine.
//!
//! This module defines the input contract (timestamped samples tagged by
//! sensor kind) and the externally visible engine state.
//!
//! Design principle: a sample is immutable and consumed exactly once. The
//! engine never keeps a reference to it after `on_sample` returns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::Vector3;

/// Which sensor produced a sample.
///
/// The kind is resolved by the host from sensor identity; the engine never
/// guesses it from the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Accelerometer reading in m/s² (gravity included).
    Accelerometer,
    /// Gyroscope reading in rad/s.
    Gyroscope,
    /// A sensor the host could not identify.
    Unknown,
}

impl SensorKind {
    /// Label used for this kind in debug capture files.
    pub fn label(&self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "accel",
            SensorKind::Gyroscope => "gyro",
            SensorKind::Unknown => "n/a",
        }
    }

    /// Inverse of [`SensorKind::label`] for the two real sensors.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "accel" => Some(SensorKind::Accelerometer),
            "gyro" => Some(SensorKind::Gyroscope),
            _ => None,
        }
    }
}

/// Errors raised while building a sample from raw host values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("sample has {0} components, expected at least 3")]
    TooFewComponents(usize),
}

/// A single timestamped sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Monotonic timestamp in nanoseconds. Non-decreasing within one sensor
    /// stream; no ordering holds between the two streams.
    pub timestamp_ns: i64,

    /// Sensor that produced the reading.
    pub kind: SensorKind,

    /// Reading in device-local coordinates.
    pub vector: Vector3,
}

impl Sample {
    pub fn new(kind: SensorKind, timestamp_ns: i64, vector: Vector3) -> Self {
        Self {
            timestamp_ns,
            kind,
            vector,
        }
    }

    /// Builds a sample from the raw value slice a sensor subsystem delivers.
    ///
    /// Extra components beyond the third are ignored.
    pub fn from_values(
        kind: SensorKind,
        timestamp_ns: i64,
        values: &[f32],
    ) -> Result<Self, SampleError> {
        match values {
            [x, y, z, ..] => Ok(Self::new(
                kind,
                timestamp_ns,
                Vector3::new(*x as f64, *y as f64, *z as f64),
            )),
            _ => Err(SampleError::TooFewComponents(values.len())),
        }
    }
}

/// State of the sampling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Not sampling. Initial state, and the state after every stop.
    #[default]
    Idle,
    /// Averaging accelerometer samples into the initial gravity estimate.
    Calibrating,
    /// Tracking gravity and reporting earth-frame diffs.
    Measuring,
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "Idle",
            EngineState::Calibrating => "Calibrating",
            EngineState::Measuring => "Measuring",
        }
    }

    /// Numeric code used across the C ABI.
    pub fn code(&self) -> i32 {
        match self {
            EngineState::Idle => 0,
            EngineState::Calibrating => 1,
            EngineState::Measuring => 2,
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

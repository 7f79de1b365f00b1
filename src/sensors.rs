//! Sensor availability and listener registration.
//!
//! The engine does not talk to sensor hardware. At `start()` it asks the
//! host for an accelerometer and a gyroscope and, when both exist, asks the
//! host to register listeners for them. Samples then arrive through
//! `on_sample`. A missing sensor is a degraded but non-fatal condition.

use thiserror::Error;

use crate::types::SensorKind;

/// A sensor the host can deliver samples for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    pub kind: SensorKind,
    /// Human-readable name for logs.
    pub name: String,
}

impl SensorInfo {
    pub fn new(kind: SensorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("failed to register listener for {sensor}: {reason}")]
    Registration { sensor: String, reason: String },
}

/// Platform sensor subsystem as seen by the engine.
pub trait SensorHost: Send {
    /// Looks up the first sensor of the given kind.
    fn find_sensor(&mut self, kind: SensorKind) -> Option<SensorInfo>;

    /// Starts delivering samples of `sensor` to the engine.
    fn register_listener(&mut self, sensor: &SensorInfo) -> Result<(), SensorError>;

    /// Stops delivering samples of every registered sensor.
    fn unregister_listeners(&mut self);
}

/// Host with a fixed set of sensors and no real registration.
///
/// Used for replays, FFI hosts that register listeners on their own side,
/// and tests.
#[derive(Debug, Clone)]
pub struct StaticSensorHost {
    has_accelerometer: bool,
    has_gyroscope: bool,
    registered: Vec<SensorKind>,
}

impl StaticSensorHost {
    pub fn new(has_accelerometer: bool, has_gyroscope: bool) -> Self {
        Self {
            has_accelerometer,
            has_gyroscope,
            registered: Vec::new(),
        }
    }

    /// Host reporting both sensors present.
    pub fn complete() -> Self {
        Self::new(true, true)
    }

    /// Kinds currently registered.
    pub fn registered(&self) -> &[SensorKind] {
        &self.registered
    }
}

impl SensorHost for StaticSensorHost {
    fn find_sensor(&mut self, kind: SensorKind) -> Option<SensorInfo> {
        match kind {
            SensorKind::Accelerometer if self.has_accelerometer => {
                Some(SensorInfo::new(kind, "static accelerometer"))
            }
            SensorKind::Gyroscope if self.has_gyroscope => {
                Some(SensorInfo::new(kind, "static gyroscope"))
            }
            _ => None,
        }
    }

    fn register_listener(&mut self, sensor: &SensorInfo) -> Result<(), SensorError> {
        if !self.registered.contains(&sensor.kind) {
            self.registered.push(sensor.kind);
        }
        Ok(())
    }

    fn unregister_listeners(&mut self) {
        self.registered.clear();
    }
}

//! Gyroscope-stabilized Linear Acceleration Engine
//!
//! Converts a stream of accelerometer and gyroscope samples into a
//! continuously updated estimate of linear acceleration in a gravity-aligned
//! reference frame, reported at a bounded rate.
//!
//! # Design Philosophy
//!
//! - **Calibrate, then track**: gravity is averaged over a fixed sample
//!   window while the device rests, then kept aligned by gyro integration.
//! - **Drift correction by reacquisition**: whenever the accelerometer
//!   magnitude stays near gravity for a short run, the estimate is re-snapped
//!   to the live reading.
//! - **Deterministic core**: every stage is O(1) per sample with no I/O on
//!   the hot path; only the diff throttle reads a clock.
//! - **Best-effort delivery**: notifications go to an optional sink and a
//!   failing sink never disturbs sampling.
//!
//! # Example
//!
//! ```
//! use gyroaccel::{EngineConfig, SamplingEngine, Sample, SensorKind, StaticSensorHost, Vector3};
//!
//! let config = EngineConfig { calibration_samples: 100, ..EngineConfig::default() };
//! let mut engine = SamplingEngine::new(config, Box::new(StaticSensorHost::complete())).unwrap();
//! engine.start();
//!
//! for i in 0..100 {
//!     let sample = Sample::new(SensorKind::Accelerometer, i * 10_000_000, Vector3::new(0.0, 0.0, 9.81));
//!     engine.on_sample(&sample);
//! }
//! assert_eq!(engine.state(), gyroaccel::EngineState::Measuring);
//! ```

pub mod calibration;
pub mod capture;
pub mod config;
pub mod engine;
pub mod ffi;
pub mod frame;
pub mod orientation;
pub mod reporter;
pub mod sensors;
pub mod shared;
pub mod sink;
pub mod types;
pub mod vector;

#[cfg(test)]
mod integration_tests;

// Re-export commonly used types
pub use calibration::GravityEstimate;
pub use config::{ConfigError, EngineConfig};
pub use engine::SamplingEngine;
pub use reporter::{Clock, ManualClock, MonotonicClock};
pub use sensors::{SensorHost, SensorInfo, StaticSensorHost};
pub use shared::SharedEngine;
pub use sink::{ChannelSink, Notification, NotificationSink, SinkError};
pub use types::{EngineState, Sample, SampleError, SensorKind};
pub use vector::Vector3;

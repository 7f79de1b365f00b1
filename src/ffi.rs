//! C FFI bindings for platform hosts.
//!
//! This module exposes the engine to a native host (an Android service, an
//! iOS bridge) via the C ABI. The host resolves sensor identity, feeds
//! samples and receives events through a table of C callbacks.
//!
//! Memory Safety:
//! - The engine instance must be freed with `gyroaccel_engine_destroy()`
//! - NULL checks are performed on all pointer inputs
//!
//! Thread Safety:
//! - Every entry point goes through a [`SharedEngine`], so samples from
//!   several sensor threads and lifecycle calls are serialized.
//! - Callbacks are invoked while the engine lock is held; they must not
//!   call back into the engine.

use std::os::raw::{c_int, c_void};
use std::ptr;
use std::slice;

use crate::config::EngineConfig;
use crate::engine::SamplingEngine;
use crate::sensors::StaticSensorHost;
use crate::shared::SharedEngine;
use crate::sink::{NotificationSink, SinkError};
use crate::types::{EngineState, SensorKind};
use crate::vector::Vector3;

// ============================================================================
// OPAQUE HANDLE & C TYPES
// ============================================================================

/// Opaque handle to an engine.
pub struct GaEngine {
    shared: SharedEngine,
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
    /// Invalid parameter value.
    InvalidParameter = 2,
}

/// Sensor kind codes accepted by `gyroaccel_engine_on_sample`.
pub const GA_SENSOR_UNKNOWN: c_int = 0;
pub const GA_SENSOR_ACCELEROMETER: c_int = 1;
pub const GA_SENSOR_GYROSCOPE: c_int = 2;

/// Callback return codes.
pub const GA_CALLBACK_OK: c_int = 0;
pub const GA_CALLBACK_DISCONNECTED: c_int = 1;

/// Engine configuration. Zero numeric fields select the defaults.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GaConfig {
    /// Non-zero when the device has an accelerometer.
    pub has_accelerometer: c_int,
    /// Non-zero when the device has a gyroscope.
    pub has_gyroscope: c_int,
    /// Calibration window in samples.
    pub calibration_samples: u64,
    /// Diff report interval in milliseconds.
    pub diff_interval_ms: u64,
    /// Samples between progress notifications.
    pub progress_interval: u64,
}

/// Event callbacks. Any of them may be NULL.
///
/// Each returns `GA_CALLBACK_OK`, `GA_CALLBACK_DISCONNECTED` when the
/// receiving side is gone, or any other value for a transient failure.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GaCallbacks {
    pub user_data: *mut c_void,
    pub on_state_changed: Option<unsafe extern "C" fn(user_data: *mut c_void, state: c_int) -> c_int>,
    pub on_sample_progress: Option<unsafe extern "C" fn(user_data: *mut c_void, count: u64) -> c_int>,
    pub on_diff: Option<unsafe extern "C" fn(user_data: *mut c_void, x: f64, y: f64, z: f64) -> c_int>,
}

/// Sink forwarding events to C callbacks.
struct CallbackSink {
    callbacks: GaCallbacks,
}

// SAFETY: the host guarantees `user_data` may be used from whichever thread
// drives the engine; every use happens under the engine lock.
unsafe impl Send for CallbackSink {}

fn callback_result(code: c_int) -> Result<(), SinkError> {
    match code {
        GA_CALLBACK_OK => Ok(()),
        GA_CALLBACK_DISCONNECTED => Err(SinkError::Disconnected),
        other => Err(SinkError::Delivery(format!("callback returned {}", other))),
    }
}

impl NotificationSink for CallbackSink {
    fn on_state_changed(&mut self, state: EngineState) -> Result<(), SinkError> {
        match self.callbacks.on_state_changed {
            // SAFETY: the host registered a valid function for this user_data
            Some(f) => callback_result(unsafe { f(self.callbacks.user_data, state.code()) }),
            None => Ok(()),
        }
    }

    fn on_sample_progress(&mut self, count: u64) -> Result<(), SinkError> {
        match self.callbacks.on_sample_progress {
            // SAFETY: see above
            Some(f) => callback_result(unsafe { f(self.callbacks.user_data, count) }),
            None => Ok(()),
        }
    }

    fn on_diff(&mut self, diff: Vector3) -> Result<(), SinkError> {
        match self.callbacks.on_diff {
            // SAFETY: see above
            Some(f) => callback_result(unsafe { f(self.callbacks.user_data, diff.x, diff.y, diff.z) }),
            None => Ok(()),
        }
    }
}

fn engine_config(config: &GaConfig) -> EngineConfig {
    let mut engine_config = EngineConfig::default();
    if config.calibration_samples > 0 {
        engine_config.calibration_samples = config.calibration_samples;
    }
    if config.diff_interval_ms > 0 {
        engine_config.diff_interval_ms = config.diff_interval_ms;
    }
    if config.progress_interval > 0 {
        engine_config.progress_interval = config.progress_interval;
    }
    engine_config
}

fn sensor_kind(code: c_int) -> SensorKind {
    match code {
        GA_SENSOR_ACCELEROMETER => SensorKind::Accelerometer,
        GA_SENSOR_GYROSCOPE => SensorKind::Gyroscope,
        _ => SensorKind::Unknown,
    }
}

// ============================================================================
// ENGINE LIFECYCLE
// ============================================================================

/// Create a new engine instance in the Idle state.
///
/// # Safety
/// - `config` must be a valid pointer to `GaConfig`.
/// - `callbacks` may be NULL; otherwise it must point to a valid
///   `GaCallbacks` whose functions stay callable until the engine is
///   destroyed or the callbacks are removed.
/// - The returned pointer must be freed with `gyroaccel_engine_destroy()`.
///
/// # Returns
/// - Pointer to the engine on success, NULL on failure.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_create(
    config: *const GaConfig,
    callbacks: *const GaCallbacks,
) -> *mut GaEngine {
    if config.is_null() {
        return ptr::null_mut();
    }
    let config = &*config;

    let host = StaticSensorHost::new(config.has_accelerometer != 0, config.has_gyroscope != 0);
    let mut engine = match SamplingEngine::new(engine_config(config), Box::new(host)) {
        Ok(engine) => engine,
        Err(err) => {
            log::error!("Failed to create engine: {}", err);
            return ptr::null_mut();
        }
    };

    if !callbacks.is_null() {
        engine.set_sink(Box::new(CallbackSink {
            callbacks: *callbacks,
        }));
    }

    Box::into_raw(Box::new(GaEngine {
        shared: SharedEngine::new(engine),
    }))
}

/// Destroy an engine instance, stopping it first.
///
/// # Safety
/// - `engine` must be a valid pointer from `gyroaccel_engine_create()`.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_destroy(engine: *mut GaEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Start (or restart) sampling.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_start(engine: *const GaEngine) -> GaStatus {
    if engine.is_null() {
        return GaStatus::NullPointer;
    }
    (*engine).shared.start();
    GaStatus::Ok
}

/// Stop sampling and return to Idle.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_stop(engine: *const GaEngine) -> GaStatus {
    if engine.is_null() {
        return GaStatus::NullPointer;
    }
    (*engine).shared.stop();
    GaStatus::Ok
}

/// Detach the callbacks. Later events are discarded.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_remove_callbacks(engine: *const GaEngine) -> GaStatus {
    if engine.is_null() {
        return GaStatus::NullPointer;
    }
    (*engine).shared.remove_sink();
    GaStatus::Ok
}

// ============================================================================
// SAMPLE PROCESSING
// ============================================================================

/// Process a single sensor sample.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `values` must point to `len` readable floats.
///
/// # Parameters
/// - `kind`: `GA_SENSOR_ACCELEROMETER`, `GA_SENSOR_GYROSCOPE` or anything
///   else for an unknown sensor.
/// - `timestamp_ns`: monotonic sample timestamp in nanoseconds.
/// - `values`/`len`: raw sensor values; fewer than 3 discards the sample.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_on_sample(
    engine: *const GaEngine,
    kind: c_int,
    timestamp_ns: i64,
    values: *const f32,
    len: usize,
) -> GaStatus {
    if engine.is_null() {
        return GaStatus::NullPointer;
    }
    if values.is_null() {
        return if len == 0 {
            GaStatus::Ok
        } else {
            GaStatus::NullPointer
        };
    }
    let values = slice::from_raw_parts(values, len);
    (*engine)
        .shared
        .on_raw_sample(sensor_kind(kind), timestamp_ns, values);
    GaStatus::Ok
}

// ============================================================================
// QUERIES
// ============================================================================

/// Current engine state (0 = Idle, 1 = Calibrating, 2 = Measuring), or -1
/// for a NULL engine.
///
/// # Safety
/// - `engine` must be NULL or a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_state(engine: *const GaEngine) -> c_int {
    if engine.is_null() {
        return -1;
    }
    (*engine).shared.state().code()
}

/// 1 while sampling, 0 otherwise (including for a NULL engine).
///
/// # Safety
/// - `engine` must be NULL or a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_is_sampling(engine: *const GaEngine) -> c_int {
    if engine.is_null() {
        return 0;
    }
    (*engine).shared.is_sampling() as c_int
}

/// Write the current gravity estimate into `out` (3 doubles).
///
/// # Safety
/// - `engine` must be a valid pointer; `out` must point to 3 writable doubles.
///
/// # Returns
/// - `InvalidParameter` when the engine is not calibrated yet.
#[no_mangle]
pub unsafe extern "C" fn gyroaccel_engine_gravity(engine: *const GaEngine, out: *mut f64) -> GaStatus {
    if engine.is_null() || out.is_null() {
        return GaStatus::NullPointer;
    }
    match (*engine).shared.gravity() {
        Some(estimate) => {
            let out = slice::from_raw_parts_mut(out, 3);
            out.copy_from_slice(&estimate.vector.to_array());
            GaStatus::Ok
        }
        None => GaStatus::InvalidParameter,
    }
}

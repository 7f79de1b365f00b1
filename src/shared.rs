//! Thread-safe engine handle.
//!
//! Sensor callbacks may arrive on more than one thread, and `stop()` may be
//! called from a lifecycle thread while a sample is in flight. All engine
//! operations run under one mutex, so every call sees the engine in a
//! consistent state and samples are processed one at a time.
//!
//! A panic while holding the lock poisons it; the handle keeps using the
//! inner engine rather than propagating the poison to the host.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::calibration::GravityEstimate;
use crate::engine::SamplingEngine;
use crate::sink::NotificationSink;
use crate::types::{EngineState, Sample, SensorKind};

/// Cloneable, serialized handle to a [`SamplingEngine`].
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<SamplingEngine>>,
}

impl SharedEngine {
    pub fn new(engine: SamplingEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SamplingEngine> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("Engine lock poisoned, continuing with inner state");
            poisoned.into_inner()
        })
    }

    pub fn start(&self) {
        self.lock().start();
    }

    pub fn stop(&self) {
        self.lock().stop();
    }

    pub fn on_sample(&self, sample: &Sample) {
        self.lock().on_sample(sample);
    }

    pub fn on_raw_sample(&self, kind: SensorKind, timestamp_ns: i64, values: &[f32]) {
        self.lock().on_raw_sample(kind, timestamp_ns, values);
    }

    pub fn set_sink(&self, sink: Box<dyn NotificationSink>) {
        self.lock().set_sink(sink);
    }

    pub fn remove_sink(&self) -> Option<Box<dyn NotificationSink>> {
        self.lock().remove_sink()
    }

    pub fn state(&self) -> EngineState {
        self.lock().state()
    }

    pub fn is_sampling(&self) -> bool {
        self.lock().is_sampling()
    }

    pub fn sample_count(&self) -> u64 {
        self.lock().sample_count()
    }

    pub fn gravity(&self) -> Option<GravityEstimate> {
        self.lock().gravity()
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut SamplingEngine) -> R) -> R {
        f(&mut self.lock())
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::sensors::StaticSensorHost;
    use crate::vector::Vector3;
    use std::thread;

    fn shared(calibration_samples: u64) -> SharedEngine {
        let config = EngineConfig {
            calibration_samples,
            ..EngineConfig::default()
        };
        let engine = SamplingEngine::new(config, Box::new(StaticSensorHost::complete())).unwrap();
        SharedEngine::new(engine)
    }

    #[test]
    fn test_samples_from_many_threads_are_all_counted() {
        let engine = shared(1_000_000);
        engine.start();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = engine.clone();
                thread::spawn(move || {
                    let kind = if t % 2 == 0 {
                        SensorKind::Accelerometer
                    } else {
                        SensorKind::Gyroscope
                    };
                    for i in 0..500 {
                        engine.on_sample(&Sample::new(kind, i, Vector3::new(0.0, 0.0, 9.8)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.sample_count(), 2000);
        assert_eq!(engine.state(), EngineState::Calibrating);
    }

    #[test]
    fn test_stop_concurrent_with_samples_ends_idle() {
        let engine = shared(50);
        engine.start();

        let feeder = {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    engine.on_raw_sample(SensorKind::Accelerometer, i, &[0.0, 0.0, 9.8]);
                }
            })
        };
        engine.stop();
        feeder.join().unwrap();

        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_sampling());
    }

    #[test]
    fn test_with_engine() {
        let engine = shared(10);
        let limit = engine.with_engine(|e| e.calibration_limit());
        assert_eq!(limit, 10);
    }
}

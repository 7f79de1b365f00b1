//! The sampling engine.
//!
//! This module owns the engine state machine and routes every incoming
//! sample through the processing stages:
//!
//! 1. **Counting**: every accepted sample advances the sample counter;
//!    every Nth one is reported as progress.
//! 2. **Calibrating**: accelerometer readings are averaged into the initial
//!    gravity estimate; gyro timestamps only seed the integration clock.
//! 3. **Measuring**: gyro readings rotate the gravity estimate, accelerometer
//!    readings drive reacquisition and produce a diff that is rotated into
//!    the earth frame and reported through the throttle.
//!
//! # State machine
//!
//! ```text
//!          start()                  window complete
//!  Idle ────────────▶ Calibrating ──────────────────▶ Measuring
//!   ▲                     │                               │
//!   └──────── stop() ─────┴─────────── stop() ────────────┘
//! ```
//!
//! `start()` on a running engine stops it first. Only real changes of state
//! are notified.
//!
//! The engine is a plain single-threaded object: `on_sample` runs to
//! completion and never blocks. Hosts delivering samples from several
//! threads wrap it in [`crate::shared::SharedEngine`].

use crate::calibration::{CalibrationStatus, Calibrator, GravityEstimate};
use crate::capture::{CaptureWriter, GravityChangeGate};
use crate::config::{ConfigError, EngineConfig};
use crate::frame::rotate_to_earth;
use crate::orientation::{GyroStep, OrientationTracker};
use crate::reporter::{Clock, MonotonicClock, ProgressCounter, ReportThrottle};
use crate::sensors::SensorHost;
use crate::sink::{NotificationSink, Notifier};
use crate::types::{EngineState, Sample, SensorKind};
use crate::vector::Vector3;

/// Accelerometer/gyroscope fusion engine producing earth-frame diffs.
pub struct SamplingEngine {
    config: EngineConfig,

    // Collaborators
    sensors: Box<dyn SensorHost>,
    notifier: Notifier,
    clock: Box<dyn Clock>,
    capture: Option<CaptureWriter>,

    // Lifecycle
    state: EngineState,
    sampling: bool,
    listening: bool,

    // Processing stages
    progress: ProgressCounter,
    calibrator: Calibrator,
    tracker: OrientationTracker,
    throttle: ReportThrottle,
    capture_gate: GravityChangeGate,
}

impl SamplingEngine {
    /// Creates an idle engine reading wall-clock time from a
    /// [`MonotonicClock`].
    pub fn new(config: EngineConfig, sensors: Box<dyn SensorHost>) -> Result<Self, ConfigError> {
        Self::with_clock(config, sensors, Box::new(MonotonicClock::new()))
    }

    /// Creates an idle engine with an explicit clock for the report throttle.
    pub fn with_clock(
        config: EngineConfig,
        sensors: Box<dyn SensorHost>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            progress: ProgressCounter::new(config.progress_interval),
            calibrator: Calibrator::new(config.calibration_samples, config.band_tolerance),
            tracker: OrientationTracker::new(config.gyro_dead_zone, config.reacquisition_run),
            throttle: ReportThrottle::new(config.diff_interval_ms),
            capture_gate: GravityChangeGate::new(config.capture_gravity_threshold),
            sensors,
            notifier: Notifier::new(),
            clock,
            capture: None,
            state: EngineState::Idle,
            sampling: false,
            listening: false,
            config,
        })
    }

    // ------------------------------------------------------------------
    // Sink management
    // ------------------------------------------------------------------

    /// Attaches the sink receiving state, progress and diff notifications.
    /// Replaces any previous sink.
    pub fn set_sink(&mut self, sink: Box<dyn NotificationSink>) {
        log::debug!("Notification sink attached");
        self.notifier.attach(sink);
    }

    /// Detaches the current sink. Later events are discarded.
    pub fn remove_sink(&mut self) -> Option<Box<dyn NotificationSink>> {
        log::debug!("Notification sink removed");
        self.notifier.detach()
    }

    pub fn has_sink(&self) -> bool {
        self.notifier.is_attached()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Starts a new sampling session and enters `Calibrating`.
    ///
    /// A running session is stopped first. When either sensor is missing
    /// the engine is still marked as sampling but registers no listener,
    /// so it stays inert.
    pub fn start(&mut self) {
        if self.sampling {
            self.stop();
        }

        let accel = self.sensors.find_sensor(SensorKind::Accelerometer);
        let gyro = self.sensors.find_sensor(SensorKind::Gyroscope);

        self.reset_session();

        match (accel, gyro) {
            (Some(accel), Some(gyro)) => {
                log::debug!("Registering listeners for {} and {}", accel.name, gyro.name);
                let registered = self
                    .sensors
                    .register_listener(&accel)
                    .and_then(|_| self.sensors.register_listener(&gyro));
                match registered {
                    Ok(()) => self.listening = true,
                    Err(err) => {
                        log::warn!("{}", err);
                        self.sensors.unregister_listeners();
                    }
                }
            }
            (accel, gyro) => {
                log::warn!(
                    "Sensor(s) missing: accelerometer: {}; gyroscope: {}",
                    accel.map_or("none".to_string(), |s| s.name),
                    gyro.map_or("none".to_string(), |s| s.name),
                );
            }
        }

        self.open_capture();
        self.sampling = true;
    }

    /// Stops the session and returns to `Idle`. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.sampling {
            return;
        }
        if self.listening {
            log::debug!("Unregistering sensor listeners");
            self.sensors.unregister_listeners();
            self.listening = false;
        }
        if let Some(capture) = self.capture.take() {
            capture.close();
        }
        self.sampling = false;
        self.set_state(EngineState::Idle);
    }

    fn reset_session(&mut self) {
        self.progress.reset();
        self.calibrator.reset();
        self.tracker.reset();
        self.throttle.reset();
        self.capture_gate.reset();
        self.set_state(EngineState::Calibrating);
    }

    fn open_capture(&mut self) {
        let Some(path) = self.config.capture_path.as_ref() else {
            return;
        };
        match CaptureWriter::create(path) {
            Ok(writer) => {
                log::debug!("Capturing samples to {}", path.display());
                self.capture = Some(writer);
            }
            Err(err) => log::warn!("Capture disabled: {}", err),
        }
    }

    fn set_state(&mut self, new_state: EngineState) {
        log::debug!(
            "Transitioning from {} to {} at sample counter {}",
            self.state,
            new_state,
            self.progress.count()
        );
        if self.state != new_state {
            self.state = new_state;
            self.notifier.state_changed(new_state);
        }
    }

    // ------------------------------------------------------------------
    // Sample processing
    // ------------------------------------------------------------------

    /// Builds a sample from raw host values and processes it.
    ///
    /// Samples with fewer than three components are discarded without
    /// touching any state.
    pub fn on_raw_sample(&mut self, kind: SensorKind, timestamp_ns: i64, values: &[f32]) {
        match Sample::from_values(kind, timestamp_ns, values) {
            Ok(sample) => self.on_sample(&sample),
            Err(err) => log::debug!("Discarding malformed sample: {}", err),
        }
    }

    /// Processes one sample to completion.
    ///
    /// While Idle a sample is only counted. A started session without
    /// registered listeners (missing sensor) ignores samples entirely.
    pub fn on_sample(&mut self, sample: &Sample) {
        if self.sampling && !self.listening {
            return;
        }

        self.capture_record(sample.timestamp_ns, sample.kind.label(), sample.vector);

        if let Some(count) = self.progress.increment() {
            log::debug!("Sample counter: {}", count);
            self.notifier.sample_progress(count);
        }

        match self.state {
            EngineState::Calibrating => self.process_calibrating(sample),
            EngineState::Measuring => self.process_measuring(sample),
            EngineState::Idle => {}
        }
    }

    fn process_calibrating(&mut self, sample: &Sample) {
        match sample.kind {
            SensorKind::Accelerometer => self.calibrator.accumulate(sample.vector),
            SensorKind::Gyroscope => self.tracker.seed_timestamp(sample.timestamp_ns),
            SensorKind::Unknown => {}
        }

        if let CalibrationStatus::Complete(estimate) = self.calibrator.check(self.progress.count()) {
            self.tracker.set_estimate(estimate);
            self.set_state(EngineState::Measuring);
        }
    }

    fn process_measuring(&mut self, sample: &Sample) {
        match sample.kind {
            SensorKind::Accelerometer => self.process_accel(sample),
            SensorKind::Gyroscope => self.process_gyro(sample),
            SensorKind::Unknown => {}
        }
    }

    fn process_accel(&mut self, sample: &Sample) {
        self.tracker.observe_accel(sample.vector);
        let Some(gravity) = self.tracker.estimate().map(|e| e.vector) else {
            return;
        };

        let diff = sample.vector - gravity;
        let rotated = rotate_to_earth(diff, gravity);

        self.capture_record(sample.timestamp_ns, "vecdiff", diff);
        self.capture_record(sample.timestamp_ns, "rotateddiff", rotated);

        self.send_diff(rotated);
    }

    fn process_gyro(&mut self, sample: &Sample) {
        let step = self.tracker.integrate_gyro(sample.timestamp_ns, sample.vector);
        if step == GyroStep::Seeded || self.capture.is_none() {
            return;
        }
        if let Some(gravity) = self.tracker.estimate().map(|e| e.vector) {
            if self.capture_gate.should_record(gravity) {
                self.capture_record(sample.timestamp_ns, "simul", gravity);
            }
        }
    }

    fn send_diff(&mut self, diff: Vector3) {
        if self.throttle.try_emit(self.clock.now_ms()) {
            log::trace!("sendDiff: {},{},{}", diff.x, diff.y, diff.z);
            self.notifier.diff(diff);
        }
    }

    fn capture_record(&mut self, timestamp_ns: i64, label: &str, v: Vector3) {
        if let Some(capture) = self.capture.as_mut() {
            if !capture.record(timestamp_ns, label, v) {
                self.capture = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True between `start()` and `stop()`, including when sensors are
    /// missing.
    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// True when sensor listeners are registered and samples are processed.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Samples counted since the last `start()`.
    pub fn sample_count(&self) -> u64 {
        self.progress.count()
    }

    /// Current gravity estimate, `None` until calibration completes.
    pub fn gravity(&self) -> Option<GravityEstimate> {
        self.tracker.estimate().copied()
    }

    /// Current calibration window limit in samples.
    pub fn calibration_limit(&self) -> u64 {
        self.calibrator.limit()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for SamplingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SamplingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingEngine")
            .field("state", &self.state)
            .field("sampling", &self.sampling)
            .field("listening", &self.listening)
            .field("sample_count", &self.progress.count())
            .finish()
    }
}

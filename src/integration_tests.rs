//! End-to-end scenarios for the sampling engine.
//!
//! These tests drive a complete engine with realistic interleaved sample
//! streams and check the behavior seen by the notification sink.

use std::f64::consts::FRAC_PI_2;
use std::sync::mpsc;

use crate::capture::read_capture;
use crate::config::EngineConfig;
use crate::engine::SamplingEngine;
use crate::reporter::ManualClock;
use crate::sensors::StaticSensorHost;
use crate::sink::testing::RecordingSink;
use crate::sink::{ChannelSink, Notification};
use crate::types::{EngineState, Sample, SensorKind};
use crate::vector::Vector3;

const MS: i64 = 1_000_000;

/// Helper: engine with a recording sink and a manual clock.
fn build_engine(config: EngineConfig) -> (SamplingEngine, RecordingSink, ManualClock) {
    let clock = ManualClock::new(0);
    let mut engine = SamplingEngine::with_clock(
        config,
        Box::new(StaticSensorHost::complete()),
        Box::new(clock.clone()),
    )
    .unwrap();
    let sink = RecordingSink::default();
    engine.set_sink(Box::new(sink.clone()));
    (engine, sink, clock)
}

fn accel(t: i64, v: Vector3) -> Sample {
    Sample::new(SensorKind::Accelerometer, t, v)
}

fn gyro(t: i64, v: Vector3) -> Sample {
    Sample::new(SensorKind::Gyroscope, t, v)
}

/// Helper: a resting device at 100 Hz, accelerometer and gyroscope
/// interleaved, with small gyro noise inside the dead zone.
fn resting_profile(start_ns: i64, samples: usize, gravity: Vector3) -> Vec<Sample> {
    (0..samples)
        .map(|i| {
            let t = start_ns + (i as i64 / 2) * 10 * MS;
            if i % 2 == 0 {
                accel(t, gravity)
            } else {
                let noise = if i % 4 == 1 { 0.02 } else { -0.02 };
                gyro(t + MS, Vector3::new(noise, -noise, noise))
            }
        })
        .collect()
}

fn feed(engine: &mut SamplingEngine, samples: &[Sample]) {
    for sample in samples {
        engine.on_sample(sample);
    }
}

#[test]
fn test_calibration_over_interleaved_stream() {
    let (mut engine, sink, _) = build_engine(EngineConfig::default());
    engine.start();

    let gravity = Vector3::new(1.0, 2.0, 2.0);
    feed(&mut engine, &resting_profile(0, 3000, gravity));

    assert_eq!(engine.state(), EngineState::Measuring);
    let estimate = engine.gravity().unwrap();
    assert!(estimate.vector.max_axis_delta(&gravity) < 1e-9);
    assert!((estimate.magnitude - 3.0).abs() < 1e-9);
    assert_eq!(sink.states(), vec![EngineState::Calibrating, EngineState::Measuring]);
    assert_eq!(sink.progress(), vec![1000, 2000, 3000]);
}

#[test]
fn test_gyro_noise_does_not_move_gravity() {
    let config = EngineConfig {
        calibration_samples: 200,
        ..EngineConfig::default()
    };
    let (mut engine, _, _) = build_engine(config);
    engine.start();

    let gravity = Vector3::new(0.1, 0.2, 9.7);
    feed(&mut engine, &resting_profile(0, 200, gravity));
    assert_eq!(engine.state(), EngineState::Measuring);
    let calibrated = engine.gravity().unwrap().vector;
    assert!(calibrated.max_axis_delta(&gravity) < 1e-9);

    // Only gyro noise from here on: 0.02 rad/s over 10 ms is far below the
    // dead zone
    for i in 0..500 {
        engine.on_sample(&gyro(2_000 * MS + i * 10 * MS, Vector3::new(0.02, -0.02, 0.02)));
    }
    assert_eq!(engine.gravity().unwrap().vector, calibrated);
}

#[test]
fn test_tilt_tracked_by_gyro_and_reported_in_earth_frame() {
    let config = EngineConfig {
        calibration_samples: 100,
        ..EngineConfig::default()
    };
    let (mut engine, sink, clock) = build_engine(config);
    engine.start();

    let flat = Vector3::new(0.0, 0.0, 9.81);
    for i in 0..100 {
        engine.on_sample(&accel(i * 10 * MS, flat));
    }
    assert_eq!(engine.state(), EngineState::Measuring);

    // Quarter turn about x over one second, sampled at 20 Hz
    let start = 2_000 * MS;
    for step in 0..=20 {
        engine.on_sample(&gyro(start + step * 50 * MS, Vector3::new(FRAC_PI_2, 0.0, 0.0)));
    }
    let tilted = engine.gravity().unwrap().vector;
    assert!(tilted.max_axis_delta(&Vector3::new(0.0, 9.81, 0.0)) < 1e-9, "{:?}", tilted);

    // Push along the device z axis, which is now horizontal
    clock.set_ms(5_000);
    engine.on_sample(&accel(start + 1_100 * MS, Vector3::new(0.0, 9.81, 2.0)));

    let diffs = sink.diffs();
    assert_eq!(diffs.len(), 1);
    let earth = diffs[0];
    let horizontal = (earth.x * earth.x + earth.y * earth.y).sqrt();
    assert!(earth.z.abs() < 1e-6, "vertical component {:?}", earth);
    assert!((horizontal - 2.0).abs() < 1e-6, "horizontal component {:?}", earth);
}

#[test]
fn test_reacquisition_removes_drift() {
    let config = EngineConfig {
        calibration_samples: 10,
        ..EngineConfig::default()
    };
    let (mut engine, sink, clock) = build_engine(config);
    engine.start();

    let flat = Vector3::new(0.0, 0.0, 3.0);
    for i in 0..10 {
        engine.on_sample(&accel(i * 10 * MS, flat));
    }

    // A biased gyro drags the estimate away while the device stays flat
    for step in 0..=5 {
        engine.on_sample(&gyro(1_000 * MS + step * 100 * MS, Vector3::new(1.0, 0.0, 0.0)));
    }
    let drifted = engine.gravity().unwrap().vector;
    assert!(drifted.max_axis_delta(&flat) > 0.5);

    // Four resting samples are not enough
    for i in 0..4 {
        clock.advance_ms(200);
        engine.on_sample(&accel(2_000 * MS + i * 10 * MS, flat));
    }
    assert_eq!(engine.gravity().unwrap().vector, drifted);

    // The fifth snaps the estimate and the reported diff collapses to zero
    clock.advance_ms(200);
    engine.on_sample(&accel(2_040 * MS, flat));
    assert_eq!(engine.gravity().unwrap().vector, flat);
    let last = *sink.diffs().last().unwrap();
    assert!(last.magnitude() < 1e-12, "{:?}", last);
}

#[test]
fn test_interrupted_run_does_not_snap() {
    let config = EngineConfig {
        calibration_samples: 5,
        ..EngineConfig::default()
    };
    let (mut engine, _, _) = build_engine(config);
    engine.start();

    let calibrated = Vector3::new(0.0, 0.25, 2.5);
    for i in 0..5 {
        engine.on_sample(&accel(i, calibrated));
    }

    let resting = Vector3::new(0.0, 0.0, 2.5);
    for i in 0..4 {
        engine.on_sample(&accel(10 + i, resting));
    }
    engine.on_sample(&accel(20, Vector3::new(0.0, 0.0, 6.0)));
    assert_eq!(engine.gravity().unwrap().vector, calibrated);

    for i in 0..5 {
        engine.on_sample(&accel(30 + i, resting));
    }
    assert_eq!(engine.gravity().unwrap().vector, resting);
}

#[test]
fn test_throttle_spacing() {
    let config = EngineConfig {
        calibration_samples: 10,
        ..EngineConfig::default()
    };

    for (gap_ms, expected) in [(30, 1), (150, 2)] {
        let (mut engine, sink, clock) = build_engine(config.clone());
        engine.start();
        for i in 0..10 {
            engine.on_sample(&accel(i * MS, Vector3::new(0.0, 0.0, 9.8)));
        }

        clock.set_ms(1_000);
        engine.on_sample(&accel(20 * MS, Vector3::new(0.3, 0.0, 9.8)));
        clock.advance_ms(gap_ms);
        engine.on_sample(&accel(21 * MS, Vector3::new(0.3, 0.0, 9.8)));

        assert_eq!(sink.diffs().len(), expected, "gap {} ms", gap_ms);
    }
}

#[test]
fn test_restart_resets_session() {
    let config = EngineConfig {
        calibration_samples: 10,
        ..EngineConfig::default()
    };
    let (mut engine, sink, _) = build_engine(config);

    for session in 0..2 {
        engine.start();
        assert!(engine.gravity().is_none());
        assert_eq!(engine.sample_count(), 0);
        for i in 0..10 {
            engine.on_sample(&accel(i * MS, Vector3::new(0.0, 0.0, 9.8)));
        }
        // Clock never moves, yet the first diff of each session is reported
        engine.on_sample(&accel(11 * MS, Vector3::new(0.5, 0.0, 9.8)));
        assert_eq!(sink.diffs().len(), session + 1);
    }

    engine.stop();
    assert_eq!(
        sink.states(),
        vec![
            EngineState::Calibrating,
            EngineState::Measuring,
            EngineState::Idle,
            EngineState::Calibrating,
            EngineState::Measuring,
            EngineState::Idle,
        ]
    );
}

#[test]
fn test_channel_sink_receives_events_in_order() {
    let (tx, rx) = mpsc::channel();
    let clock = ManualClock::new(0);
    let config = EngineConfig {
        calibration_samples: 4,
        progress_interval: 4,
        ..EngineConfig::default()
    };
    let mut engine = SamplingEngine::with_clock(
        config,
        Box::new(StaticSensorHost::complete()),
        Box::new(clock),
    )
    .unwrap();
    engine.set_sink(Box::new(ChannelSink::new(tx)));

    engine.start();
    for i in 0..5 {
        engine.on_sample(&accel(i * MS, Vector3::new(0.0, 0.0, 9.8)));
    }
    engine.stop();

    let events: Vec<Notification> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            Notification::StateChanged {
                state: EngineState::Calibrating
            },
            Notification::SampleProgress { count: 4 },
            Notification::StateChanged {
                state: EngineState::Measuring
            },
            Notification::Diff {
                x: 0.0,
                y: 0.0,
                z: 0.0
            },
            Notification::StateChanged {
                state: EngineState::Idle
            },
        ]
    );
}

#[test]
fn test_capture_replay_reproduces_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.csv");
    let config = EngineConfig {
        calibration_samples: 200,
        capture_path: Some(path.clone()),
        ..EngineConfig::default()
    };

    let gravity = Vector3::new(0.25, -0.5, 9.75);
    let (mut recorder, _, _) = build_engine(config.clone());
    recorder.start();
    feed(&mut recorder, &resting_profile(0, 300, gravity));
    let recorded = recorder.gravity().unwrap();
    recorder.stop();

    let samples = read_capture(&path).unwrap();
    assert_eq!(samples.len(), 300);

    let replay_config = EngineConfig {
        capture_path: None,
        ..config
    };
    let (mut replayer, _, _) = build_engine(replay_config);
    replayer.start();
    feed(&mut replayer, &samples);
    assert_eq!(replayer.gravity().unwrap(), recorded);
}

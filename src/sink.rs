//! Outbound notifications.
//!
//! The engine produces three kinds of events: state changes, sample
//! progress and earth-frame diffs. They are handed to an optional
//! [`NotificationSink`] supplied by the host (a same-process callback, an
//! IPC channel, a C function table).
//!
//! Delivery is best effort. [`Notifier`] wraps the optional sink and never
//! lets a delivery problem reach the sampling path:
//! - no sink attached: the event is discarded;
//! - [`SinkError::Disconnected`]: logged and the sink is detached;
//! - [`SinkError::Delivery`]: logged and the event dropped, the sink stays.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::EngineState;
use crate::vector::Vector3;

/// Failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The receiving side is gone for good.
    #[error("notification channel disconnected")]
    Disconnected,

    /// A single delivery failed; later ones may succeed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of engine events.
pub trait NotificationSink: Send {
    fn on_state_changed(&mut self, state: EngineState) -> Result<(), SinkError>;

    fn on_sample_progress(&mut self, count: u64) -> Result<(), SinkError>;

    fn on_diff(&mut self, diff: Vector3) -> Result<(), SinkError>;
}

/// An engine event as a value, for sinks that queue or serialize events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    StateChanged { state: EngineState },
    SampleProgress { count: u64 },
    Diff { x: f64, y: f64, z: f64 },
}

/// Sink that forwards every event into an mpsc channel.
///
/// A dropped receiver is reported as [`SinkError::Disconnected`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Notification>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self { sender }
    }

    fn send(&self, notification: Notification) -> Result<(), SinkError> {
        self.sender
            .send(notification)
            .map_err(|_| SinkError::Disconnected)
    }
}

impl NotificationSink for ChannelSink {
    fn on_state_changed(&mut self, state: EngineState) -> Result<(), SinkError> {
        self.send(Notification::StateChanged { state })
    }

    fn on_sample_progress(&mut self, count: u64) -> Result<(), SinkError> {
        self.send(Notification::SampleProgress { count })
    }

    fn on_diff(&mut self, diff: Vector3) -> Result<(), SinkError> {
        self.send(Notification::Diff {
            x: diff.x,
            y: diff.y,
            z: diff.z,
        })
    }
}

/// Best-effort wrapper around an optional sink.
#[derive(Default)]
pub struct Notifier {
    sink: Option<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self { sink: None }
    }

    pub fn attach(&mut self, sink: Box<dyn NotificationSink>) {
        self.sink = Some(sink);
    }

    pub fn detach(&mut self) -> Option<Box<dyn NotificationSink>> {
        self.sink.take()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn state_changed(&mut self, state: EngineState) {
        self.deliver("state change", |sink| sink.on_state_changed(state));
    }

    pub fn sample_progress(&mut self, count: u64) {
        self.deliver("sample progress", |sink| sink.on_sample_progress(count));
    }

    pub fn diff(&mut self, diff: Vector3) {
        self.deliver("diff", |sink| sink.on_diff(diff));
    }

    fn deliver<F>(&mut self, what: &str, send: F)
    where
        F: FnOnce(&mut dyn NotificationSink) -> Result<(), SinkError>,
    {
        let Some(sink) = self.sink.as_mut() else {
            log::debug!("No sink attached, dropping {} notification", what);
            return;
        };
        match send(sink.as_mut()) {
            Ok(()) => {}
            Err(SinkError::Disconnected) => {
                log::error!("Sink disconnected during {} notification, detaching", what);
                self.sink = None;
            }
            Err(err) => {
                log::warn!("Dropping {} notification: {}", what, err);
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &self.is_attached())
            .finish()
    }
}

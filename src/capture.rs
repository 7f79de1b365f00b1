//! Debug capture of raw samples and intermediate vectors.
//!
//! When enabled, the engine writes one CSV line per event:
//!
//! ```text
//! timestamp,label,x,y,z
//! ```
//!
//! | Label | Written for |
//! |-------|-------------|
//! | `accel`, `gyro`, `n/a` | every accepted raw sample |
//! | `vecdiff` | accelerometer reading minus gravity, while measuring |
//! | `rotateddiff` | the same diff in the earth frame |
//! | `simul` | gravity estimate after a gyro step, when it moved enough |
//!
//! Capture is best effort: the first write error disables it and the
//! engine carries on. A capture file can be read back with
//! [`read_capture`] to replay a session through the engine.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{Sample, SensorKind};
use crate::vector::Vector3;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Line-oriented capture sink.
pub struct CaptureWriter {
    out: Box<dyn Write + Send>,
    failed: bool,
}

impl CaptureWriter {
    /// Creates (or truncates) a capture file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| CaptureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            failed: false,
        }
    }

    /// Writes one `timestamp,label,x,y,z` line.
    ///
    /// Returns `false` once the writer has failed; further records are
    /// ignored.
    pub fn record(&mut self, timestamp_ns: i64, label: &str, v: Vector3) -> bool {
        if self.failed {
            return false;
        }
        let result = writeln!(self.out, "{},{},{},{},{}", timestamp_ns, label, v.x, v.y, v.z);
        if let Err(err) = result {
            log::warn!("Capture write failed, disabling capture: {}", err);
            self.failed = true;
        }
        !self.failed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Flushes buffered lines. Errors are logged only.
    pub fn close(mut self) {
        if let Err(err) = self.out.flush() {
            log::warn!("Capture flush failed: {}", err);
        }
    }
}

impl std::fmt::Debug for CaptureWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureWriter")
            .field("failed", &self.failed)
            .finish()
    }
}

/// Decides when the gravity estimate moved enough to be captured again.
#[derive(Debug, Clone)]
pub struct GravityChangeGate {
    threshold: f64,
    last: Option<Vector3>,
}

impl GravityChangeGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns `true` for the first vector and whenever any axis differs
    /// from the last passed vector by more than the threshold.
    pub fn should_record(&mut self, gravity: Vector3) -> bool {
        let changed = match self.last {
            None => true,
            Some(last) => last.max_axis_delta(&gravity) > self.threshold,
        };
        if changed {
            self.last = Some(gravity);
        }
        changed
    }
}

/// Parses raw sensor lines from capture content.
///
/// Lines labelled `accel` or `gyro` become samples; other labels (the
/// intermediate vectors) and blank lines are skipped.
pub fn parse_capture(reader: impl BufRead) -> Result<Vec<Sample>, CaptureError> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|err| CaptureError::Parse {
            line: line_no,
            reason: err.to_string(),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(sample) = parse_line(line, line_no)? {
            samples.push(sample);
        }
    }
    Ok(samples)
}

/// Reads every raw sample from a capture file.
pub fn read_capture(path: impl AsRef<Path>) -> Result<Vec<Sample>, CaptureError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_capture(BufReader::new(file))
}

fn parse_line(line: &str, line_no: usize) -> Result<Option<Sample>, CaptureError> {
    let parse_err = |reason: String| CaptureError::Parse {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(parse_err(format!("expected 5 fields, found {}", fields.len())));
    }

    let Some(kind) = SensorKind::from_label(fields[1]) else {
        return Ok(None);
    };

    let timestamp_ns: i64 = fields[0]
        .parse()
        .map_err(|_| parse_err(format!("invalid timestamp '{}'", fields[0])))?;

    let mut values = [0.0f64; 3];
    for (slot, raw) in values.iter_mut().zip(&fields[2..]) {
        *slot = raw
            .parse()
            .map_err(|_| parse_err(format!("invalid component '{}'", raw)))?;
    }

    Ok(Some(Sample::new(kind, timestamp_ns, Vector3::from(values))))
}

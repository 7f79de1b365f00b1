//! Rotation of linear acceleration into the earth frame.
//!
//! Given the current gravity estimate, a diff vector is turned by the yaw
//! angle of gravity (about Z) and then by its pitch angle (about Y), so the
//! gravity direction ends up on a single axis. The result's z component
//! approximates the vertical acceleration and x/y the horizontal plane,
//! independent of how the device is tilted.

use std::f64::consts::PI;

use crate::vector::Vector3;

/// Quadrant correction applied on top of `atan2(y, x)`.
///
/// The same rule is used for yaw (y, x) and pitch (x, z), with whichever
/// two components are passed in.
pub fn fix_atan_angle(angle: f64, y: f64, x: f64) -> f64 {
    if x < 0.0 && y > 0.0 {
        PI - angle
    } else if x < 0.0 && y < 0.0 {
        PI + angle
    } else {
        angle
    }
}

/// Yaw and pitch of a gravity vector, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAngles {
    /// Rotation about Z (rad).
    pub yaw: f64,
    /// Rotation about Y after the yaw has been removed (rad).
    pub pitch: f64,
}

impl FrameAngles {
    /// Derives both angles from a gravity vector.
    pub fn from_gravity(gravity: Vector3) -> Self {
        let yaw = fix_atan_angle(gravity.y.atan2(gravity.x), gravity.y, gravity.x);
        let aligned = gravity.rotate_z(-yaw);
        let pitch = fix_atan_angle(aligned.x.atan2(aligned.z), aligned.x, aligned.z);
        Self { yaw, pitch }
    }

    /// Applies `-yaw` about Z then `-pitch` about Y.
    pub fn apply(&self, v: Vector3) -> Vector3 {
        v.rotate_z(-self.yaw).rotate_y(-self.pitch)
    }
}

/// Expresses `diff` in the frame aligned with `gravity`.
pub fn rotate_to_earth(diff: Vector3, gravity: Vector3) -> Vector3 {
    FrameAngles::from_gravity(gravity).apply(diff)
}

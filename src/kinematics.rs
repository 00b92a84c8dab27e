//! Differential-drive math for the tank chassis.
//!
//! Everything here is pure: the caller reads track speeds out of the current
//! controls and writes the resulting velocities into the physics body. The
//! drive model assumes infinite lateral traction, so a tick of constant track
//! speeds moves the chassis along a circular arc about the midpoint of the
//! wheel base with zero sideways slip.

use nalgebra::{vector, Rotation2, Vector2};

/// Wheel bases at or below this are rejected at tank construction.
pub const MIN_WHEEL_BASE: f64 = 1e-6;

/// Track speeds after clamping, plus whether the clamp fired.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Drive {
    pub left: f64,
    pub right: f64,
    pub clamped: bool,
}

/// Scales both track speeds by the same factor when either exceeds
/// `max_speed`, preserving their ratio (and thus the turning radius).
pub fn clamp_track_speeds(left: f64, right: f64, max_speed: f64) -> Drive {
    let peak = left.abs().max(right.abs());
    if peak > max_speed {
        let scale = max_speed / peak;
        Drive {
            left: left * scale,
            right: right * scale,
            clamped: true,
        }
    } else {
        Drive {
            left,
            right,
            clamped: false,
        }
    }
}

/// Angular velocity (rad/s) produced by a pair of track speeds. Positive when
/// the left track outruns the right.
pub fn angular_velocity(left: f64, right: f64, wheel_base: f64) -> f64 {
    (left - right) / wheel_base
}

/// Signed forward speed of the chassis midpoint.
pub fn linear_speed(left: f64, right: f64) -> f64 {
    (left + right) / 2.0
}

/// Velocity vector along the pre-update chassis heading.
pub fn velocity(heading: f64, left: f64, right: f64) -> Vector2<f64> {
    Rotation2::new(heading).transform_vector(&vector![linear_speed(left, right), 0.0])
}

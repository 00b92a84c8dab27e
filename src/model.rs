//! Collision shapes for the tank bodies, in body-local coordinates.

use nalgebra::{point, Point2};

pub const CHASSIS_LENGTH: f64 = 25.0;
pub const CHASSIS_WIDTH: f64 = 20.0;

/// Rectangular chassis outline, long axis along +x.
pub fn chassis() -> Vec<Point2<f64>> {
    let hx = CHASSIS_LENGTH / 2.0;
    let hy = CHASSIS_WIDTH / 2.0;
    vec![
        point![-hx, -hy],
        point![hx, -hy],
        point![hx, hy],
        point![-hx, hy],
    ]
}

/// Turret housing with the barrel protruding along +x.
pub fn turret() -> Vec<Point2<f64>> {
    vec![
        point![-6.0, -4.5],
        point![6.0, -4.5],
        point![6.0, -1.0],
        point![24.0, -1.0],
        point![24.0, 1.0],
        point![6.0, 1.0],
        point![6.0, 4.5],
        point![-6.0, 4.5],
    ]
}

/// Radar detection wedge pointing along +x, extruded to `range`. The blunt
/// back edge keeps the polygon convex-hull friendly.
pub fn radar_cone(range: f64, half_angle: f64) -> Vec<Point2<f64>> {
    let (s, c) = half_angle.sin_cos();
    [
        [0.0, -s / 3.0],
        [c, -s],
        [1.0, 0.0],
        [c, s],
        [0.0, s / 3.0],
    ]
    .iter()
    .map(|&[x, y]| point![x * range, y * range])
    .collect()
}

//! The control/sensor exchange types and the per-tick snapshot rebuild.
//!
//! `Controls` is written wholesale by script logic once per tick; `Sensors`
//! is the read-only state it sees, stable for the whole script invocation
//! and rebuilt only after the update phase and physics step have run.

use crate::radar::RadarData;
use crate::simulation::Simulation;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Turret turn rate, rad/s, relative to the chassis.
    pub turn_gun: f64,
    /// Radar turn rate, rad/s, world-absolute.
    pub turn_radar: f64,
    pub left_track_speed: f64,
    pub right_track_speed: f64,
    pub fire_gun: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    /// Signed forward speed of the chassis.
    pub speed: f64,
    /// Chassis heading, normalized to [0, TAU).
    pub direction: f64,
    pub gun_angle: f64,
    pub radar_angle: f64,
    pub energy: f64,
    /// A collision occurred during the prior physics step.
    pub impact: bool,
    pub radar_hits: RadarData,
}

/// Assembles a sensor snapshot from plain values. Kept free of any physics
/// handle so it is testable in isolation.
#[allow(clippy::too_many_arguments)]
pub fn build_sensors(
    left_speed: f64,
    right_speed: f64,
    direction: f64,
    gun_angle: f64,
    radar_angle: f64,
    energy: f64,
    impact: bool,
    radar_hits: RadarData,
) -> Sensors {
    Sensors {
        speed: crate::kinematics::linear_speed(left_speed, right_speed),
        direction,
        gun_angle,
        radar_angle,
        energy,
        impact,
        radar_hits,
    }
}

/// Rebuilds every tank's sensor snapshot for the next control phase.
pub fn tick(sim: &mut Simulation) {
    for handle in sim.tank_handles() {
        let sensors = {
            let tank = sim.tank(handle);
            let data = tank.data();
            build_sensors(
                data.left_speed,
                data.right_speed,
                tank.heading(),
                data.gun_angle,
                data.radar.angle,
                data.energy,
                data.impact,
                data.radar.result.clone(),
            )
        };
        sim.tank_mut(handle).data_mut().channel.set_sensors(sensors);
    }
}

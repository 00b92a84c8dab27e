//! Radar orientation and detection-cone geometry.
//!
//! The radar rotates independently of the chassis: its world-facing angle is
//! the bare `angle` accumulator, never summed with the chassis heading, and
//! it is deliberately left un-normalized so scripts can count full rotations.
//! The detection region is a thin wedge whose half-angle equals half the
//! sweep traversable in one tick at maximum radar speed, which guarantees
//! back-to-back sweeps overlap; it is computed once at construction and only
//! re-posed afterwards.

use crate::model;
use crate::simulation::Simulation;
use crate::tank::TankHandle;
use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

#[derive(Clone, Debug)]
pub struct Radar {
    /// Unbounded accumulator, radians, world-absolute.
    pub angle: f64,
    /// Commanded turn rate from the last update (rad/s).
    pub speed: f64,
    pub range: f64,
    pub max_speed: f64,
    half_angle: f64,
    cone: Vec<Point2<f64>>,
    pub result: RadarData,
}

impl Radar {
    pub fn new(range: f64, max_speed: f64, tick_length: f64) -> Radar {
        let half_angle = max_speed * tick_length / 2.0;
        Radar {
            angle: 0.0,
            speed: 0.0,
            range,
            max_speed,
            half_angle,
            cone: model::radar_cone(range, half_angle),
            result: RadarData::default(),
        }
    }

    /// The fixed wedge polygon in radar-local coordinates.
    pub fn cone(&self) -> &[Point2<f64>] {
        &self.cone
    }

    pub fn half_angle(&self) -> f64 {
        self.half_angle
    }

    /// The cone at its current pose.
    pub fn world_cone(&self, position: Vector2<f64>) -> Vec<Point2<f64>> {
        let transform = Isometry2::new(position, self.angle);
        self.cone.iter().map(|p| transform * p).collect()
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
        self.speed = 0.0;
        self.result = RadarData::default();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarData {
    pub wall: bool,
    pub enemies: Vec<RadarHit>,
    pub allies: Vec<RadarHit>,
    pub bullets: Vec<RadarHit>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarHit {
    pub distance: f64,
    /// Bearing relative to the radar facing, in [-pi, pi].
    pub angle: f64,
    /// Velocity relative to the observing tank.
    pub velocity: Vector2<f64>,
    /// Absent for non-informative targets such as bullets.
    pub energy: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactClass {
    Enemy,
    Ally,
    Bullet,
}

/// A detectable entity in the arena, as seen by the spatial-query layer.
#[derive(Copy, Clone, Debug)]
pub struct Contact {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub class: ContactClass,
    pub energy: Option<f64>,
}

/// The radar beam at its pose for one tick.
#[derive(Copy, Clone, Debug)]
pub struct Beam {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub angle: f64,
    pub half_angle: f64,
    pub range: f64,
}

/// Pluggable detection collaborator: cone pose and range in, classified hit
/// sequences out.
pub trait RadarScanner {
    fn scan(&self, beam: &Beam, cone: &[Point2<f64>], contacts: &[Contact]) -> RadarData;
}

/// Scanner that never detects anything.
pub struct EmptyScanner;

impl RadarScanner for EmptyScanner {
    fn scan(&self, _beam: &Beam, _cone: &[Point2<f64>], _contacts: &[Contact]) -> RadarData {
        RadarData::default()
    }
}

/// Geometric scanner: in-wedge bearing/distance test against each contact,
/// plus an arena-boundary check for the wall flag.
pub struct SweepScanner {
    pub world_size: f64,
}

impl RadarScanner for SweepScanner {
    fn scan(&self, beam: &Beam, cone: &[Point2<f64>], contacts: &[Contact]) -> RadarData {
        let mut result = RadarData::default();

        let transform = Isometry2::new(beam.position, beam.angle);
        let bound = self.world_size / 2.0;
        result.wall = cone.iter().map(|p| transform * p).any(|p| {
            p.x.abs() > bound || p.y.abs() > bound
        });

        for contact in contacts {
            let dp = contact.position - beam.position;
            let distance = dp.magnitude();
            if distance > beam.range || distance < 1e-9 {
                continue;
            }
            let bearing = normalize_bearing(dp.y.atan2(dp.x) - beam.angle);
            if bearing.abs() > beam.half_angle {
                continue;
            }
            let hit = RadarHit {
                distance,
                angle: bearing,
                velocity: contact.velocity - beam.velocity,
                energy: contact.energy,
            };
            match contact.class {
                ContactClass::Enemy => result.enemies.push(hit),
                ContactClass::Ally => result.allies.push(hit),
                ContactClass::Bullet => result.bullets.push(hit),
            }
        }

        result
    }
}

/// Maps an angle difference into [-pi, pi].
pub fn normalize_bearing(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Runs every tank's radar scan against the other tanks in the arena and
/// stores the classified results for the next sensor snapshot.
pub fn tick(sim: &mut Simulation) {
    let handles = sim.tank_handles();

    struct Observer {
        handle: TankHandle,
        team: i32,
        beam: Beam,
    }

    let mut observers = Vec::with_capacity(handles.len());
    let mut contacts = Vec::with_capacity(handles.len());
    for &handle in &handles {
        let tank = sim.tank(handle);
        let data = tank.data();
        observers.push(Observer {
            handle,
            team: data.team,
            beam: Beam {
                position: tank.position(),
                velocity: tank.velocity(),
                angle: data.radar.angle,
                half_angle: data.radar.half_angle(),
                range: data.radar.range,
            },
        });
        contacts.push((
            handle,
            data.team,
            Contact {
                position: tank.position(),
                velocity: tank.velocity(),
                class: ContactClass::Enemy,
                energy: Some(data.energy),
            },
        ));
    }

    for observer in &observers {
        let others: Vec<Contact> = contacts
            .iter()
            .filter(|(handle, _, _)| *handle != observer.handle)
            .map(|&(_, team, contact)| Contact {
                class: if team == observer.team {
                    ContactClass::Ally
                } else {
                    ContactClass::Enemy
                },
                ..contact
            })
            .collect();
        let result = {
            let cone = sim.tank(observer.handle).data().radar.cone().to_vec();
            sim.radar_scanner().scan(&observer.beam, &cone, &others)
        };
        sim.tank_mut(observer.handle).data_mut().radar.result = result;
    }
}

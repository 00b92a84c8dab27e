//! Tank state, construction, and the per-tick update.
//!
//! A tank is a rapier dynamic body (the chassis) plus two position-based
//! kinematic sensor bodies (turret and radar) that track it. All mutable
//! gameplay state lives in `TankData`, reached through accessor structs that
//! borrow the simulation.

use crate::collision;
use crate::kinematics::{self, MIN_WHEEL_BASE};
use crate::model;
use crate::radar::Radar;
use crate::script::{self, Code, ControlChannel};
use crate::simulation::{Simulation, PHYSICS_TICK_LENGTH};
use nalgebra::{Isometry2, Vector2};
use rapier2d_f64::prelude::*;
use std::f64::consts::TAU;

pub type Index = rapier2d_f64::data::Index;

#[derive(Hash, PartialEq, Eq, Copy, Clone, Debug)]
pub struct TankHandle(pub Index);

impl TankHandle {
    pub fn body(&self) -> RigidBodyHandle {
        RigidBodyHandle(self.0)
    }
}

impl From<TankHandle> for u64 {
    fn from(handle: TankHandle) -> u64 {
        let (idx, gen) = handle.0.into_raw_parts();
        ((gen as u64) << 32) | idx as u64
    }
}

// BTreeMap iteration order is the determinism anchor for the tick loop.
impl Ord for TankHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        u64::from(*self).cmp(&u64::from(*other))
    }
}

impl PartialOrd for TankHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct TankData {
    pub team: i32,
    pub wheel_base: f64,
    pub max_speed: f64,
    pub max_gun_speed: f64,
    pub max_radar_speed: f64,
    pub max_energy: f64,
    pub energy: f64,
    pub left_speed: f64,
    pub right_speed: f64,
    /// Turret angle relative to the chassis. Unbounded accumulator.
    pub gun_angle: f64,
    pub gun_speed: f64,
    pub radar: Radar,
    /// Latched fire intent for the outer game layer to consume.
    pub wants_fire: bool,
    pub impact: bool,
    pub delta_t: f64,
    pub channel: ControlChannel,
    pub crash_message: Option<String>,
    pub starting_position: Vector2<f64>,
    pub starting_heading: f64,
    pub turret_body: Option<RigidBodyHandle>,
    pub radar_body: Option<RigidBodyHandle>,
}

impl Default for TankData {
    fn default() -> TankData {
        standard(0)
    }
}

/// The standard tank loadout.
pub fn standard(team: i32) -> TankData {
    TankData {
        team,
        wheel_base: 20.0,
        max_speed: 100.0,
        max_gun_speed: TAU / 4.0,
        max_radar_speed: TAU,
        max_energy: 100.0,
        energy: 100.0,
        left_speed: 0.0,
        right_speed: 0.0,
        gun_angle: 0.0,
        gun_speed: 0.0,
        radar: Radar::new(200.0, TAU, PHYSICS_TICK_LENGTH),
        wants_fire: false,
        impact: false,
        delta_t: PHYSICS_TICK_LENGTH,
        channel: ControlChannel::new(),
        crash_message: None,
        starting_position: Vector2::zeros(),
        starting_heading: 0.0,
        turret_body: None,
        radar_body: None,
    }
}

pub fn create(
    sim: &mut Simulation,
    position: Vector2<f64>,
    heading: f64,
    code: Code,
    mut data: TankData,
) -> TankHandle {
    assert!(data.wheel_base > MIN_WHEEL_BASE);

    let rigid_body = RigidBodyBuilder::dynamic()
        .translation(position)
        .rotation(heading)
        .build();
    let body_handle = sim.bodies.insert(rigid_body);
    let handle = TankHandle(body_handle.0);
    let vertices = model::chassis();
    let collider = ColliderBuilder::convex_hull(&vertices)
        .unwrap()
        .restitution(0.1)
        .collision_groups(collision::tank_interaction_groups())
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
    sim.colliders
        .insert_with_parent(collider, body_handle, &mut sim.bodies);

    let make_sensor = |sim: &mut Simulation, vertices: Vec<_>| {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(position)
            .rotation(heading)
            .build();
        let body_handle = sim.bodies.insert(body);
        let collider = ColliderBuilder::convex_hull(&vertices)
            .unwrap()
            .sensor(true)
            .collision_groups(collision::sensor_interaction_groups())
            .build();
        sim.colliders
            .insert_with_parent(collider, body_handle, &mut sim.bodies);
        body_handle
    };
    data.turret_body = Some(make_sensor(sim, model::turret()));
    data.radar_body = Some(make_sensor(sim, data.radar.cone().to_vec()));

    data.starting_position = position;
    data.starting_heading = heading;
    sim.tank_data.insert(handle, data);

    match script::new_tank_program(&code) {
        Ok(program) => {
            sim.tank_programs.insert(handle, program);
        }
        Err(e) => {
            log::warn!("tank {:?} program creation failed: {}", handle, e.msg);
            sim.tank_mut(handle).data_mut().crash_message = Some(e.msg.clone());
            sim.events.errors.push(e);
        }
    }
    handle
}

pub struct TankAccessor<'a> {
    pub(crate) simulation: &'a Simulation,
    pub(crate) handle: TankHandle,
}

impl<'a> TankAccessor<'a> {
    pub fn body(&self) -> &'a RigidBody {
        self.simulation.bodies.get(self.handle.body()).unwrap()
    }

    pub fn position(&self) -> Vector2<f64> {
        self.body().position().translation.vector
    }

    pub fn velocity(&self) -> Vector2<f64> {
        *self.body().linvel()
    }

    /// Chassis heading normalized into [0, TAU).
    pub fn heading(&self) -> f64 {
        self.body().rotation().angle().rem_euclid(TAU)
    }

    pub fn angular_velocity(&self) -> f64 {
        self.body().angvel()
    }

    pub fn data(&self) -> &'a TankData {
        self.simulation.tank_data.get(&self.handle).unwrap()
    }

    /// Turret facing in world coordinates.
    pub fn turret_angle(&self) -> f64 {
        self.heading() + self.data().gun_angle
    }
}

pub struct TankAccessorMut<'a> {
    pub(crate) simulation: &'a mut Simulation,
    pub(crate) handle: TankHandle,
}

impl<'a: 'b, 'b> TankAccessorMut<'a> {
    pub fn readonly(&self) -> TankAccessor {
        TankAccessor {
            simulation: self.simulation,
            handle: self.handle,
        }
    }

    pub fn body(&'b mut self) -> &'b mut RigidBody {
        self.simulation.bodies.get_mut(self.handle.body()).unwrap()
    }

    pub fn data(&self) -> &TankData {
        self.simulation.tank_data.get(&self.handle).unwrap()
    }

    pub fn data_mut(&mut self) -> &mut TankData {
        self.simulation.tank_data.get_mut(&self.handle).unwrap()
    }

    /// Applies the committed controls for this tick: clamps track speeds,
    /// advances the gun and radar accumulators, and writes the drive
    /// velocities into the chassis body. Runs after the control phase and
    /// before the physics step, so the velocity uses the pre-step heading.
    pub fn update(&mut self) {
        let dt = self.data().delta_t;
        let heading = self.readonly().heading();
        let position = self.readonly().position();
        let controls = self.data().channel.controls().clone();

        let drive = kinematics::clamp_track_speeds(
            controls.left_track_speed,
            controls.right_track_speed,
            self.data().max_speed,
        );
        if drive.clamped {
            log::warn!(
                "tank {:?} track speeds ({}, {}) clamped to ({}, {})",
                self.handle,
                controls.left_track_speed,
                controls.right_track_speed,
                drive.left,
                drive.right
            );
        }

        // Turn rates apply as commanded; only track speeds are clamped.
        let gun_speed = controls.turn_gun;
        let radar_speed = controls.turn_radar;

        {
            let data = self.data_mut();
            data.left_speed = drive.left;
            data.right_speed = drive.right;
            data.gun_speed = gun_speed;
            data.gun_angle += gun_speed * dt;
            data.radar.speed = radar_speed;
            data.radar.angle += radar_speed * dt;
            data.wants_fire = controls.fire_gun;
        }

        let linvel = kinematics::velocity(heading, drive.left, drive.right);
        let angvel = kinematics::angular_velocity(drive.left, drive.right, self.data().wheel_base);
        let body = self.body();
        body.set_linvel(linvel, true);
        body.set_angvel(angvel, true);

        let turret_pose = Isometry2::new(position, heading + self.data().gun_angle);
        let radar_pose = Isometry2::new(position, self.data().radar.angle);
        let turret_body = self.data().turret_body.unwrap();
        let radar_body = self.data().radar_body.unwrap();
        self.simulation
            .bodies
            .get_mut(turret_body)
            .unwrap()
            .set_next_kinematic_position(turret_pose);
        self.simulation
            .bodies
            .get_mut(radar_body)
            .unwrap()
            .set_next_kinematic_position(radar_pose);
    }

    /// Returns the tank to its starting pose and clears every dynamic scalar,
    /// including controls, sensors, and any latched crash.
    pub fn reset(&mut self) {
        let (position, heading, max_energy) = {
            let data = self.data();
            (data.starting_position, data.starting_heading, data.max_energy)
        };
        {
            let body = self.body();
            body.set_position(Isometry2::new(position, heading), true);
            body.set_linvel(Vector2::zeros(), true);
            body.set_angvel(0.0, true);
        }
        let (turret_body, radar_body) = {
            let data = self.data_mut();
            data.energy = max_energy;
            data.left_speed = 0.0;
            data.right_speed = 0.0;
            data.gun_angle = 0.0;
            data.gun_speed = 0.0;
            data.radar.reset();
            data.wants_fire = false;
            data.impact = false;
            data.delta_t = PHYSICS_TICK_LENGTH;
            data.channel.reset();
            data.crash_message = None;
            (data.turret_body.unwrap(), data.radar_body.unwrap())
        };
        self.simulation
            .bodies
            .get_mut(turret_body)
            .unwrap()
            .set_position(Isometry2::new(position, heading), true);
        self.simulation
            .bodies
            .get_mut(radar_body)
            .unwrap()
            .set_position(Isometry2::new(position, 0.0), true);
    }

    pub fn set_energy(&mut self, energy: f64) {
        let max_energy = self.data().max_energy;
        self.data_mut().energy = energy.clamp(0.0, max_energy);
    }
}

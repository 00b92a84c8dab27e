//! The simulation world and tick loop.
//!
//! Tick ordering: the control phase runs every tank's script against the
//! sensor snapshot from the previous tick, then every tank applies its
//! committed controls, then the physics step integrates, collision events are
//! drained into impact flags, and the radar scan and sensor rebuild prepare
//! the next control phase. Tanks are always visited in handle order so that
//! a given seed and code produce an identical run.

use crate::collision;
use crate::radar::{self, RadarScanner, SweepScanner};
use crate::rng::SeededRng;
use crate::script::{self, Code, TankProgram};
use crate::snapshot;
use crate::tank::{self, TankAccessor, TankAccessorMut, TankData, TankHandle};
use crossbeam::channel::Sender;
use nalgebra::Vector2;
use rapier2d_f64::prelude::*;
use std::collections::{BTreeMap, HashMap};

pub const WORLD_SIZE: f64 = 1000.0;
pub const PHYSICS_TICK_LENGTH: f64 = 1.0 / 60.0;

pub struct Simulation {
    pub(crate) tank_data: BTreeMap<TankHandle, TankData>,
    pub(crate) tank_programs: HashMap<TankHandle, Box<dyn TankProgram>>,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    event_collector: CollisionEventHandler,
    contact_recv: crossbeam::channel::Receiver<CollisionEvent>,
    radar_scanner: Box<dyn RadarScanner>,
    pub(crate) events: SimEvents,
    tick: u32,
    seed: u32,
    pub rng: SeededRng,
}

impl Simulation {
    pub fn new(seed: u32) -> Box<Simulation> {
        log::info!("seed {seed}");
        let (contact_send, contact_recv) = crossbeam::channel::unbounded();
        let mut sim = Box::new(Simulation {
            tank_data: BTreeMap::new(),
            tank_programs: HashMap::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            integration_parameters: IntegrationParameters {
                dt: PHYSICS_TICK_LENGTH,
                max_ccd_substeps: 2,
                ..Default::default()
            },
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            event_collector: CollisionEventHandler::new(contact_send),
            contact_recv,
            radar_scanner: Box::new(SweepScanner {
                world_size: WORLD_SIZE,
            }),
            events: SimEvents::new(),
            tick: 0,
            seed,
            rng: crate::rng::new_rng(seed),
        });
        collision::add_walls(&mut sim);
        sim
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.tick as f64 * PHYSICS_TICK_LENGTH
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn world_size(&self) -> f64 {
        WORLD_SIZE
    }

    pub fn add_tank(
        &mut self,
        position: Vector2<f64>,
        heading: f64,
        code: Code,
        data: TankData,
    ) -> TankHandle {
        tank::create(self, position, heading, code, data)
    }

    /// Handles in deterministic iteration order.
    pub fn tank_handles(&self) -> Vec<TankHandle> {
        self.tank_data.keys().cloned().collect()
    }

    pub fn tank(self: &Simulation, handle: TankHandle) -> TankAccessor {
        TankAccessor {
            simulation: self,
            handle,
        }
    }

    pub fn tank_mut(self: &mut Simulation, handle: TankHandle) -> TankAccessorMut {
        TankAccessorMut {
            simulation: self,
            handle,
        }
    }

    pub fn step(self: &mut Simulation) {
        self.events.clear();

        script::tick(self);

        for handle in self.tank_handles() {
            self.tank_mut(handle).update();
        }

        let gravity = vector![0.0, 0.0];
        let physics_hooks = ();
        self.physics_pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &physics_hooks,
            &self.event_collector,
        );

        for data in self.tank_data.values_mut() {
            data.impact = false;
        }
        while let Ok(event) = self.contact_recv.try_recv() {
            if let CollisionEvent::Started(h1, h2, _flags) = event {
                let get_index = |h| self.colliders.get(h).and_then(|x| x.parent()).map(|x| x.0);
                for idx in [get_index(h1), get_index(h2)].into_iter().flatten() {
                    if let Some(data) = self.tank_data.get_mut(&TankHandle(idx)) {
                        data.impact = true;
                    }
                }
            }
        }

        radar::tick(self);
        snapshot::tick(self);

        self.tick += 1;
    }

    /// Replaces a tank's program, clearing any latched crash.
    pub fn upload_code(&mut self, handle: TankHandle, code: &Code) {
        match script::new_tank_program(code) {
            Ok(program) => {
                self.tank_programs.insert(handle, program);
                self.tank_mut(handle).data_mut().crash_message = None;
            }
            Err(e) => {
                log::warn!("tank {:?} program creation failed: {}", handle, e.msg);
                self.tank_mut(handle).data_mut().crash_message = Some(e.msg.clone());
                self.events.errors.push(e);
            }
        }
    }

    pub fn events(&self) -> &SimEvents {
        &self.events
    }

    pub fn radar_scanner(&self) -> &dyn RadarScanner {
        self.radar_scanner.as_ref()
    }

    pub fn set_radar_scanner(&mut self, scanner: Box<dyn RadarScanner>) {
        self.radar_scanner = scanner;
    }

    /// Fixed-point digest of the dynamic state, for replay verification.
    pub fn hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;
        let fixedpoint = |v: f64| (v * 1e9) as i64;
        let mut s = DefaultHasher::new();
        for handle in self.tank_handles() {
            let tank = self.tank(handle);
            s.write_i64(fixedpoint(tank.position().x));
            s.write_i64(fixedpoint(tank.position().y));
            s.write_i64(fixedpoint(tank.heading()));
            s.write_i64(fixedpoint(tank.velocity().x));
            s.write_i64(fixedpoint(tank.velocity().y));
            s.write_i64(fixedpoint(tank.angular_velocity()));
            s.write_i64(fixedpoint(tank.data().energy));
            s.write_i64(fixedpoint(tank.data().gun_angle));
            s.write_i64(fixedpoint(tank.data().radar.angle));
        }
        s.finish()
    }
}

pub struct CollisionEventHandler {
    collision_event_sender: Sender<CollisionEvent>,
}

impl CollisionEventHandler {
    pub fn new(collision_event_sender: Sender<CollisionEvent>) -> CollisionEventHandler {
        CollisionEventHandler {
            collision_event_sender,
        }
    }
}

impl EventHandler for CollisionEventHandler {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&rapier2d_f64::geometry::ContactPair>,
    ) {
        let _ = self.collision_event_sender.send(event);
    }

    fn handle_contact_force_event(
        &self,
        _: f64,
        _: &rapier2d_f64::dynamics::RigidBodySet,
        _: &rapier2d_f64::geometry::ColliderSet,
        _: &ContactPair,
        _: f64,
    ) {
        unimplemented!();
    }
}

pub struct SimEvents {
    pub errors: Vec<script::Error>,
}

impl SimEvents {
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}

impl Default for SimEvents {
    fn default() -> Self {
        SimEvents::new()
    }
}

//! Script programs and the control protocol that connects them to tanks.
//!
//! Each tank owns a `ControlChannel`, the sole exchange point between the
//! simulation and its script: the script reads the sensor snapshot and the
//! controls in effect, and stages a replacement `Controls`. Staged writes are
//! committed only when the invocation returns cleanly, so a faulting script
//! can never leave a tank with torn half-written controls.

pub mod builtin;
pub mod rhai;

use crate::simulation::{Simulation, PHYSICS_TICK_LENGTH};
use crate::snapshot::{Controls, Sensors};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug, Eq, Hash, PartialEq)]
pub enum Code {
    /// No user code; the tank runs the builtin no-op loop.
    None,
    Rhai(String),
    Builtin(String),
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum FaultKind {
    Compile,
    Runtime,
    /// Execution budget exceeded; recoverable, the tank retries next tick.
    Budget,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Error {
    pub kind: FaultKind,
    pub msg: String,
}

/// A compiled script bound to one tank, invoked once per `control()` call.
pub trait TankProgram {
    fn execute(&mut self, channel: &mut ControlChannel) -> Result<(), Error>;
}

pub fn new_tank_program(code: &Code) -> Result<Box<dyn TankProgram>, Error> {
    match code {
        Code::None => Ok(Box::new(rhai::RhaiProgram::new(builtin::DEFAULT)?)),
        Code::Rhai(source) => Ok(Box::new(rhai::RhaiProgram::new(source)?)),
        Code::Builtin(name) => match builtin::load_source(name) {
            Ok(source) => Ok(Box::new(rhai::RhaiProgram::new(source)?)),
            Err(msg) => Err(Error {
                kind: FaultKind::Compile,
                msg,
            }),
        },
    }
}

/// The per-tank read/write contract exposed to script logic.
///
/// `sensors` is the snapshot from the end of the previous tick's update and
/// stays stable for the whole script invocation. `set_controls(None)` is a
/// no-op, leaving the controls in effect unchanged.
#[derive(Clone, Debug)]
pub struct ControlChannel {
    sensors: Sensors,
    controls: Controls,
    staged: Option<Controls>,
    delta_t: f64,
}

impl ControlChannel {
    pub fn new() -> Self {
        Self {
            sensors: Sensors::default(),
            controls: Controls::default(),
            staged: None,
            delta_t: PHYSICS_TICK_LENGTH,
        }
    }

    pub fn sensors(&self) -> &Sensors {
        &self.sensors
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn set_controls(&mut self, controls: Option<Controls>) {
        if controls.is_some() {
            self.staged = controls;
        }
    }

    pub(crate) fn begin_tick(&mut self, delta_t: f64) {
        self.delta_t = delta_t;
        self.staged = None;
    }

    pub(crate) fn commit(&mut self) {
        if let Some(controls) = self.staged.take() {
            self.controls = controls;
        }
    }

    pub(crate) fn discard(&mut self) {
        self.staged = None;
    }

    pub(crate) fn set_sensors(&mut self, sensors: Sensors) {
        self.sensors = sensors;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Control phase: runs every tank's program in deterministic handle order.
/// Faults are isolated to the offending tank; its controls hold their last
/// committed value for the tick.
pub fn tick(sim: &mut Simulation) {
    for handle in sim.tank_handles() {
        let Some(mut program) = sim.tank_programs.remove(&handle) else {
            continue;
        };
        let fault = {
            let data = sim.tank_data.get_mut(&handle).unwrap();
            if data.crash_message.is_some() {
                None
            } else {
                data.delta_t = PHYSICS_TICK_LENGTH;
                data.channel.begin_tick(PHYSICS_TICK_LENGTH);
                match program.execute(&mut data.channel) {
                    Ok(()) => {
                        data.channel.commit();
                        None
                    }
                    Err(e) => {
                        data.channel.discard();
                        Some(e)
                    }
                }
            }
        };
        if let Some(e) = fault {
            log::warn!("tank {:?} script fault: {}", handle, e.msg);
            if e.kind != FaultKind::Budget {
                sim.tank_data.get_mut(&handle).unwrap().crash_message = Some(e.msg.clone());
            }
            sim.events.errors.push(e);
        }
        sim.tank_programs.insert(handle, program);
    }
}

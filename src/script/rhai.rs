//! Rhai-backed tank programs.
//!
//! The capability surface handed to a script is exactly the four control
//! channel operations, passed explicitly as the `api` argument of the
//! script's `tick` function rather than captured as ambient global state.
//! The engine enforces a hard per-invocation operation budget; exceeding it
//! surfaces as a recoverable `FaultKind::Budget`.

use super::{ControlChannel, Error, FaultKind, TankProgram};
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST};

/// Hard execution budget per `control()` invocation.
pub const OPERATION_BUDGET: u64 = 1_000_000;

pub struct RhaiProgram {
    engine: Engine,
    scope: Scope<'static>,
    ast: Option<AST>,
}

pub mod plugin {
    use super::*;
    use crate::radar::{RadarData, RadarHit};
    use crate::snapshot::{Controls, Sensors};
    use rhai::plugin::*;

    pub type Vec2 = nalgebra::Vector2<f64>;

    /// The capability table bound to one tank for one invocation. The raw
    /// pointer is valid exactly for the duration of `execute()`.
    #[derive(Copy, Clone)]
    pub struct Api {
        pub channel: *mut ControlChannel,
    }

    impl Api {
        #[allow(clippy::mut_from_ref)]
        fn channel(&self) -> &mut ControlChannel {
            unsafe { &mut *self.channel }
        }
    }

    #[export_module]
    pub mod channel_module {
        pub fn get_sensors(obj: Api) -> Sensors {
            obj.channel().sensors().clone()
        }

        pub fn get_controls(obj: Api) -> Controls {
            obj.channel().controls().clone()
        }

        pub fn get_delta_t(obj: Api) -> f64 {
            obj.channel().delta_t()
        }

        /// A write of anything that is not a `Controls` value is a no-op.
        pub fn set_controls(obj: Api, value: Dynamic) {
            obj.channel().set_controls(value.try_cast::<Controls>());
        }
    }

    #[export_module]
    pub mod controls_module {
        #[rhai_fn(get = "turn_gun", pure)]
        pub fn get_turn_gun(obj: &mut Controls) -> f64 {
            obj.turn_gun
        }

        #[rhai_fn(set = "turn_gun")]
        pub fn set_turn_gun(obj: &mut Controls, value: f64) {
            obj.turn_gun = value;
        }

        #[rhai_fn(set = "turn_gun")]
        pub fn set_turn_gun_i(obj: &mut Controls, value: i64) {
            obj.turn_gun = value as f64;
        }

        #[rhai_fn(get = "turn_radar", pure)]
        pub fn get_turn_radar(obj: &mut Controls) -> f64 {
            obj.turn_radar
        }

        #[rhai_fn(set = "turn_radar")]
        pub fn set_turn_radar(obj: &mut Controls, value: f64) {
            obj.turn_radar = value;
        }

        #[rhai_fn(set = "turn_radar")]
        pub fn set_turn_radar_i(obj: &mut Controls, value: i64) {
            obj.turn_radar = value as f64;
        }

        #[rhai_fn(get = "left_track_speed", pure)]
        pub fn get_left_track_speed(obj: &mut Controls) -> f64 {
            obj.left_track_speed
        }

        #[rhai_fn(set = "left_track_speed")]
        pub fn set_left_track_speed(obj: &mut Controls, value: f64) {
            obj.left_track_speed = value;
        }

        #[rhai_fn(set = "left_track_speed")]
        pub fn set_left_track_speed_i(obj: &mut Controls, value: i64) {
            obj.left_track_speed = value as f64;
        }

        #[rhai_fn(get = "right_track_speed", pure)]
        pub fn get_right_track_speed(obj: &mut Controls) -> f64 {
            obj.right_track_speed
        }

        #[rhai_fn(set = "right_track_speed")]
        pub fn set_right_track_speed(obj: &mut Controls, value: f64) {
            obj.right_track_speed = value;
        }

        #[rhai_fn(set = "right_track_speed")]
        pub fn set_right_track_speed_i(obj: &mut Controls, value: i64) {
            obj.right_track_speed = value as f64;
        }

        #[rhai_fn(get = "fire_gun", pure)]
        pub fn get_fire_gun(obj: &mut Controls) -> bool {
            obj.fire_gun
        }

        #[rhai_fn(set = "fire_gun")]
        pub fn set_fire_gun(obj: &mut Controls, value: bool) {
            obj.fire_gun = value;
        }
    }

    #[export_module]
    pub mod sensors_module {
        #[rhai_fn(get = "speed", pure)]
        pub fn get_speed(obj: &mut Sensors) -> f64 {
            obj.speed
        }

        #[rhai_fn(get = "direction", pure)]
        pub fn get_direction(obj: &mut Sensors) -> f64 {
            obj.direction
        }

        #[rhai_fn(get = "gun_angle", pure)]
        pub fn get_gun_angle(obj: &mut Sensors) -> f64 {
            obj.gun_angle
        }

        #[rhai_fn(get = "radar_angle", pure)]
        pub fn get_radar_angle(obj: &mut Sensors) -> f64 {
            obj.radar_angle
        }

        #[rhai_fn(get = "energy", pure)]
        pub fn get_energy(obj: &mut Sensors) -> f64 {
            obj.energy
        }

        #[rhai_fn(get = "impact", pure)]
        pub fn get_impact(obj: &mut Sensors) -> bool {
            obj.impact
        }

        #[rhai_fn(get = "radar_hits", pure)]
        pub fn get_radar_hits(obj: &mut Sensors) -> RadarData {
            obj.radar_hits.clone()
        }
    }

    #[export_module]
    pub mod radar_module {
        #[rhai_fn(get = "wall", pure)]
        pub fn get_wall(obj: &mut RadarData) -> bool {
            obj.wall
        }

        #[rhai_fn(get = "enemies", pure)]
        pub fn get_enemies(obj: &mut RadarData) -> rhai::Array {
            obj.enemies.iter().cloned().map(Dynamic::from).collect()
        }

        #[rhai_fn(get = "allies", pure)]
        pub fn get_allies(obj: &mut RadarData) -> rhai::Array {
            obj.allies.iter().cloned().map(Dynamic::from).collect()
        }

        #[rhai_fn(get = "bullets", pure)]
        pub fn get_bullets(obj: &mut RadarData) -> rhai::Array {
            obj.bullets.iter().cloned().map(Dynamic::from).collect()
        }

        #[rhai_fn(get = "distance", pure)]
        pub fn get_distance(obj: &mut RadarHit) -> f64 {
            obj.distance
        }

        #[rhai_fn(get = "angle", pure)]
        pub fn get_angle(obj: &mut RadarHit) -> f64 {
            obj.angle
        }

        #[rhai_fn(get = "velocity", pure)]
        pub fn get_velocity(obj: &mut RadarHit) -> Vec2 {
            obj.velocity
        }

        /// Unit for targets that carry no energy reading.
        #[rhai_fn(get = "energy", pure)]
        pub fn get_hit_energy(obj: &mut RadarHit) -> Dynamic {
            match obj.energy {
                Some(energy) => Dynamic::from(energy),
                None => Dynamic::UNIT,
            }
        }
    }

    #[export_module]
    pub mod vec2_module {
        #[rhai_fn(name = "vec2")]
        pub fn vec2ff(x: f64, y: f64) -> Vec2 {
            Vec2::new(x, y)
        }

        #[rhai_fn(get = "x", pure)]
        pub fn get_x(obj: &mut Vec2) -> f64 {
            obj.x
        }

        #[rhai_fn(get = "y", pure)]
        pub fn get_y(obj: &mut Vec2) -> f64 {
            obj.y
        }

        #[rhai_fn(name = "magnitude")]
        pub fn magnitude(obj: &mut Vec2) -> f64 {
            obj.magnitude()
        }

        #[rhai_fn(name = "to_string")]
        pub fn to_string(obj: &mut Vec2) -> String {
            format!("({:.2}, {:.2})", obj.x, obj.y)
        }
    }
}

impl RhaiProgram {
    pub fn new(source: &str) -> Result<RhaiProgram, Error> {
        use rhai::exported_module;

        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 32);
        engine.set_max_operations(OPERATION_BUDGET);
        engine.on_print(|x| log::info!("script: {x}"));
        engine.on_debug(|x, src, pos| log::info!("script ({}:{:?}): {}", src.unwrap_or(""), pos, x));

        engine.register_global_module(exported_module!(plugin::channel_module).into());
        engine.register_global_module(exported_module!(plugin::controls_module).into());
        engine.register_global_module(exported_module!(plugin::sensors_module).into());
        engine.register_global_module(exported_module!(plugin::radar_module).into());
        engine.register_global_module(exported_module!(plugin::vec2_module).into());

        let mut ast = engine.compile(source).map_err(|e| Error {
            kind: FaultKind::Compile,
            msg: format!("compile error: {e}"),
        })?;

        // Run top-level statements once, then keep only the functions.
        let mut scope = Scope::new();
        engine.run_ast_with_scope(&mut scope, &ast).map_err(|e| Error {
            kind: classify(&e),
            msg: format!("init error: {e}"),
        })?;
        ast.clear_statements();

        Ok(RhaiProgram {
            engine,
            scope,
            ast: Some(ast),
        })
    }
}

impl TankProgram for RhaiProgram {
    fn execute(&mut self, channel: &mut ControlChannel) -> Result<(), Error> {
        let Some(ast) = self.ast.as_ref() else {
            return Ok(());
        };
        let api = plugin::Api { channel };
        self.engine
            .call_fn::<Dynamic>(&mut self.scope, ast, "tick", (api,))
            .map(|_| ())
            .map_err(|e| Error {
                kind: classify(&e),
                msg: format!("script error: {e}"),
            })
    }
}

fn classify(e: &EvalAltResult) -> FaultKind {
    match e {
        EvalAltResult::ErrorTooManyOperations(_) => FaultKind::Budget,
        _ => FaultKind::Runtime,
    }
}

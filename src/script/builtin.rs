//! Builtin script programs, used as defaults and in tests.

/// No-op loop: reads controls and sensors, writes the controls back
/// unchanged. Bound to every tank that has no user code.
pub const DEFAULT: &str = r#"
fn tick(api) {
    let controls = api.get_controls();
    let sensors = api.get_sensors();
    api.set_controls(controls);
}
"#;

/// Spins the radar at full speed and sweeps the turret slowly.
pub const SPINNER: &str = r#"
fn tick(api) {
    let controls = api.get_controls();
    controls.turn_radar = 6.283185307179586;
    controls.turn_gun = 0.7853981633974483;
    api.set_controls(controls);
}
"#;

/// Drives forward and backs off after an impact.
pub const DRIVER: &str = r#"
fn tick(api) {
    let sensors = api.get_sensors();
    let controls = api.get_controls();
    if sensors.impact {
        controls.left_track_speed = -50.0;
        controls.right_track_speed = -50.0;
    } else {
        controls.left_track_speed = 50.0;
        controls.right_track_speed = 50.0;
    }
    api.set_controls(controls);
}
"#;

pub fn load_source(name: &str) -> Result<&'static str, String> {
    match name {
        "default" => Ok(DEFAULT),
        "spinner" => Ok(SPINNER),
        "driver" => Ok(DRIVER),
        _ => Err(format!("unknown builtin program {name:?}")),
    }
}

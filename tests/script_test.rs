use approx::assert_abs_diff_eq;
use nalgebra::vector;
use tankbots_simulator::script::{Code, FaultKind};
use tankbots_simulator::simulation;
use tankbots_simulator::tank;
use test_log::test;

#[test]
fn test_default_program_is_noop() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));

    for _ in 0..60 {
        sim.step();
        assert!(sim.events().errors.is_empty());
    }

    let tank = sim.tank(handle);
    assert_abs_diff_eq!(tank.position().x, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(tank.position().y, 0.0, epsilon = 1e-6);
}

#[test]
fn test_driver_program_moves_tank() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Builtin("driver".to_string()),
        tank::standard(0),
    );

    for _ in 0..60 {
        sim.step();
    }

    assert!(sim.tank(handle).position().x > 40.0);
}

#[test]
fn test_compile_error_reported_at_creation() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai("fn tick(".to_string()),
        tank::standard(0),
    );

    assert_eq!(sim.events().errors.len(), 1);
    assert_eq!(sim.events().errors[0].kind, FaultKind::Compile);
    assert!(sim.tank(handle).data().crash_message.is_some());
}

#[test]
fn test_unknown_builtin_reported() {
    let mut sim = simulation::Simulation::new(0);
    sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Builtin("does_not_exist".to_string()),
        tank::standard(0),
    );

    assert_eq!(sim.events().errors.len(), 1);
    assert_eq!(sim.events().errors[0].kind, FaultKind::Compile);
}

#[test]
fn test_runtime_fault_latches_crash() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    no_such_function();
}
"#
            .to_string(),
        ),
        tank::standard(0),
    );

    sim.step();
    assert_eq!(sim.events().errors.len(), 1);
    assert_eq!(sim.events().errors[0].kind, FaultKind::Runtime);
    assert!(sim.tank(handle).data().crash_message.is_some());

    // Crashed tanks are skipped, not re-run.
    sim.step();
    assert!(sim.events().errors.is_empty());
}

#[test]
fn test_fault_isolated_to_offending_tank() {
    let mut sim = simulation::Simulation::new(0);
    sim.add_tank(
        vector![0.0, 100.0],
        0.0,
        Code::Rhai("fn tick(api) { no_such_function(); }".to_string()),
        tank::standard(0),
    );
    let healthy = sim.add_tank(
        vector![0.0, -100.0],
        0.0,
        Code::Builtin("driver".to_string()),
        tank::standard(1),
    );

    for _ in 0..60 {
        sim.step();
    }

    assert!(sim.tank(healthy).position().x > 40.0);
    assert!(sim.tank(healthy).data().crash_message.is_none());
}

#[test]
fn test_budget_exceeded_is_recoverable() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    loop {}
}
"#
            .to_string(),
        ),
        tank::standard(0),
    );

    sim.step();
    assert_eq!(sim.events().errors.len(), 1);
    assert_eq!(sim.events().errors[0].kind, FaultKind::Budget);
    assert!(sim.tank(handle).data().crash_message.is_none());

    // The program is retried the next tick and faults again.
    sim.step();
    assert_eq!(sim.events().errors.len(), 1);
    assert_eq!(sim.events().errors[0].kind, FaultKind::Budget);
}

#[test]
fn test_faulting_tick_keeps_previous_controls() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    let controls = api.get_controls();
    if controls.left_track_speed > 0.0 {
        // Stage a stop, then die before returning.
        controls.left_track_speed = 0.0;
        controls.right_track_speed = 0.0;
        api.set_controls(controls);
        no_such_function();
    } else {
        controls.left_track_speed = 60.0;
        controls.right_track_speed = 60.0;
        api.set_controls(controls);
    }
}
"#
            .to_string(),
        ),
        tank::standard(0),
    );

    sim.step();
    assert_abs_diff_eq!(sim.tank(handle).data().left_speed, 60.0);

    // Second tick faults; the staged stop is discarded and the tank keeps
    // driving on its last committed controls.
    sim.step();
    assert_eq!(sim.events().errors.len(), 1);
    assert_abs_diff_eq!(sim.tank(handle).data().left_speed, 60.0);
}

#[test]
fn test_invalid_controls_write_ignored() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    api.set_controls(42);
}
"#
            .to_string(),
        ),
        tank::standard(0),
    );

    for _ in 0..10 {
        sim.step();
        assert!(sim.events().errors.is_empty());
    }

    let tank = sim.tank(handle);
    assert_abs_diff_eq!(tank.position().x, 0.0, epsilon = 1e-6);
    assert_eq!(*tank.data().channel.controls(), Default::default());
}

#[test]
fn test_upload_code_clears_crash() {
    let mut sim = simulation::Simulation::new(0);
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai("fn tick(api) { no_such_function(); }".to_string()),
        tank::standard(0),
    );

    sim.step();
    assert!(sim.tank(handle).data().crash_message.is_some());

    sim.upload_code(handle, &Code::Builtin("driver".to_string()));
    assert!(sim.tank(handle).data().crash_message.is_none());

    for _ in 0..60 {
        sim.step();
    }
    assert!(sim.tank(handle).position().x > 40.0);
}

#[test]
fn test_script_reads_sensors() {
    let mut sim = simulation::Simulation::new(0);
    // Turns the radar toward whatever bearing the gun reports, exercising the
    // sensor getters end to end.
    let handle = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    let sensors = api.get_sensors();
    let controls = api.get_controls();
    if sensors.energy > 50.0 && !sensors.impact {
        controls.turn_radar = 1.0;
    }
    let hits = sensors.radar_hits;
    if hits.enemies.len() > 0 {
        controls.turn_radar = hits.enemies[0].angle;
    }
    api.set_controls(controls);
}
"#
            .to_string(),
        ),
        tank::standard(0),
    );

    for _ in 0..10 {
        sim.step();
        assert!(sim.events().errors.is_empty());
    }
    assert!(sim.tank(handle).data().radar.angle > 0.0);
}

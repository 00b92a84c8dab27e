use approx::assert_abs_diff_eq;
use nalgebra::vector;
use std::f64::consts::PI;
use tankbots_simulator::script::Code;
use tankbots_simulator::simulation;
use tankbots_simulator::tank;
use test_log::test;

#[test]
fn test_detects_enemy_ahead() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));
    sim.add_tank(vector![100.0, 0.0], 0.0, Code::None, tank::standard(1));

    sim.step();

    let result = &sim.tank(observer).data().radar.result;
    assert_eq!(result.enemies.len(), 1);
    assert!(result.allies.is_empty());
    let hit = &result.enemies[0];
    assert_abs_diff_eq!(hit.distance, 100.0, epsilon = 1.0);
    assert_abs_diff_eq!(hit.angle, 0.0, epsilon = 0.05);
    assert_eq!(hit.energy, Some(100.0));

    // The same result reaches the sensor snapshot.
    let sensors = sim.tank(observer).data().channel.sensors().clone();
    assert_eq!(sensors.radar_hits, *result);
}

#[test]
fn test_classifies_ally_by_team() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));
    sim.add_tank(vector![100.0, 0.0], 0.0, Code::None, tank::standard(0));

    sim.step();

    let result = &sim.tank(observer).data().radar.result;
    assert!(result.enemies.is_empty());
    assert_eq!(result.allies.len(), 1);
}

#[test]
fn test_out_of_range_not_detected() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));
    sim.add_tank(vector![300.0, 0.0], 0.0, Code::None, tank::standard(1));

    sim.step();

    let result = &sim.tank(observer).data().radar.result;
    assert!(result.enemies.is_empty());
}

#[test]
fn test_target_behind_beam_not_detected() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));
    sim.add_tank(vector![-100.0, 0.0], 0.0, Code::None, tank::standard(1));

    sim.step();

    let result = &sim.tank(observer).data().radar.result;
    assert!(result.enemies.is_empty());
}

#[test]
fn test_full_sweep_finds_target_behind() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(
        vector![0.0, 0.0],
        0.0,
        Code::Builtin("spinner".to_string()),
        tank::standard(0),
    );
    sim.add_tank(vector![-100.0, 0.0], 0.0, Code::None, tank::standard(1));

    // One full radar revolution takes 60 ticks at TAU rad/s.
    let mut seen = false;
    for _ in 0..61 {
        sim.step();
        seen |= !sim.tank(observer).data().radar.result.enemies.is_empty();
    }
    assert!(seen);
}

#[test]
fn test_wall_flag_near_boundary() {
    let mut sim = simulation::Simulation::new(0);
    let facing_wall = sim.add_tank(vector![350.0, 0.0], 0.0, Code::None, tank::standard(0));
    let facing_center = sim.add_tank(vector![350.0, 100.0], 0.0, Code::None, {
        let mut data = tank::standard(0);
        data.radar.angle = PI;
        data
    });

    sim.step();

    assert!(sim.tank(facing_wall).data().radar.result.wall);
    assert!(!sim.tank(facing_center).data().radar.result.wall);
}

#[test]
fn test_relative_velocity_reported() {
    let mut sim = simulation::Simulation::new(0);
    let observer = sim.add_tank(vector![0.0, 0.0], 0.0, Code::None, tank::standard(0));
    sim.add_tank(
        vector![150.0, 0.0],
        0.0,
        Code::Rhai(
            r#"
fn tick(api) {
    let controls = api.get_controls();
    controls.left_track_speed = 80.0;
    controls.right_track_speed = 80.0;
    api.set_controls(controls);
}
"#
            .to_string(),
        ),
        tank::standard(1),
    );

    sim.step();
    sim.step();

    let result = &sim.tank(observer).data().radar.result;
    assert_eq!(result.enemies.len(), 1);
    // Observer is stationary, target recedes along +x at 80.
    assert_abs_diff_eq!(result.enemies[0].velocity.x, 80.0, epsilon = 1.0);
    assert_abs_diff_eq!(result.enemies[0].velocity.y, 0.0, epsilon = 1.0);
}

use crate::simulation::Simulation;
use rapier2d_f64::prelude::*;

const WALL_COLLISION_GROUP: Group = Group::GROUP_1;
const TANK_COLLISION_GROUP: Group = Group::GROUP_2;

pub fn wall_interaction_groups() -> InteractionGroups {
    InteractionGroups::new(WALL_COLLISION_GROUP, TANK_COLLISION_GROUP)
}

pub fn tank_interaction_groups() -> InteractionGroups {
    InteractionGroups::new(
        TANK_COLLISION_GROUP,
        WALL_COLLISION_GROUP | TANK_COLLISION_GROUP,
    )
}

/// Turret and radar sub-bodies track the chassis visually but never collide.
pub fn sensor_interaction_groups() -> InteractionGroups {
    InteractionGroups::none()
}

pub fn add_walls(sim: &mut Simulation) {
    let world_size = sim.world_size();
    let mut make_edge = |x: f64, y: f64, a: f64| {
        let edge_length = world_size;
        let edge_width = 10.0;
        let rigid_body = RigidBodyBuilder::fixed()
            .translation(vector![x, y])
            .rotation(a)
            .build();
        let body_handle = sim.bodies.insert(rigid_body);
        let collider = ColliderBuilder::cuboid(edge_length / 2.0, edge_width / 2.0)
            .restitution(1.0)
            .collision_groups(wall_interaction_groups())
            .build();
        sim.colliders
            .insert_with_parent(collider, body_handle, &mut sim.bodies);
    };
    make_edge(0.0, world_size / 2.0, 0.0);
    make_edge(0.0, -world_size / 2.0, std::f64::consts::PI);
    make_edge(world_size / 2.0, 0.0, std::f64::consts::PI / 2.0);
    make_edge(-world_size / 2.0, 0.0, 3.0 * std::f64::consts::PI / 2.0);
}

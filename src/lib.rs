pub mod collision;
pub mod kinematics;
pub mod model;
pub mod radar;
pub mod rng;
pub mod script;
pub mod simulation;
pub mod snapshot;
pub mod tank;

// Domain module: modeling entities and the engine contract

pub mod engine;
pub mod models;
pub mod value_objects;

pub use engine::*;
pub use models::*;
pub use value_objects::*;

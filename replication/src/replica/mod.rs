pub mod entity_replica;
pub mod error;
pub mod spawn_params;

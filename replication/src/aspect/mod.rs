pub mod content_hash;
pub mod mask;
pub mod profiles;
pub mod serialize_state;

pub mod bridge;
pub mod field_io;

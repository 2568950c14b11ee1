pub mod pool;
pub mod values;

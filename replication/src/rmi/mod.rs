pub mod dispatch;
pub mod error;
pub mod invocation;
pub mod payload;
pub mod queue;
pub mod registry;
pub mod target;

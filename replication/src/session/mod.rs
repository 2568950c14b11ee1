pub mod deferred;
pub mod envelope;
pub mod error;
pub mod network_session;
pub mod pump_lock;
pub mod stats;

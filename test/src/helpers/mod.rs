pub mod packet_exchange;
pub mod peer;

pub use packet_exchange::{connect, exchange, exchange_n_times};
pub use peer::Peer;

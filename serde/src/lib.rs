//! # Replink Serde
//! Byte-oriented wire buffers and the `Serde` trait shared by the replink
//! replication crates. All multi-byte integers are little-endian on the wire.

mod error;
mod impls;
mod integer;
mod read_buffer;
mod serde;
mod write_buffer;

pub use error::SerdeErr;
pub use integer::VarU32;
pub use read_buffer::ReadBuffer;
pub use serde::Serde;
pub use write_buffer::WriteBuffer;

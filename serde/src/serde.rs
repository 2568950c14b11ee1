use crate::{error::SerdeErr, read_buffer::ReadBuffer, write_buffer::WriteBuffer};

/// A trait for values with a defined wire encoding.
pub trait Serde: Sized + Clone + PartialEq {
    /// Serialize Self into a WriteBuffer
    fn ser(&self, writer: &mut WriteBuffer);

    /// Parse Self from a ReadBuffer
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr>;
}

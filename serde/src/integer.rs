use crate::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

/// A u32 encoded as a VLQ: seven value bits per byte, high bit as the
/// continuation flag, least-significant group first. Small values (aspect
/// masks with few bits set, low entity ids) cost one byte instead of four.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct VarU32(u32);

impl VarU32 {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for VarU32 {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Serde for VarU32 {
    fn ser(&self, writer: &mut WriteBuffer) {
        let mut value = self.0;
        loop {
            let group = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                writer.write_u8(group);
                return;
            }
            writer.write_u8(group | 0x80);
        }
    }

    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        let mut value: u32 = 0;
        let mut shift: u32 = 0;
        loop {
            // 5 groups of 7 bits already cover 35 bits
            if shift >= 35 {
                return Err(SerdeErr::VarIntOverflow);
            }
            let byte = reader.read_u8()?;
            let group = u32::from(byte & 0x7F);
            if shift == 28 && group > 0x0F {
                return Err(SerdeErr::VarIntOverflow);
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(Self(value));
            }
            shift += 7;
        }
    }
}

// ReadBuffer

use crate::SerdeErr;

/// A cursor over a borrowed byte slice with little-endian read helpers.
/// Every read is bounds-checked; running past the end is a [`SerdeErr`],
/// never a panic, because the bytes come off the wire.
pub struct ReadBuffer<'b> {
    bytes: &'b [u8],
    cursor: usize,
}

impl<'b> ReadBuffer<'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, SerdeErr> {
        let slice = self.take(1)?;
        Ok(slice[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, SerdeErr> {
        let slice = self.take(2)?;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, SerdeErr> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, SerdeErr> {
        let slice = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(slice);
        Ok(u64::from_le_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, SerdeErr> {
        let slice = self.take(4)?;
        Ok(f32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    /// Borrows the next `count` bytes without copying.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'b [u8], SerdeErr> {
        self.take(count)
    }

    /// Advances past `count` bytes, discarding them.
    pub fn skip(&mut self, count: usize) -> Result<(), SerdeErr> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'b [u8], SerdeErr> {
        if self.remaining() < count {
            return Err(SerdeErr::UnexpectedEnd);
        }
        let slice = &self.bytes[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }
}

use replink_serde::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

use crate::{constants::ASPECT_COUNT, types::AspectIndex};

/// Fixed-width bitmask over the aspect slots of one entity. Bit `i` stands
/// for aspect index `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AspectMask(u32);

impl AspectMask {
    pub const EMPTY: AspectMask = AspectMask(0);
    pub const ALL: AspectMask = AspectMask((1 << ASPECT_COUNT) - 1);

    pub fn new() -> AspectMask {
        AspectMask(0)
    }

    /// Builds a mask from raw bits. Bits beyond the aspect range are dropped.
    pub fn from_bits(bits: u32) -> AspectMask {
        AspectMask(bits & Self::ALL.0)
    }

    pub fn single(index: AspectIndex) -> AspectMask {
        let mut mask = AspectMask(0);
        mask.set_bit(index, true);
        mask
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Gets the bit at the specified aspect index. Out-of-range indices read
    /// as unset.
    pub fn bit(&self, index: AspectIndex) -> bool {
        if (index as usize) >= ASPECT_COUNT {
            return false;
        }
        self.0 & (1 << index) != 0
    }

    /// Sets the bit at the specified aspect index. Out-of-range indices are
    /// ignored.
    pub fn set_bit(&mut self, index: AspectIndex, value: bool) {
        if (index as usize) >= ASPECT_COUNT {
            return;
        }
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn or(&mut self, other: AspectMask) {
        self.0 |= other.0;
    }

    /// Clears every bit that is set in `other`.
    pub fn nand(&mut self, other: AspectMask) {
        self.0 &= !other.0;
    }

    pub fn and(&self, other: AspectMask) -> AspectMask {
        AspectMask(self.0 & other.0)
    }

    /// Returns whether every bit of `other` is also set in `self`.
    pub fn contains(&self, other: AspectMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Iterates the set aspect indices in ascending order.
    pub fn iter(&self) -> AspectMaskIter {
        AspectMaskIter { remaining: self.0 }
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }
}

pub struct AspectMaskIter {
    remaining: u32,
}

impl Iterator for AspectMaskIter {
    type Item = AspectIndex;

    fn next(&mut self) -> Option<AspectIndex> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.remaining.trailing_zeros() as AspectIndex;
        self.remaining &= self.remaining - 1;
        Some(index)
    }
}

impl Serde for AspectMask {
    fn ser(&self, writer: &mut WriteBuffer) {
        VarU32::new(self.0).ser(writer);
    }

    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        let bits = VarU32::de(reader)?.get();
        if bits & !Self::ALL.0 != 0 {
            return Err(SerdeErr::InvalidValue);
        }
        Ok(AspectMask(bits))
    }
}

use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

use crate::{
    aspect::mask::AspectMask,
    constants::{ASPECT_COUNT, UNSET_ASPECT_PROFILE},
    types::AspectIndex,
};

/// Sparse table mapping aspect index to a small "profile" value selecting
/// among serialization variants. Bit `i` of the mask is set iff slot `i`
/// holds something other than [`UNSET_ASPECT_PROFILE`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityAspectProfiles {
    mask: AspectMask,
    profiles: [u8; ASPECT_COUNT],
}

impl EntityAspectProfiles {
    pub fn new() -> EntityAspectProfiles {
        EntityAspectProfiles {
            mask: AspectMask::EMPTY,
            profiles: [UNSET_ASPECT_PROFILE; ASPECT_COUNT],
        }
    }

    pub fn profiles_mask(&self) -> AspectMask {
        self.mask
    }

    /// The profile for one aspect, [`UNSET_ASPECT_PROFILE`] when none is set.
    pub fn aspect_profile(&self, index: AspectIndex) -> u8 {
        if (index as usize) >= ASPECT_COUNT {
            return UNSET_ASPECT_PROFILE;
        }
        self.profiles[index as usize]
    }

    /// Sets one slot and keeps the mask bit in step. Returns whether the
    /// stored value changed.
    ///
    /// An out-of-range index is a programmer error: fatal in debug builds,
    /// ignored with a warning in release.
    pub fn set_aspect_profile(&mut self, index: AspectIndex, profile: u8) -> bool {
        if (index as usize) >= ASPECT_COUNT {
            cfg_if! {
                if #[cfg(debug_assertions)] {
                    panic!("aspect index {} is out of range", index);
                } else {
                    log::warn!("aspect index {} is out of range, profile not set", index);
                    return false;
                }
            }
        }
        let old = self.profiles[index as usize];
        self.profiles[index as usize] = profile;
        self.mask.set_bit(index, profile != UNSET_ASPECT_PROFILE);
        old != profile
    }

    /// Writes `[mask: varint-u32][profile byte per set bit, ascending]`.
    pub fn marshal(&self, writer: &mut WriteBuffer) {
        self.mask.ser(writer);
        for index in self.mask.iter() {
            writer.write_u8(self.profiles[index as usize]);
        }
    }

    /// Reads the wire image produced by `marshal`. `delegate` fires once for
    /// every index whose value differs pre/post, including slots whose bit
    /// dropped and therefore reset to unset.
    pub fn unmarshal<F>(&mut self, reader: &mut ReadBuffer, delegate: &mut F) -> Result<(), SerdeErr>
    where
        F: FnMut(AspectIndex, u8, u8),
    {
        let mask = AspectMask::de(reader)?;

        let mut incoming = [UNSET_ASPECT_PROFILE; ASPECT_COUNT];
        for index in mask.iter() {
            incoming[index as usize] = reader.read_u8()?;
        }

        for index in 0..ASPECT_COUNT {
            let old = self.profiles[index];
            let new = incoming[index];
            if old != new {
                self.profiles[index] = new;
                delegate(index as AspectIndex, old, new);
            }
        }
        self.mask = mask;
        Ok(())
    }
}

impl Default for EntityAspectProfiles {
    fn default() -> Self {
        EntityAspectProfiles::new()
    }
}

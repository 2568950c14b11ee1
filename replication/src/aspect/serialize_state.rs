use replink_serde::{ReadBuffer, SerdeErr, WriteBuffer};

use crate::constants::ASPECT_INLINE_CAPACITY;

/// Backing storage for one aspect's serialized bytes. Small payloads live
/// inline; larger ones spill to the heap. A state created hash-only starts
/// `Unallocated` and gains storage on the first authored write.
#[derive(Clone, Debug)]
pub enum AspectBuffer {
    Unallocated,
    Inline([u8; ASPECT_INLINE_CAPACITY]),
    Heap(Vec<u8>),
}

impl AspectBuffer {
    pub fn capacity(&self) -> usize {
        match self {
            AspectBuffer::Unallocated => 0,
            AspectBuffer::Inline(_) => ASPECT_INLINE_CAPACITY,
            AspectBuffer::Heap(bytes) => bytes.len(),
        }
    }

    pub fn is_allocated(&self) -> bool {
        !matches!(self, AspectBuffer::Unallocated)
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            AspectBuffer::Unallocated => &[],
            AspectBuffer::Inline(bytes) => bytes,
            AspectBuffer::Heap(bytes) => bytes,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            AspectBuffer::Unallocated => &mut [],
            AspectBuffer::Inline(bytes) => bytes,
            AspectBuffer::Heap(bytes) => bytes,
        }
    }

    /// Ensures at least `needed` bytes of storage, preserving current content.
    fn grow_to(&mut self, needed: usize) {
        if needed <= self.capacity() {
            return;
        }
        match self {
            AspectBuffer::Unallocated => {
                if needed <= ASPECT_INLINE_CAPACITY {
                    *self = AspectBuffer::Inline([0; ASPECT_INLINE_CAPACITY]);
                } else {
                    *self = AspectBuffer::Heap(vec![0; needed]);
                }
            }
            AspectBuffer::Inline(bytes) => {
                let mut heap = vec![0; needed];
                heap[..ASPECT_INLINE_CAPACITY].copy_from_slice(bytes);
                *self = AspectBuffer::Heap(heap);
            }
            AspectBuffer::Heap(bytes) => {
                bytes.resize(needed, 0);
            }
        }
    }
}

/// Per-aspect versioned buffer: the current serialized bytes of one aspect,
/// a content hash over them, and a wrapping version token that increments
/// exactly when the hash changes.
///
/// Two states compare equal when hash and token match; the raw bytes are not
/// part of the identity. A matching hash means "do not resend".
#[derive(Clone, Debug)]
pub struct AspectSerializeState {
    hash: u32,
    written_size: u16,
    version: u8,
    buffer: AspectBuffer,
}

impl AspectSerializeState {
    /// Fresh state with no backing storage. Storage is allocated by the
    /// first authored write.
    pub fn new() -> AspectSerializeState {
        AspectSerializeState {
            hash: 0,
            written_size: 0,
            version: 0,
            buffer: AspectBuffer::Unallocated,
        }
    }

    /// Fresh state with inline storage already armed, for slots that will be
    /// written by the wire rather than by local game code.
    pub fn allocated() -> AspectSerializeState {
        AspectSerializeState {
            hash: 0,
            written_size: 0,
            version: 0,
            buffer: AspectBuffer::Inline([0; ASPECT_INLINE_CAPACITY]),
        }
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn written_size(&self) -> u16 {
        self.written_size
    }

    /// Whether any backing storage exists yet.
    pub fn is_allocated(&self) -> bool {
        self.buffer.is_allocated()
    }

    /// The currently written payload bytes.
    pub fn payload(&self) -> &[u8] {
        let len = (self.written_size as usize).min(self.buffer.capacity());
        &self.buffer.as_slice()[..len]
    }

    /// The sole gate for "this aspect needs a resend": stores the new hash
    /// and size and bumps the version token iff the hash differs from the
    /// stored one. Token overflow wraps; that is defined behavior.
    pub fn update_hash(&mut self, new_hash: u32, new_size: u16) -> bool {
        if new_hash == self.hash {
            return false;
        }
        self.version = self.version.wrapping_add(1);
        self.hash = new_hash;
        self.written_size = new_size;
        true
    }

    /// Copies a freshly serialized payload into the backing buffer, growing
    /// it as needed. Does not touch hash or token; pair with `update_hash`.
    ///
    /// # Panics
    ///
    /// Panics if the payload exceeds the 16-bit wire size field.
    pub fn write_payload(&mut self, bytes: &[u8]) {
        assert!(
            bytes.len() <= u16::MAX as usize,
            "aspect payload is {} bytes, wire limit is {}",
            bytes.len(),
            u16::MAX
        );
        self.buffer.grow_to(bytes.len());
        self.buffer.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
    }

    /// Writes `[version: u8][size: u16][bytes iff size > 0]`.
    pub fn marshal(&self, writer: &mut WriteBuffer) {
        debug_assert!(
            self.written_size as usize <= self.buffer.capacity(),
            "aspect declares {} bytes but storage holds {}",
            self.written_size,
            self.buffer.capacity()
        );
        let len = (self.written_size as usize).min(self.buffer.capacity());
        writer.write_u8(self.version);
        writer.write_u16(len as u16);
        if len > 0 {
            writer.write_bytes(&self.buffer.as_slice()[..len]);
        }
    }

    /// Reads the wire image produced by `marshal`, growing storage to fit
    /// the declared size. Returns whether the stored version token changed.
    ///
    /// A non-zero declared size arriving at a state with no backing storage
    /// is a protocol desync: the peers disagree about which aspects carry
    /// data. Fatal in debug builds; in release the bytes are skipped.
    pub fn unmarshal(&mut self, reader: &mut ReadBuffer) -> Result<bool, SerdeErr> {
        let version = reader.read_u8()?;
        let declared = reader.read_u16()?;
        let changed = version != self.version;

        if declared > 0 && !self.buffer.is_allocated() {
            cfg_if! {
                if #[cfg(debug_assertions)] {
                    panic!(
                        "aspect declares {} bytes but the state has no backing storage",
                        declared
                    );
                } else {
                    log::warn!(
                        "aspect declares {} bytes but the state has no backing storage, skipping",
                        declared
                    );
                    reader.skip(declared as usize)?;
                    self.version = version;
                    self.written_size = 0;
                    return Ok(changed);
                }
            }
        }

        if declared as usize > self.buffer.capacity() {
            self.buffer.grow_to(declared as usize);
        }
        if declared > 0 {
            let bytes = reader.read_bytes(declared as usize)?;
            self.buffer.as_mut_slice()[..declared as usize].copy_from_slice(bytes);
        }
        self.version = version;
        self.written_size = declared;
        Ok(changed)
    }
}

impl Default for AspectSerializeState {
    fn default() -> Self {
        AspectSerializeState::new()
    }
}

impl PartialEq for AspectSerializeState {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.version == other.version
    }
}

impl Eq for AspectSerializeState {}

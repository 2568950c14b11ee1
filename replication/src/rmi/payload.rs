use crate::constants::RMI_PAYLOAD_INLINE_CAPACITY;

/// Parameter bytes of one RMI invocation. Payloads up to
/// [`RMI_PAYLOAD_INLINE_CAPACITY`] bytes are stored inline.
#[derive(Clone, Debug)]
pub enum RmiPayload {
    Inline {
        data: [u8; RMI_PAYLOAD_INLINE_CAPACITY],
        len: u16,
    },
    Heap(Vec<u8>),
}

impl RmiPayload {
    pub fn empty() -> RmiPayload {
        RmiPayload::Inline {
            data: [0; RMI_PAYLOAD_INLINE_CAPACITY],
            len: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> RmiPayload {
        if bytes.len() <= RMI_PAYLOAD_INLINE_CAPACITY {
            let mut data = [0; RMI_PAYLOAD_INLINE_CAPACITY];
            data[..bytes.len()].copy_from_slice(bytes);
            RmiPayload::Inline {
                data,
                len: bytes.len() as u16,
            }
        } else {
            RmiPayload::Heap(bytes.to_vec())
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            RmiPayload::Inline { data, len } => &data[..*len as usize],
            RmiPayload::Heap(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RmiPayload::Inline { len, .. } => *len as usize,
            RmiPayload::Heap(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for RmiPayload {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for RmiPayload {}

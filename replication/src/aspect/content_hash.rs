//! Content hashing for aspect change detection.
//!
//! FNV-1a over the serialized aspect bytes. A matching hash is treated as
//! "data did not change" for resend gating, so collisions suppress a resend;
//! the payloads here are short and re-hashed every commit, which keeps that
//! risk acceptable for this layer.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// Hashes the serialized bytes of one aspect.
pub fn content_hash(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

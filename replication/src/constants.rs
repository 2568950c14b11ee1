/// Number of independently-synchronized aspect slots per entity.
pub const ASPECT_COUNT: usize = 26;

/// Sentinel profile value meaning "no profile override for this aspect".
pub const UNSET_ASPECT_PROFILE: u8 = 0xFF;

/// Aspect payloads at or below this size are stored inline, without a heap
/// allocation.
pub const ASPECT_INLINE_CAPACITY: usize = 64;

/// RMI parameter payloads at or below this size are stored inline.
pub const RMI_PAYLOAD_INLINE_CAPACITY: usize = 128;

/// Hard cap on actor RMI parameter payloads. Exceeding it is a programmer
/// error, not a recoverable condition.
pub const MAX_ACTOR_RMI_PARAMS: usize = 32 * 1024;

/// Hard cap on script RMI data payloads.
pub const MAX_SCRIPT_RMI_DATA: usize = 1024;

/// Number of wire-level slots available for named script serializers.
pub const SCRIPT_SERIALIZER_POOL_SIZE: usize = 32;

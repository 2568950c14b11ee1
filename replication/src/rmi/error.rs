use thiserror::Error;

/// Errors raised by RMI target validation, payload bounds, and the actor-rep
/// registry. All of these are programmer errors at the call site, never
/// network-induced conditions; the panicking API surfaces them as fatal
/// assertions and the `try_` variants return these values instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RmiError {
    /// Client-direction flags and TO_SERVER are mutually exclusive.
    #[error("target selector {selector:#06x} mixes client-direction flags with TO_SERVER")]
    ConflictingDirection { selector: u16 },

    /// At most one client-direction flag may be set per invocation.
    #[error("target selector {selector:#06x} sets more than one client-direction flag")]
    MultipleClientTargets { selector: u16 },

    /// The selector requires a channel filter but none was supplied.
    #[error("target selector {selector:#06x} requires a valid channel filter")]
    MissingChannelFilter { selector: u16 },

    /// Actor RMI parameters ran past the fixed serialization buffer.
    #[error("actor RMI params are {size} bytes, limit is {limit}")]
    ParamsTooLarge { size: usize, limit: usize },

    /// Script RMI data ran past the fixed serialization buffer.
    #[error("script RMI data is {size} bytes, limit is {limit}")]
    ScriptDataTooLarge { size: usize, limit: usize },

    /// A rep is already registered under this id.
    #[error("rep id {rep_id} is already registered")]
    RepAlreadyRegistered { rep_id: u32 },

    /// No rep is registered under this id.
    #[error("rep id {rep_id} is not registered")]
    RepNotRegistered { rep_id: u32 },

    /// Rep id zero is the "unregistered" sentinel and cannot be claimed.
    #[error("rep id zero is reserved for unregistered reps")]
    ZeroRepId,
}

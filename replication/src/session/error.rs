use thiserror::Error;

use crate::types::HostRole;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("entity {entity} is already bound to net entity {net_id}")]
    AlreadyBound { entity: u32, net_id: u32 },
    #[error("entity {entity} has no network binding")]
    NotBound { entity: u32 },
    #[error("operation requires the {required:?} role, this session is {actual:?}")]
    WrongRole { required: HostRole, actual: HostRole },
    #[error("the invalid entity id cannot be bound")]
    InvalidEntity,
    #[error("channel {channel} cannot own delegated aspects")]
    InvalidOwner { channel: u32 },
}

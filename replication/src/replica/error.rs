use thiserror::Error;

use crate::replica::entity_replica::ReplicaState;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("net entity {net_id} cannot {operation} while {state:?}")]
    InvalidTransition {
        net_id: u32,
        operation: &'static str,
        state: ReplicaState,
    },
    #[error("aspect index {index} is out of range")]
    AspectIndexOutOfRange { index: u8 },
}

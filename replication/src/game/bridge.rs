//! The seams between the replication layer and the game it synchronizes.
//!
//! The factory and IO halves are deliberately separate objects: identifier
//! resolution holds the factory while aspect deserialization is re-entering
//! game state through the IO half.

use replink_serde::SerdeErr;

use crate::{
    game::field_io::{FieldReader, FieldWriter},
    replica::spawn_params::SpawnParams,
    rmi::invocation::{LegacyRmi, ScriptRmi},
    types::{AspectIndex, EntityId},
};

/// Creates and releases local entities on behalf of the session.
pub trait EntityFactory {
    /// Instantiates the local counterpart of a replicated entity. `None`
    /// means "cannot spawn yet"; the session retries next frame.
    fn spawn_entity(&mut self, params: &SpawnParams) -> Option<EntityId>;

    /// The replica is gone; the game may now destroy the entity.
    fn release_entity(&mut self, entity: EntityId);
}

/// Game-state serialization and in-process RMI handling.
pub trait GameIo {
    /// Serializes one aspect of one entity. Returns false when the entity
    /// does not carry this aspect, leaving the slot untouched.
    fn write_aspect(
        &mut self,
        entity: EntityId,
        aspect: AspectIndex,
        writer: &mut FieldWriter,
    ) -> bool;

    /// Applies one received aspect to local entity state.
    fn read_aspect(
        &mut self,
        entity: EntityId,
        aspect: AspectIndex,
        reader: &mut FieldReader,
    ) -> Result<(), SerdeErr>;

    /// Direct in-process delivery of a legacy RMI. Also used when replaying
    /// pending lists; must not queue.
    fn handle_legacy_rmi(&mut self, entity: EntityId, rmi: &LegacyRmi);

    /// Direct in-process delivery of a script RMI.
    fn handle_script_rmi(&mut self, entity: EntityId, rmi: &ScriptRmi);
}

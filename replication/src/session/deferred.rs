use crate::types::EntityId;

/// Work postponed to the next frame's command step. Commands are plain tagged
/// values, never closures, so they cannot capture state that moves under them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredCommand {
    /// Arm the next gather to upload this entity's client-delegated aspects.
    UploadDelegatedAspects { entity: EntityId },
    /// Tear the entity's replica down from inside the pump.
    DespawnEntity { entity: EntityId },
}

/// Runs-exactly-once, in-enqueue-order command queue, drained once per frame.
#[derive(Default)]
pub struct DeferredQueue {
    commands: Vec<DeferredCommand>,
}

impl DeferredQueue {
    pub fn new() -> DeferredQueue {
        DeferredQueue {
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: DeferredCommand) {
        self.commands.push(command);
    }

    pub fn take_all(&mut self) -> Vec<DeferredCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

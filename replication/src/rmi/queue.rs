use crate::{rmi::invocation::RmiInvocation, types::EntityId};

/// One queue entry: the invocation plus the local entity it addresses.
/// The id stays in local space so offline dispatch never needs a binding.
#[derive(Clone, Debug)]
pub struct QueuedRmi {
    pub entity: EntityId,
    pub invocation: RmiInvocation,
}

/// Single ordered invocation queue, drained once per frame.
///
/// All three invocation kinds share the one queue so cross-kind ordering
/// matches call order exactly.
#[derive(Default)]
pub struct RmiQueue {
    entries: Vec<QueuedRmi>,
}

impl RmiQueue {
    pub fn new() -> RmiQueue {
        RmiQueue {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entity: EntityId, invocation: RmiInvocation) {
        self.entries.push(QueuedRmi { entity, invocation });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every queued entry in insertion order.
    pub fn take_all(&mut self) -> Vec<QueuedRmi> {
        std::mem::take(&mut self.entries)
    }

    /// Drops all pending invocations without dispatching them.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

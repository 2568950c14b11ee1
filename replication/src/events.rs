//! Cross-cutting replication notifications.
//!
//! Observers are injected into the session and fanned out to explicitly,
//! replacing any global publish/subscribe machinery. All callbacks are
//! fire-and-forget; implementations default to no-ops so subscribers only
//! override what they care about.

use crate::{
    aspect::mask::AspectMask,
    types::{AspectIndex, ChannelId, EntityId, NetEntityId},
};

pub trait ReplicaEvents {
    /// A local entity was bound to a network replica.
    fn entity_bound(&mut self, _net_id: NetEntityId, _entity: EntityId) {}

    /// A replica finished establishment and its local entity is live.
    fn entity_established(&mut self, _net_id: NetEntityId, _entity: EntityId) {}

    /// A committed aspect produced a new content hash.
    fn aspect_changed(&mut self, _net_id: NetEntityId, _aspect: AspectIndex) {}

    /// An aspect profile differs from its previous value.
    fn aspect_profile_changed(&mut self, _net_id: NetEntityId, _aspect: AspectIndex, _profile: u8) {
    }

    /// Authority over `aspects` was handed to `owner`.
    fn authority_delegated(&mut self, _net_id: NetEntityId, _owner: ChannelId, _aspects: AspectMask) {
    }

    /// The replica left the session.
    fn replica_deactivated(&mut self, _net_id: NetEntityId) {}
}

/// Owns the subscriber list and forwards each notification to every
/// subscriber in registration order.
#[derive(Default)]
pub struct EventFanout {
    observers: Vec<Box<dyn ReplicaEvents>>,
}

impl EventFanout {
    pub fn new() -> EventFanout {
        EventFanout {
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn ReplicaEvents>) {
        self.observers.push(observer);
    }

    pub fn entity_bound(&mut self, net_id: NetEntityId, entity: EntityId) {
        for observer in &mut self.observers {
            observer.entity_bound(net_id, entity);
        }
    }

    pub fn entity_established(&mut self, net_id: NetEntityId, entity: EntityId) {
        for observer in &mut self.observers {
            observer.entity_established(net_id, entity);
        }
    }

    pub fn aspect_changed(&mut self, net_id: NetEntityId, aspect: AspectIndex) {
        for observer in &mut self.observers {
            observer.aspect_changed(net_id, aspect);
        }
    }

    pub fn aspect_profile_changed(&mut self, net_id: NetEntityId, aspect: AspectIndex, profile: u8) {
        for observer in &mut self.observers {
            observer.aspect_profile_changed(net_id, aspect, profile);
        }
    }

    pub fn authority_delegated(&mut self, net_id: NetEntityId, owner: ChannelId, aspects: AspectMask) {
        for observer in &mut self.observers {
            observer.authority_delegated(net_id, owner, aspects);
        }
    }

    pub fn replica_deactivated(&mut self, net_id: NetEntityId) {
        for observer in &mut self.observers {
            observer.replica_deactivated(net_id);
        }
    }
}

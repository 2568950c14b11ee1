//! The per-entity replicated record.
//!
//! One `EntityReplica` aggregates everything the session synchronizes for a
//! single entity: the versioned aspect buffers, the profile table, dirty and
//! delegation masks, spawn parameters, and the pending-RMI staging lists.
//! Masters live on the server and author state; proxies live on clients and
//! mirror it.

use replink_serde::{ReadBuffer, SerdeErr, WriteBuffer};

use crate::{
    aspect::{
        mask::AspectMask, profiles::EntityAspectProfiles, serialize_state::AspectSerializeState,
    },
    constants::ASPECT_COUNT,
    events::EventFanout,
    replica::{error::ReplicaError, spawn_params::SpawnParams},
    rmi::invocation::{ActorRmi, LegacyRmi},
    types::{AspectIndex, ChannelId, EntityId, NetEntityId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaState {
    Offline,
    Activated,
    MasterEstablished,
    ProxyPendingEstablishment,
    ProxyEstablished,
    Deactivated,
}

pub struct EntityReplica {
    net_id: NetEntityId,
    state: ReplicaState,
    master: bool,
    local_entity: EntityId,
    owner_channel: ChannelId,
    spawn_params: SpawnParams,

    aspects: [AspectSerializeState; ASPECT_COUNT],
    profiles: EntityAspectProfiles,
    profiles_dirty: bool,

    game_dirtied_aspects: AspectMask,
    client_delegated_aspects: AspectMask,
    client_authority: bool,
    delegated_hashes: [u32; ASPECT_COUNT],

    dispatch_mask: AspectMask,
    force_dispatch_mask: AspectMask,
    outbound_aspects: AspectMask,

    newly_received: bool,
    upload_scheduled: bool,
    upload_armed: bool,
    authority_dirty: bool,

    pending_legacy: Vec<LegacyRmi>,
    pending_actor: Vec<ActorRmi>,
}

impl EntityReplica {
    pub fn new(net_id: NetEntityId, spawn_params: SpawnParams) -> EntityReplica {
        EntityReplica {
            net_id,
            state: ReplicaState::Offline,
            master: false,
            local_entity: EntityId::INVALID,
            owner_channel: spawn_params.owner_channel,
            spawn_params,
            aspects: std::array::from_fn(|_| AspectSerializeState::new()),
            profiles: EntityAspectProfiles::new(),
            profiles_dirty: false,
            game_dirtied_aspects: AspectMask::EMPTY,
            client_delegated_aspects: AspectMask::EMPTY,
            client_authority: false,
            delegated_hashes: [0; ASPECT_COUNT],
            dispatch_mask: AspectMask::EMPTY,
            force_dispatch_mask: AspectMask::EMPTY,
            outbound_aspects: AspectMask::EMPTY,
            newly_received: false,
            upload_scheduled: false,
            upload_armed: false,
            authority_dirty: false,
            pending_legacy: Vec::new(),
            pending_actor: Vec::new(),
        }
    }

    pub fn net_id(&self) -> NetEntityId {
        self.net_id
    }

    pub fn state(&self) -> ReplicaState {
        self.state
    }

    pub fn is_master(&self) -> bool {
        self.master
    }

    pub fn is_established(&self) -> bool {
        matches!(
            self.state,
            ReplicaState::MasterEstablished | ReplicaState::ProxyEstablished
        )
    }

    pub fn newly_received(&self) -> bool {
        self.newly_received
    }

    pub fn local_entity(&self) -> EntityId {
        self.local_entity
    }

    pub fn owner_channel(&self) -> ChannelId {
        self.owner_channel
    }

    pub fn spawn_params(&self) -> &SpawnParams {
        &self.spawn_params
    }

    pub fn is_game_rules(&self) -> bool {
        self.spawn_params.is_game_rules()
    }

    // --- lifecycle -------------------------------------------------------

    /// Takes the authoritative role. All aspects begin implicitly dirty so
    /// the first gather produces a full sync.
    ///
    /// # Panics
    ///
    /// Panics unless the replica is `Offline`. Use `try_activate_master` for
    /// the non-panicking form.
    pub fn activate_master(&mut self) {
        if let Err(error) = self.try_activate_master() {
            panic!("{}", error);
        }
    }

    pub fn try_activate_master(&mut self) -> Result<(), ReplicaError> {
        if self.state != ReplicaState::Offline {
            return Err(self.transition_error("activate as master"));
        }
        self.state = ReplicaState::Activated;
        self.master = true;
        self.game_dirtied_aspects = AspectMask::ALL;
        Ok(())
    }

    /// Binds the already-existing local entity to a freshly activated master.
    ///
    /// # Panics
    ///
    /// Panics unless the replica is an `Activated` master. Use
    /// `try_establish_master` for the non-panicking form.
    pub fn establish_master(&mut self, entity: EntityId) {
        if let Err(error) = self.try_establish_master(entity) {
            panic!("{}", error);
        }
    }

    pub fn try_establish_master(&mut self, entity: EntityId) -> Result<(), ReplicaError> {
        if self.state != ReplicaState::Activated || !self.master {
            return Err(self.transition_error("establish as master"));
        }
        self.state = ReplicaState::MasterEstablished;
        self.local_entity = entity;
        Ok(())
    }

    /// Takes the mirrored role on first receipt from the network. Every
    /// aspect's first unmarshal is forced to dispatch downstream even when
    /// its token matches, so game code always sees initial state.
    ///
    /// # Panics
    ///
    /// Panics unless the replica is `Offline`. Use `try_activate_proxy` for
    /// the non-panicking form.
    pub fn activate_proxy(&mut self) {
        if let Err(error) = self.try_activate_proxy() {
            panic!("{}", error);
        }
    }

    pub fn try_activate_proxy(&mut self) -> Result<(), ReplicaError> {
        if self.state != ReplicaState::Offline {
            return Err(self.transition_error("activate as proxy"));
        }
        self.state = ReplicaState::ProxyPendingEstablishment;
        self.master = false;
        self.newly_received = true;
        self.force_dispatch_mask = AspectMask::ALL;
        Ok(())
    }

    /// Binds the freshly spawned local entity and drains the pending-RMI
    /// lists for the caller to replay, legacy first, each in arrival order.
    /// Replay must go through the direct in-process handlers, never back
    /// into the queue.
    ///
    /// # Panics
    ///
    /// Panics unless the replica is pending establishment. Use
    /// `try_establish_proxy` for the non-panicking form.
    pub fn establish_proxy(&mut self, entity: EntityId) -> (Vec<LegacyRmi>, Vec<ActorRmi>) {
        match self.try_establish_proxy(entity) {
            Ok(pending) => pending,
            Err(error) => panic!("{}", error),
        }
    }

    pub fn try_establish_proxy(
        &mut self,
        entity: EntityId,
    ) -> Result<(Vec<LegacyRmi>, Vec<ActorRmi>), ReplicaError> {
        if self.state != ReplicaState::ProxyPendingEstablishment {
            return Err(self.transition_error("establish as proxy"));
        }
        self.state = ReplicaState::ProxyEstablished;
        self.local_entity = entity;
        self.newly_received = false;
        Ok((
            std::mem::take(&mut self.pending_legacy),
            std::mem::take(&mut self.pending_actor),
        ))
    }

    /// Invalidates the local-entity binding and parks the replica in its
    /// terminal state. Destroying the local entity is the caller's job.
    ///
    /// # Panics
    ///
    /// Panics if already deactivated. Use `try_deactivate` for the
    /// non-panicking form.
    pub fn deactivate(&mut self) {
        if let Err(error) = self.try_deactivate() {
            panic!("{}", error);
        }
    }

    pub fn try_deactivate(&mut self) -> Result<(), ReplicaError> {
        if self.state == ReplicaState::Deactivated {
            return Err(self.transition_error("deactivate"));
        }
        self.state = ReplicaState::Deactivated;
        self.local_entity = EntityId::INVALID;
        self.newly_received = false;
        Ok(())
    }

    fn transition_error(&self, operation: &'static str) -> ReplicaError {
        ReplicaError::InvalidTransition {
            net_id: self.net_id.0,
            operation,
            state: self.state,
        }
    }

    // --- aspect data -----------------------------------------------------

    /// Stores freshly serialized aspect bytes and runs the hash gate.
    /// Emits the aspect-changed event only when the hash actually moved;
    /// returns that same flag so the caller can mark the aspect for send.
    pub fn commit_aspect_data(
        &mut self,
        index: AspectIndex,
        bytes: &[u8],
        hash: u32,
        events: &mut EventFanout,
    ) -> bool {
        if !Self::guard_index(index) {
            return false;
        }
        let slot = &mut self.aspects[index as usize];
        slot.write_payload(bytes);
        let changed = slot.update_hash(hash, bytes.len() as u16);
        if changed {
            events.aspect_changed(self.net_id, index);
        }
        changed
    }

    /// Reads one aspect's wire image into its slot. Returns whether the
    /// aspect now needs dispatching to game code: either the version token
    /// moved, or this is the slot's first unmarshal on a fresh proxy.
    pub fn unmarshal_aspect(
        &mut self,
        index: AspectIndex,
        reader: &mut ReadBuffer,
    ) -> Result<bool, SerdeErr> {
        if !Self::guard_index(index) {
            return Ok(false);
        }
        let slot = &mut self.aspects[index as usize];
        if !slot.is_allocated() {
            *slot = AspectSerializeState::allocated();
        }
        let token_changed = slot.unmarshal(reader)?;

        let forced = self.force_dispatch_mask.bit(index);
        self.force_dispatch_mask.set_bit(index, false);

        let pending = token_changed || forced;
        if pending {
            self.dispatch_mask.set_bit(index, true);
        }
        Ok(pending)
    }

    pub fn marshal_aspect(&self, index: AspectIndex, writer: &mut WriteBuffer) {
        if !Self::guard_index(index) {
            return;
        }
        self.aspects[index as usize].marshal(writer);
    }

    pub fn aspect(&self, index: AspectIndex) -> &AspectSerializeState {
        &self.aspects[index as usize]
    }

    /// Whether this slot has ever carried committed or received data.
    /// Late-join full syncs send exactly these slots.
    pub fn has_aspect_data(&self, index: AspectIndex) -> bool {
        let slot = &self.aspects[index as usize];
        slot.version() != 0 || slot.hash() != 0 || slot.is_allocated()
    }

    fn guard_index(index: AspectIndex) -> bool {
        if (index as usize) < ASPECT_COUNT {
            return true;
        }
        cfg_if! {
            if #[cfg(debug_assertions)] {
                panic!("aspect index {} is out of range", index);
            } else {
                log::warn!("aspect index {} is out of range, ignoring", index);
                return false;
            }
        }
    }

    // --- profiles --------------------------------------------------------

    pub fn profiles(&self) -> &EntityAspectProfiles {
        &self.profiles
    }

    pub fn set_aspect_profile(&mut self, index: AspectIndex, profile: u8) {
        if self.profiles.set_aspect_profile(index, profile) {
            self.profiles_dirty = true;
        }
    }

    pub fn take_profiles_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.profiles_dirty, false)
    }

    pub fn marshal_profiles(&self, writer: &mut WriteBuffer) {
        self.profiles.marshal(writer);
    }

    /// Applies a received profile table, firing the profile-changed event
    /// once per slot whose value differs, transitions to unset included.
    pub fn unmarshal_profiles(
        &mut self,
        reader: &mut ReadBuffer,
        events: &mut EventFanout,
    ) -> Result<(), SerdeErr> {
        let net_id = self.net_id;
        self.profiles
            .unmarshal(reader, &mut |index, _previous, current| {
                events.aspect_profile_changed(net_id, index, current);
            })
    }

    // --- dirty tracking & delegation --------------------------------------

    pub fn mark_game_dirty(&mut self, mask: AspectMask) {
        self.game_dirtied_aspects.or(mask);
    }

    pub fn game_dirtied_aspects(&self) -> AspectMask {
        self.game_dirtied_aspects
    }

    /// Cleared only when a delegated upload has gone out; master-side bits
    /// persist and stay hash-gated.
    pub fn clear_game_dirtied(&mut self) {
        self.game_dirtied_aspects.clear();
    }

    pub fn client_delegated_aspects(&self) -> AspectMask {
        self.client_delegated_aspects
    }

    pub fn has_client_authority(&self) -> bool {
        self.client_authority
    }

    /// The aspects this process may author for this entity: requires held
    /// client authority, the global delegatable bit, and the per-entity
    /// delegated bit. All three, not any.
    pub fn locally_delegated_mask(&self, global_delegatable: AspectMask) -> AspectMask {
        if !self.client_authority {
            return AspectMask::EMPTY;
        }
        self.client_delegated_aspects.and(global_delegatable)
    }

    /// Server-side delegation bookkeeping: records the owning channel and
    /// the delegated bits and flags the change for the wire.
    pub fn set_delegation(&mut self, owner: ChannelId, mask: AspectMask) {
        self.owner_channel = owner;
        self.client_delegated_aspects = mask;
        self.authority_dirty = true;
    }

    /// Drops all delegation, e.g. when the owning channel disconnects.
    pub fn clear_delegation(&mut self) {
        self.client_delegated_aspects = AspectMask::EMPTY;
        self.authority_dirty = true;
    }

    /// Client-side receipt of a delegation announcement. Stores the owner
    /// and mask without touching the rebroadcast flag, then grants or
    /// revokes local authority depending on whether this process is the
    /// designated owner. Returns whether authority was gained.
    pub fn receive_delegation(
        &mut self,
        owner: ChannelId,
        mask: AspectMask,
        local_channel: ChannelId,
    ) -> bool {
        self.owner_channel = owner;
        self.client_delegated_aspects = mask;
        if owner == local_channel && !mask.is_empty() {
            self.delegate_authority_to_owner(local_channel)
        } else {
            self.client_authority = false;
            false
        }
    }

    /// Client-side receipt of delegated authority. Effective only on a
    /// non-master replica whose local channel is the designated owner:
    /// zeroes every delegated-hash cache and clears the dirtied mask so the
    /// client starts authoring from a clean slate. Returns whether the
    /// delegation took effect.
    pub fn delegate_authority_to_owner(&mut self, local_channel: ChannelId) -> bool {
        if self.master || self.owner_channel != local_channel {
            return false;
        }
        self.client_authority = true;
        self.delegated_hashes = [0; ASPECT_COUNT];
        self.game_dirtied_aspects.clear();
        true
    }

    /// Client-side withdrawal of authority.
    pub fn revoke_client_authority(&mut self) {
        self.client_authority = false;
    }

    pub fn delegated_hash(&self, index: AspectIndex) -> u32 {
        self.delegated_hashes[index as usize]
    }

    pub fn set_delegated_hash(&mut self, index: AspectIndex, hash: u32) {
        self.delegated_hashes[index as usize] = hash;
    }

    // --- per-frame consumption --------------------------------------------

    pub fn dispatch_mask(&self) -> AspectMask {
        self.dispatch_mask
    }

    pub fn take_dispatch_mask(&mut self) -> AspectMask {
        std::mem::replace(&mut self.dispatch_mask, AspectMask::EMPTY)
    }

    pub fn mark_outbound(&mut self, index: AspectIndex) {
        self.outbound_aspects.set_bit(index, true);
    }

    pub fn take_outbound_aspects(&mut self) -> AspectMask {
        std::mem::replace(&mut self.outbound_aspects, AspectMask::EMPTY)
    }

    /// Debounce for the deferred delegated upload: true the first time per
    /// window, false until the command re-arms it.
    pub fn schedule_upload(&mut self) -> bool {
        if self.upload_scheduled {
            return false;
        }
        self.upload_scheduled = true;
        true
    }

    /// The deferred command ran; the next gather may upload.
    pub fn arm_upload(&mut self) {
        self.upload_scheduled = false;
        self.upload_armed = true;
    }

    pub fn take_upload_armed(&mut self) -> bool {
        std::mem::replace(&mut self.upload_armed, false)
    }

    pub fn take_authority_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.authority_dirty, false)
    }

    // --- pending RMIs ------------------------------------------------------

    pub fn stage_legacy_rmi(&mut self, rmi: LegacyRmi) {
        self.pending_legacy.push(rmi);
    }

    pub fn stage_actor_rmi(&mut self, rmi: ActorRmi) {
        self.pending_actor.push(rmi);
    }

    pub fn pending_rmi_count(&self) -> usize {
        self.pending_legacy.len() + self.pending_actor.len()
    }
}

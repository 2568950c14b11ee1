//! The session root.
//!
//! One `NetworkSession` per process owns every active [`EntityReplica`], the
//! invocation queue, the deferred-command queue, and the once-per-frame pump
//! that moves state between the game and the carrier. The pump's step order
//! is a contract: binds and establishment first, then deferred commands,
//! then the RMI flush, then all inbound unmarshaling, then dispatch into
//! game state, then gather from game state, and outbound marshaling last.
//! Steps never interleave across entities.

use std::collections::HashMap;

use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

use crate::{
    aspect::{content_hash::content_hash, mask::AspectMask},
    carrier::Carrier,
    config::SessionConfig,
    constants::ASPECT_COUNT,
    events::{EventFanout, ReplicaEvents},
    game::{
        bridge::{EntityFactory, GameIo},
        field_io::{FieldReader, FieldWriter, IdTranslator},
    },
    replica::{entity_replica::EntityReplica, spawn_params::SpawnParams},
    rmi::{
        dispatch::{
            dispatch_channel, should_dispatch, should_invoke_locally, RmiChannel, RouteContext,
        },
        error::RmiError,
        invocation::{ActorRmi, LegacyRmi, RmiInvocation, ScriptRmi},
        queue::RmiQueue,
        registry::ActorRepRegistry,
        target::RmiTarget,
    },
    script::pool::ScriptSerializerPool,
    session::{
        deferred::{DeferredCommand, DeferredQueue},
        envelope::Envelope,
        error::SessionError,
        pump_lock::SharedPumpLock,
        stats::TrafficStats,
    },
    types::{AspectIndex, ChannelId, EntityId, HostRole, NetEntityId},
};

/// A pending-list entry drained at establishment, delivered through the
/// direct in-process handlers without re-entering the queue.
enum ReplayRmi {
    Legacy(LegacyRmi),
    Actor(ActorRmi),
}

pub struct NetworkSession {
    config: SessionConfig,

    /// Sole owner of every live replica, keyed by server-space id.
    replicas: HashMap<NetEntityId, EntityReplica>,
    /// Proxies awaiting establishment, in arrival order.
    new_proxies: Vec<NetEntityId>,
    /// Reverse index for clients; the server translates by identity. The
    /// first binding for a local entity wins and later ones are ignored.
    local_to_net: HashMap<EntityId, NetEntityId>,
    /// Masters bound since the last pump, awaiting their spawn broadcast.
    pending_announcements: Vec<NetEntityId>,

    connected_channels: Vec<ChannelId>,

    rmi_queue: RmiQueue,
    actor_reps: ActorRepRegistry,
    script_pool: ScriptSerializerPool,
    deferred: DeferredQueue,

    /// Envelopes staged for the marshal step.
    outbound: Vec<(ChannelId, Envelope)>,

    events: EventFanout,
    stats: TrafficStats,
    pump_lock: SharedPumpLock,
}

impl NetworkSession {
    pub fn new(config: SessionConfig) -> NetworkSession {
        log::info!(
            "starting {:?} session on channel {}",
            config.role,
            config.local_channel.0
        );
        NetworkSession {
            config,
            replicas: HashMap::new(),
            new_proxies: Vec::new(),
            local_to_net: HashMap::new(),
            pending_announcements: Vec::new(),
            connected_channels: Vec::new(),
            rmi_queue: RmiQueue::new(),
            actor_reps: ActorRepRegistry::new(),
            script_pool: ScriptSerializerPool::new(),
            deferred: DeferredQueue::new(),
            outbound: Vec::new(),
            events: EventFanout::new(),
            stats: TrafficStats::new(),
            pump_lock: SharedPumpLock::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn subscribe(&mut self, observer: Box<dyn ReplicaEvents>) {
        self.events.subscribe(observer);
    }

    pub fn actor_reps(&self) -> &ActorRepRegistry {
        &self.actor_reps
    }

    pub fn actor_reps_mut(&mut self) -> &mut ActorRepRegistry {
        &mut self.actor_reps
    }

    pub fn script_serializers(&self) -> &ScriptSerializerPool {
        &self.script_pool
    }

    pub fn script_serializers_mut(&mut self) -> &mut ScriptSerializerPool {
        &mut self.script_pool
    }

    pub fn replica(&self, net_id: NetEntityId) -> Option<&EntityReplica> {
        self.replicas.get(&net_id)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn pending_proxy_count(&self) -> usize {
        self.new_proxies.len()
    }

    pub fn queued_rmi_count(&self) -> usize {
        self.rmi_queue.len()
    }

    pub fn connected_channels(&self) -> &[ChannelId] {
        &self.connected_channels
    }

    /// A clone for background threads; see [`SharedPumpLock`].
    pub fn pump_lock(&self) -> SharedPumpLock {
        self.pump_lock.clone()
    }

    pub fn enter_minimal_update(&self) {
        self.pump_lock.enter_minimal_update();
    }

    pub fn leave_minimal_update(&self) {
        self.pump_lock.leave_minimal_update();
    }

    // --- id translation ----------------------------------------------------

    /// On the server the local id is the server id; clients consult the
    /// reverse index. `NetEntityId::INVALID` when unbound.
    pub fn local_to_net(&self, entity: EntityId) -> NetEntityId {
        if self.config.is_server() {
            return NetEntityId(entity.0);
        }
        self.local_to_net
            .get(&entity)
            .copied()
            .unwrap_or(NetEntityId::INVALID)
    }

    /// The local counterpart of a server-space id, `EntityId::INVALID` when
    /// none exists yet. Resolution during aspect reads goes through
    /// [`FieldReader::read_entity_id`] instead, which may force the
    /// referenced proxy to establish on the spot.
    pub fn net_to_local(&self, net_id: NetEntityId) -> EntityId {
        if self.config.is_server() {
            return EntityId(net_id.0);
        }
        match self.replicas.get(&net_id) {
            Some(replica) if replica.is_established() => replica.local_entity(),
            _ => EntityId::INVALID,
        }
    }

    // --- server-side entity surface -----------------------------------------

    /// Binds a server entity to a fresh master replica and returns its
    /// server-space id. The spawn broadcast goes out on the next pump.
    ///
    /// # Panics
    ///
    /// Panics on a client session, on the invalid id, and on double binds.
    /// Use `try_bind_entity` for the non-panicking form.
    pub fn bind_entity(&mut self, entity: EntityId, params: SpawnParams) -> NetEntityId {
        match self.try_bind_entity(entity, params) {
            Ok(net_id) => net_id,
            Err(error) => panic!("{}", error),
        }
    }

    pub fn try_bind_entity(
        &mut self,
        entity: EntityId,
        params: SpawnParams,
    ) -> Result<NetEntityId, SessionError> {
        self.require_role(HostRole::Server)?;
        if !entity.is_valid() {
            return Err(SessionError::InvalidEntity);
        }
        let net_id = NetEntityId(entity.0);
        if let Some(existing) = self.local_to_net.get(&entity) {
            return Err(SessionError::AlreadyBound {
                entity: entity.0,
                net_id: existing.0,
            });
        }

        let mut replica = EntityReplica::new(net_id, params);
        replica.activate_master();
        replica.establish_master(entity);
        self.replicas.insert(net_id, replica);
        self.local_to_net.insert(entity, net_id);
        self.pending_announcements.push(net_id);
        self.events.entity_bound(net_id, entity);
        self.events.entity_established(net_id, entity);
        log::debug!("bound entity {} as net entity {}", entity.0, net_id.0);
        Ok(net_id)
    }

    /// Queues the entity's teardown for the next pump's command step.
    ///
    /// # Panics
    ///
    /// Panics on a client session or an unbound entity. Use
    /// `try_despawn_entity` for the non-panicking form.
    pub fn despawn_entity(&mut self, entity: EntityId) {
        if let Err(error) = self.try_despawn_entity(entity) {
            panic!("{}", error);
        }
    }

    pub fn try_despawn_entity(&mut self, entity: EntityId) -> Result<(), SessionError> {
        self.require_role(HostRole::Server)?;
        let net_id = self.local_to_net(entity);
        if !self.replicas.contains_key(&net_id) {
            return Err(SessionError::NotBound { entity: entity.0 });
        }
        self.deferred.push(DeferredCommand::DespawnEntity { entity });
        Ok(())
    }

    /// Hands authority over `aspects` of `entity` to the client on `owner`.
    /// Takes effect locally at once; the announcement rides the next pump.
    ///
    /// # Panics
    ///
    /// Panics on a client session, an unbound entity, or an invalid owner.
    /// Use `try_delegate_authority` for the non-panicking form.
    pub fn delegate_authority(&mut self, entity: EntityId, owner: ChannelId, aspects: AspectMask) {
        if let Err(error) = self.try_delegate_authority(entity, owner, aspects) {
            panic!("{}", error);
        }
    }

    pub fn try_delegate_authority(
        &mut self,
        entity: EntityId,
        owner: ChannelId,
        aspects: AspectMask,
    ) -> Result<(), SessionError> {
        self.require_role(HostRole::Server)?;
        if !owner.is_valid() {
            return Err(SessionError::InvalidOwner { channel: owner.0 });
        }
        let net_id = self.local_to_net(entity);
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            return Err(SessionError::NotBound { entity: entity.0 });
        };
        replica.set_delegation(owner, aspects);
        self.events.authority_delegated(net_id, owner, aspects);
        log::info!(
            "delegated aspects {:#x} of net entity {} to channel {}",
            aspects.bits(),
            net_id.0,
            owner.0
        );
        Ok(())
    }

    /// Withdraws every delegated aspect of `entity`.
    ///
    /// # Panics
    ///
    /// Panics on a client session or an unbound entity. Use
    /// `try_revoke_authority` for the non-panicking form.
    pub fn revoke_authority(&mut self, entity: EntityId) {
        if let Err(error) = self.try_revoke_authority(entity) {
            panic!("{}", error);
        }
    }

    pub fn try_revoke_authority(&mut self, entity: EntityId) -> Result<(), SessionError> {
        self.require_role(HostRole::Server)?;
        let net_id = self.local_to_net(entity);
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            return Err(SessionError::NotBound { entity: entity.0 });
        };
        replica.clear_delegation();
        Ok(())
    }

    /// Changes one aspect's active profile. Profiles are server-authored.
    ///
    /// # Panics
    ///
    /// Panics on a client session or an unbound entity. Use
    /// `try_set_aspect_profile` for the non-panicking form.
    pub fn set_aspect_profile(&mut self, entity: EntityId, aspect: AspectIndex, profile: u8) {
        if let Err(error) = self.try_set_aspect_profile(entity, aspect, profile) {
            panic!("{}", error);
        }
    }

    pub fn try_set_aspect_profile(
        &mut self,
        entity: EntityId,
        aspect: AspectIndex,
        profile: u8,
    ) -> Result<(), SessionError> {
        self.require_role(HostRole::Server)?;
        let net_id = self.local_to_net(entity);
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            return Err(SessionError::NotBound { entity: entity.0 });
        };
        replica.set_aspect_profile(aspect, profile);
        Ok(())
    }

    // --- dirty marking -------------------------------------------------------

    /// Marks aspects of `entity` as changed so the next gather re-serializes
    /// them. Honored only for the master or a client holding delegated
    /// authority over the entity; anything else is a silent no-op. A client's
    /// first mark since its last upload schedules the deferred upload.
    pub fn changed_aspects(&mut self, entity: EntityId, aspects: AspectMask) {
        if aspects.is_empty() {
            return;
        }
        let net_id = self.local_to_net(entity);
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            return;
        };
        if replica.is_master() {
            replica.mark_game_dirty(aspects);
        } else if replica.has_client_authority() && replica.is_established() {
            replica.mark_game_dirty(aspects);
            if replica.schedule_upload() {
                self.deferred
                    .push(DeferredCommand::UploadDelegatedAspects { entity });
            }
        }
    }

    // --- RMI surface ---------------------------------------------------------

    /// Queues a legacy RMI against `entity`. Flushed, routed, and dispatched
    /// on the next pump in strict enqueue order across all three kinds.
    ///
    /// # Panics
    ///
    /// Panics on an invalid target selector. Use `try_invoke_legacy_rmi` for
    /// the non-panicking form.
    pub fn invoke_legacy_rmi(&mut self, entity: EntityId, rmi: LegacyRmi) {
        if let Err(error) = self.try_invoke_legacy_rmi(entity, rmi) {
            panic!("invalid legacy RMI: {}", error);
        }
    }

    pub fn try_invoke_legacy_rmi(
        &mut self,
        entity: EntityId,
        rmi: LegacyRmi,
    ) -> Result<(), RmiError> {
        self.enqueue_rmi(entity, RmiInvocation::Legacy(rmi))
    }

    /// # Panics
    ///
    /// Panics on an invalid target selector. Use `try_invoke_actor_rmi` for
    /// the non-panicking form.
    pub fn invoke_actor_rmi(&mut self, entity: EntityId, rmi: ActorRmi) {
        if let Err(error) = self.try_invoke_actor_rmi(entity, rmi) {
            panic!("invalid actor RMI: {}", error);
        }
    }

    pub fn try_invoke_actor_rmi(
        &mut self,
        entity: EntityId,
        rmi: ActorRmi,
    ) -> Result<(), RmiError> {
        self.enqueue_rmi(entity, RmiInvocation::Actor(rmi))
    }

    /// # Panics
    ///
    /// Panics on an invalid target selector. Use `try_invoke_script_rmi` for
    /// the non-panicking form.
    pub fn invoke_script_rmi(&mut self, entity: EntityId, rmi: ScriptRmi) {
        if let Err(error) = self.try_invoke_script_rmi(entity, rmi) {
            panic!("invalid script RMI: {}", error);
        }
    }

    pub fn try_invoke_script_rmi(
        &mut self,
        entity: EntityId,
        rmi: ScriptRmi,
    ) -> Result<(), RmiError> {
        self.enqueue_rmi(entity, RmiInvocation::Script(rmi))
    }

    fn enqueue_rmi(
        &mut self,
        entity: EntityId,
        mut invocation: RmiInvocation,
    ) -> Result<(), RmiError> {
        invocation.try_validate()?;
        invocation.set_origin(self.config.local_channel);
        if let RmiInvocation::Script(rmi) = &mut invocation {
            rmi.server_originated = self.config.is_server();
        }
        self.rmi_queue.push(entity, invocation);
        Ok(())
    }

    // --- membership ----------------------------------------------------------

    /// A peer channel came up. On the server this stages the late-join
    /// snapshot: spawn, full aspect state, and any standing delegation for
    /// every active replica, sent on the next pump.
    pub fn channel_connected(&mut self, channel: ChannelId) {
        if !channel.is_valid() || self.connected_channels.contains(&channel) {
            return;
        }
        self.connected_channels.push(channel);
        log::info!("channel {} connected", channel.0);
        if !self.config.is_server() {
            return;
        }

        let mut ids: Vec<NetEntityId> = self.replicas.keys().copied().collect();
        ids.sort_unstable();
        for net_id in ids {
            // replicas awaiting their first broadcast reach this channel
            // through the regular announcement instead
            if self.pending_announcements.contains(&net_id) {
                continue;
            }
            let Some(replica) = self.replicas.get(&net_id) else {
                continue;
            };
            self.outbound.push((
                channel,
                Envelope::Spawn {
                    net_id,
                    params: replica.spawn_params().clone(),
                },
            ));

            let mut snapshot = AspectMask::EMPTY;
            for index in 0..ASPECT_COUNT as AspectIndex {
                if replica.has_aspect_data(index) {
                    snapshot.set_bit(index, true);
                }
            }
            let body = Self::build_aspect_body(replica, snapshot, true);
            self.outbound.push((
                channel,
                Envelope::AspectUpdate {
                    net_id,
                    aspects: snapshot,
                    body,
                },
            ));

            if !replica.client_delegated_aspects().is_empty() {
                self.outbound.push((
                    channel,
                    Envelope::Authority {
                        net_id,
                        owner: replica.owner_channel(),
                        aspects: replica.client_delegated_aspects(),
                    },
                ));
            }
        }
    }

    /// A peer channel went down. The server drops any delegation it owned;
    /// the revocations broadcast on the next pump.
    pub fn channel_disconnected(&mut self, channel: ChannelId) {
        self.connected_channels.retain(|c| *c != channel);
        self.outbound.retain(|(c, _)| *c != channel);
        self.stats.forget_channel(channel);
        log::info!("channel {} disconnected", channel.0);
        if !self.config.is_server() {
            return;
        }
        for (net_id, replica) in self.replicas.iter_mut() {
            if replica.owner_channel() == channel && !replica.client_delegated_aspects().is_empty()
            {
                replica.clear_delegation();
                log::info!(
                    "revoked authority over net entity {} held by channel {}",
                    net_id.0,
                    channel.0
                );
            }
        }
    }

    /// Drops every replica and queued invocation. Emptying the RMI queue
    /// here is the only cancellation there is.
    pub fn shutdown(&mut self) {
        self.rmi_queue.clear();
        self.deferred = DeferredQueue::new();
        self.outbound.clear();
        self.new_proxies.clear();
        self.pending_announcements.clear();
        let mut ids: Vec<NetEntityId> = self.replicas.keys().copied().collect();
        ids.sort_unstable();
        for net_id in ids {
            if let Some(mut replica) = self.replicas.remove(&net_id) {
                if replica.try_deactivate().is_ok() {
                    self.events.replica_deactivated(net_id);
                }
            }
        }
        self.local_to_net.clear();
        log::info!("session shut down");
    }

    // --- the pump --------------------------------------------------------------

    /// Runs one frame of replication. While the minimal-update flag is up
    /// only the transport is serviced, so a loading screen keeps the
    /// connection alive without touching game state.
    pub fn pump(
        &mut self,
        carrier: &mut dyn Carrier,
        factory: &mut dyn EntityFactory,
        io: &mut dyn GameIo,
    ) {
        self.pump_lock.pump_if_free(carrier);
        if self.pump_lock.in_minimal_update() {
            return;
        }

        self.bind_and_establish(factory, io);
        self.run_deferred_commands();
        self.flush_rmi_queue(io);
        self.unmarshal_inbound(carrier, factory, io);
        self.apply_dispatch_pending(factory, io);
        self.gather_outbound(io);
        self.marshal_outbound(carrier);
    }

    // step 1: announce fresh masters, establish pending proxies
    fn bind_and_establish(&mut self, factory: &mut dyn EntityFactory, io: &mut dyn GameIo) {
        if self.config.is_server() {
            for net_id in std::mem::take(&mut self.pending_announcements) {
                let Some(replica) = self.replicas.get(&net_id) else {
                    continue;
                };
                let params = replica.spawn_params().clone();
                for &channel in &self.connected_channels {
                    self.outbound.push((
                        channel,
                        Envelope::Spawn {
                            net_id,
                            params: params.clone(),
                        },
                    ));
                }
            }
            return;
        }
        self.establish_pending_proxies(factory, io);
    }

    fn establish_pending_proxies(&mut self, factory: &mut dyn EntityFactory, io: &mut dyn GameIo) {
        if self.new_proxies.is_empty() {
            return;
        }
        let mut rules_live = self.game_rules_established();
        let mut still_pending = Vec::new();
        for net_id in std::mem::take(&mut self.new_proxies) {
            let Some(replica) = self.replicas.get(&net_id) else {
                continue;
            };
            if self.config.wait_for_game_rules && !replica.is_game_rules() && !rules_live {
                still_pending.push(net_id);
                continue;
            }
            let params = replica.spawn_params().clone();
            let entity = match factory.spawn_entity(&params) {
                Some(entity) if entity.is_valid() => entity,
                _ => {
                    // not spawnable yet, retry next frame
                    still_pending.push(net_id);
                    continue;
                }
            };
            let Some(replica) = self.replicas.get_mut(&net_id) else {
                continue;
            };
            let (legacy, actor) = match replica.try_establish_proxy(entity) {
                Ok(pending) => pending,
                Err(error) => {
                    log::warn!("cannot establish net entity {}: {}", net_id.0, error);
                    continue;
                }
            };
            if replica.is_game_rules() {
                rules_live = true;
            }
            self.local_to_net.entry(entity).or_insert(net_id);
            self.events.entity_bound(net_id, entity);
            self.events.entity_established(net_id, entity);
            log::debug!(
                "established net entity {} as local entity {}",
                net_id.0,
                entity.0
            );
            for rmi in &legacy {
                io.handle_legacy_rmi(entity, rmi);
            }
            for rmi in &actor {
                self.deliver_actor_rmi(entity, rmi);
            }
        }
        self.new_proxies = still_pending;
    }

    // step 2
    fn run_deferred_commands(&mut self) {
        for command in self.deferred.take_all() {
            match command {
                DeferredCommand::UploadDelegatedAspects { entity } => {
                    let net_id = self.local_to_net(entity);
                    if let Some(replica) = self.replicas.get_mut(&net_id) {
                        replica.arm_upload();
                    }
                }
                DeferredCommand::DespawnEntity { entity } => self.despawn_now(entity),
            }
        }
    }

    fn despawn_now(&mut self, entity: EntityId) {
        let net_id = self.local_to_net(entity);
        let Some(mut replica) = self.replicas.remove(&net_id) else {
            return;
        };
        if let Err(error) = replica.try_deactivate() {
            log::warn!("despawn of net entity {}: {}", net_id.0, error);
        }
        self.local_to_net.remove(&entity);
        self.events.replica_deactivated(net_id);
        log::debug!("despawned net entity {}", net_id.0);

        // a replica never announced needs no teardown broadcast
        let before = self.pending_announcements.len();
        self.pending_announcements.retain(|id| *id != net_id);
        if self.pending_announcements.len() != before {
            return;
        }
        for &channel in &self.connected_channels {
            self.outbound.push((channel, Envelope::Despawn { net_id }));
        }
    }

    // step 3
    fn flush_rmi_queue(&mut self, io: &mut dyn GameIo) {
        for entry in self.rmi_queue.take_all() {
            let entity = entry.entity;
            let invocation = entry.invocation;
            let net_id = self.local_to_net(entity);
            let target_state = self
                .replicas
                .get(&net_id)
                .map(|replica| (replica.owner_channel(), replica.is_established()));
            let Some((owner, established)) = target_state else {
                // offline or unbound: straight in-process call
                self.deliver_local(entity, &invocation, io);
                continue;
            };

            let ctx = RouteContext {
                is_server: self.config.is_server(),
                local_channel: self.config.local_channel,
                owner_channel: owner,
            };
            let target = invocation.target();
            let origin = invocation.origin();
            let filter = invocation.filter();

            if should_invoke_locally(target, origin, filter, &ctx) {
                if established {
                    self.deliver_local(entity, &invocation, io);
                } else {
                    self.stage_pending_rmi(net_id, &invocation, io);
                }
            }
            if should_dispatch(target, origin, &ctx) {
                self.stage_rmi_envelopes(net_id, owner, &invocation, None);
            }
        }
    }

    fn deliver_local(&mut self, entity: EntityId, invocation: &RmiInvocation, io: &mut dyn GameIo) {
        match invocation {
            RmiInvocation::Legacy(rmi) => io.handle_legacy_rmi(entity, rmi),
            RmiInvocation::Actor(rmi) => self.deliver_actor_rmi(entity, rmi),
            RmiInvocation::Script(rmi) => io.handle_script_rmi(entity, rmi),
        }
    }

    fn deliver_actor_rmi(&mut self, entity: EntityId, rmi: &ActorRmi) {
        match self.actor_reps.find_mut(rmi.rep_id) {
            Some(rep) => {
                let mut reader = ReadBuffer::new(rmi.payload.as_slice());
                if let Err(error) = rep.invoke(entity, rmi.extension_id, &mut reader) {
                    log::warn!(
                        "actor rep {} rejected its parameters: {}",
                        rmi.rep_id.0,
                        error
                    );
                }
            }
            None => {
                cfg_if! {
                    if #[cfg(debug_assertions)] {
                        panic!("actor rep {} is not registered", rmi.rep_id.0);
                    } else {
                        log::warn!("dropping RMI for unregistered actor rep {}", rmi.rep_id.0);
                    }
                }
            }
        }
    }

    /// Queues an invocation on a not-yet-established proxy for replay at
    /// establishment. Script RMIs are never staged; they go straight to the
    /// bridge with whatever local id exists.
    fn stage_pending_rmi(
        &mut self,
        net_id: NetEntityId,
        invocation: &RmiInvocation,
        io: &mut dyn GameIo,
    ) {
        match invocation {
            RmiInvocation::Script(rmi) => {
                let entity = self.net_to_local(net_id);
                io.handle_script_rmi(entity, rmi);
                return;
            }
            RmiInvocation::Legacy(rmi) => {
                if let Some(replica) = self.replicas.get_mut(&net_id) {
                    replica.stage_legacy_rmi(rmi.clone());
                }
            }
            RmiInvocation::Actor(rmi) => {
                if let Some(replica) = self.replicas.get_mut(&net_id) {
                    replica.stage_actor_rmi(rmi.clone());
                }
            }
        }
        log::debug!(
            "staged {} RMI for pending net entity {}",
            invocation.kind_name(),
            net_id.0
        );
    }

    fn stage_rmi_envelopes(
        &mut self,
        net_id: NetEntityId,
        owner: ChannelId,
        invocation: &RmiInvocation,
        arrived_from: Option<ChannelId>,
    ) {
        match dispatch_channel(invocation) {
            RmiChannel::LegacyToServer | RmiChannel::ActorToServer => {
                self.outbound.push((
                    self.config.server_channel,
                    Envelope::Rmi {
                        net_id,
                        invocation: invocation.clone(),
                    },
                ));
            }
            RmiChannel::LegacyToClients | RmiChannel::ActorToClients => {
                let recipients = self.rmi_recipients(invocation, owner, arrived_from);
                if recipients.is_empty() {
                    log::debug!(
                        "no recipients for {} RMI on net entity {}",
                        invocation.kind_name(),
                        net_id.0
                    );
                }
                for channel in recipients {
                    self.outbound.push((
                        channel,
                        Envelope::Rmi {
                            net_id,
                            invocation: invocation.clone(),
                        },
                    ));
                }
            }
        }
    }

    /// Resolves a client-direction selector against the connected set.
    /// `exclude` is the channel a relayed invocation arrived from; sending
    /// back up that channel would double-deliver.
    fn rmi_recipients(
        &self,
        invocation: &RmiInvocation,
        owner: ChannelId,
        exclude: Option<ChannelId>,
    ) -> Vec<ChannelId> {
        let target = invocation.target();
        let filter = invocation.filter();
        let origin = invocation.origin();

        if target.contains(RmiTarget::TO_CLIENT_CHANNEL) {
            if self.connected_channels.contains(&filter) {
                return vec![filter];
            }
            return Vec::new();
        }
        if target.contains(RmiTarget::TO_OWNING_CLIENT) {
            if owner.is_valid() && self.connected_channels.contains(&owner) {
                return vec![owner];
            }
            return Vec::new();
        }

        let avoid_filter =
            target.intersects(RmiTarget::TO_OTHER_CLIENTS | RmiTarget::TO_OTHER_REMOTE_CLIENTS);
        let avoid_origin = target.requires_origin();
        self.connected_channels
            .iter()
            .copied()
            .filter(|channel| Some(*channel) != exclude)
            .filter(|channel| !(avoid_filter && *channel == filter))
            .filter(|channel| !(avoid_origin && *channel == origin))
            .collect()
    }

    // step 4
    fn unmarshal_inbound(
        &mut self,
        carrier: &mut dyn Carrier,
        factory: &mut dyn EntityFactory,
        io: &mut dyn GameIo,
    ) {
        while let Some((channel, payload)) = carrier.receive() {
            self.stats.record_received(channel, payload.len());
            let mut reader = ReadBuffer::new(&payload);
            while !reader.is_exhausted() {
                match Envelope::de(&mut reader) {
                    Ok(envelope) => self.handle_envelope(channel, envelope, factory, io),
                    Err(error) => {
                        log::warn!(
                            "dropping malformed payload from channel {}: {}",
                            channel.0,
                            error
                        );
                        break;
                    }
                }
            }
        }
    }

    fn handle_envelope(
        &mut self,
        channel: ChannelId,
        envelope: Envelope,
        factory: &mut dyn EntityFactory,
        io: &mut dyn GameIo,
    ) {
        match envelope {
            Envelope::Spawn { net_id, params } => self.handle_spawn(channel, net_id, params),
            Envelope::AspectUpdate {
                net_id,
                aspects,
                body,
            } => self.handle_aspect_update(channel, net_id, aspects, &body),
            Envelope::Authority {
                net_id,
                owner,
                aspects,
            } => self.handle_authority(channel, net_id, owner, aspects),
            Envelope::Rmi { net_id, invocation } => {
                self.handle_rmi(channel, net_id, invocation, io)
            }
            Envelope::Despawn { net_id } => self.handle_despawn(channel, net_id, factory),
        }
    }

    fn from_server(&self, channel: ChannelId) -> bool {
        !self.config.is_server() && channel == self.config.server_channel
    }

    fn handle_spawn(&mut self, channel: ChannelId, net_id: NetEntityId, params: SpawnParams) {
        if !self.from_server(channel) {
            log::warn!("ignoring spawn from non-authoritative channel {}", channel.0);
            return;
        }
        if self.replicas.contains_key(&net_id) {
            log::warn!("duplicate spawn for net entity {}", net_id.0);
            return;
        }
        let mut replica = EntityReplica::new(net_id, params);
        replica.activate_proxy();
        self.replicas.insert(net_id, replica);
        self.new_proxies.push(net_id);
        log::debug!("received spawn for net entity {}", net_id.0);
    }

    fn handle_aspect_update(
        &mut self,
        channel: ChannelId,
        net_id: NetEntityId,
        aspects: AspectMask,
        body: &[u8],
    ) {
        let is_server = self.config.is_server();
        let from_server = self.from_server(channel);
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            log::warn!(
                "aspect update for unknown net entity {} from channel {}",
                net_id.0,
                channel.0
            );
            return;
        };

        // uploads count only from the owner, and only for delegated bits
        let accepted = if is_server {
            if channel == replica.owner_channel() {
                replica
                    .client_delegated_aspects()
                    .and(self.config.delegatable_aspects)
            } else {
                AspectMask::EMPTY
            }
        } else if from_server {
            AspectMask::ALL
        } else {
            AspectMask::EMPTY
        };

        let mut reader = ReadBuffer::new(body);
        for index in aspects.iter() {
            if accepted.bit(index) {
                match replica.unmarshal_aspect(index, &mut reader) {
                    Ok(_) => {
                        if is_server {
                            // rebroadcast to the other clients next marshal
                            replica.mark_outbound(index);
                        }
                    }
                    Err(error) => {
                        log::warn!(
                            "aspect {} of net entity {} failed to unmarshal: {}",
                            index,
                            net_id.0,
                            error
                        );
                        return;
                    }
                }
            } else {
                log::debug!(
                    "ignoring aspect {} of net entity {} from channel {}",
                    index,
                    net_id.0,
                    channel.0
                );
                if Self::skip_aspect_image(&mut reader).is_err() {
                    log::warn!("truncated aspect update for net entity {}", net_id.0);
                    return;
                }
            }
        }

        match reader.read_u8() {
            Ok(0) => {}
            Ok(1) => {
                if is_server {
                    log::warn!(
                        "ignoring profile table from channel {} for net entity {}",
                        channel.0,
                        net_id.0
                    );
                } else if let Err(error) = replica.unmarshal_profiles(&mut reader, &mut self.events)
                {
                    log::warn!(
                        "profile table for net entity {} failed to unmarshal: {}",
                        net_id.0,
                        error
                    );
                }
            }
            _ => log::warn!("truncated aspect update for net entity {}", net_id.0),
        }
    }

    fn skip_aspect_image(reader: &mut ReadBuffer) -> Result<(), SerdeErr> {
        reader.read_u8()?;
        let size = reader.read_u16()?;
        reader.skip(size as usize)
    }

    fn handle_authority(
        &mut self,
        channel: ChannelId,
        net_id: NetEntityId,
        owner: ChannelId,
        aspects: AspectMask,
    ) {
        if !self.from_server(channel) {
            log::warn!(
                "ignoring authority announcement from non-authoritative channel {}",
                channel.0
            );
            return;
        }
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            log::warn!("authority announcement for unknown net entity {}", net_id.0);
            return;
        };
        let gained = replica.receive_delegation(owner, aspects, self.config.local_channel);
        self.events.authority_delegated(net_id, owner, aspects);
        if gained {
            log::info!(
                "granted authority over aspects {:#x} of net entity {}",
                aspects.bits(),
                net_id.0
            );
        }
    }

    fn handle_rmi(
        &mut self,
        channel: ChannelId,
        net_id: NetEntityId,
        mut invocation: RmiInvocation,
        io: &mut dyn GameIo,
    ) {
        // selectors that carry no origin on the wire get the arrival channel
        if !invocation.origin().is_valid() {
            invocation.set_origin(channel);
        }
        if let RmiInvocation::Script(rmi) = &mut invocation {
            rmi.server_originated = channel == self.config.server_channel;
        }

        let target_state = self
            .replicas
            .get(&net_id)
            .map(|replica| (replica.owner_channel(), replica.is_established()));
        let Some((owner, established)) = target_state else {
            log::warn!(
                "{} RMI for unknown net entity {} from channel {}",
                invocation.kind_name(),
                net_id.0,
                channel.0
            );
            return;
        };

        let ctx = RouteContext {
            is_server: self.config.is_server(),
            local_channel: self.config.local_channel,
            owner_channel: owner,
        };
        let target = invocation.target();
        let origin = invocation.origin();
        let filter = invocation.filter();

        if should_invoke_locally(target, origin, filter, &ctx) {
            if established {
                let entity = self.net_to_local(net_id);
                self.deliver_local(entity, &invocation, io);
            } else {
                self.stage_pending_rmi(net_id, &invocation, io);
            }
        }
        if should_dispatch(target, origin, &ctx) {
            self.stage_rmi_envelopes(net_id, owner, &invocation, Some(channel));
        }
    }

    fn handle_despawn(
        &mut self,
        channel: ChannelId,
        net_id: NetEntityId,
        factory: &mut dyn EntityFactory,
    ) {
        if !self.from_server(channel) {
            log::warn!(
                "ignoring despawn from non-authoritative channel {}",
                channel.0
            );
            return;
        }
        let Some(mut replica) = self.replicas.remove(&net_id) else {
            log::warn!("despawn for unknown net entity {}", net_id.0);
            return;
        };
        self.new_proxies.retain(|id| *id != net_id);
        let entity = replica.local_entity();
        if let Err(error) = replica.try_deactivate() {
            log::warn!("despawn of net entity {}: {}", net_id.0, error);
        }
        if entity.is_valid() {
            if self.local_to_net.get(&entity) == Some(&net_id) {
                self.local_to_net.remove(&entity);
            }
            factory.release_entity(entity);
        }
        self.events.replica_deactivated(net_id);
        log::debug!("despawned net entity {}", net_id.0);
    }

    // step 5
    fn apply_dispatch_pending(&mut self, factory: &mut dyn EntityFactory, io: &mut dyn GameIo) {
        let mut ids: Vec<NetEntityId> = self.replicas.keys().copied().collect();
        ids.sort_unstable();
        let mut rules_live = self.game_rules_established();

        for net_id in ids {
            let Some(mut replica) = self.replicas.remove(&net_id) else {
                continue;
            };
            if !replica.is_established() || replica.dispatch_mask().is_empty() {
                self.replicas.insert(net_id, replica);
                continue;
            }
            let entity = replica.local_entity();
            let mask = replica.take_dispatch_mask();
            for index in mask.iter() {
                let mut raw = ReadBuffer::new(replica.aspect(index).payload());
                let mut replay = Vec::new();
                let outcome = {
                    let mut resolver = EstablishingResolver {
                        is_server: self.config.is_server(),
                        wait_for_game_rules: self.config.wait_for_game_rules,
                        rules_live: &mut rules_live,
                        current: (net_id, entity),
                        replicas: &mut self.replicas,
                        new_proxies: &mut self.new_proxies,
                        local_to_net: &mut self.local_to_net,
                        events: &mut self.events,
                        factory,
                        replay: &mut replay,
                    };
                    let mut reader = FieldReader::new(&mut raw, &mut resolver);
                    io.read_aspect(entity, index, &mut reader)
                };
                for (replay_entity, rmi) in replay {
                    match rmi {
                        ReplayRmi::Legacy(rmi) => io.handle_legacy_rmi(replay_entity, &rmi),
                        ReplayRmi::Actor(rmi) => self.deliver_actor_rmi(replay_entity, &rmi),
                    }
                }
                if let Err(error) = outcome {
                    cfg_if! {
                        if #[cfg(debug_assertions)] {
                            panic!(
                                "aspect {} of net entity {} failed to apply: {}",
                                index, net_id.0, error
                            );
                        } else {
                            log::warn!(
                                "aspect {} of net entity {} failed to apply: {}",
                                index,
                                net_id.0,
                                error
                            );
                        }
                    }
                }
            }
            self.replicas.insert(net_id, replica);
        }
    }

    // step 6
    fn gather_outbound(&mut self, io: &mut dyn GameIo) {
        let mut ids: Vec<NetEntityId> = self.replicas.keys().copied().collect();
        ids.sort_unstable();

        // (net id, entity, bits, true when this is a delegated upload)
        let mut work: Vec<(NetEntityId, EntityId, AspectMask, bool)> = Vec::new();
        for &net_id in &ids {
            let Some(replica) = self.replicas.get_mut(&net_id) else {
                continue;
            };
            if !replica.is_established() {
                continue;
            }
            if replica.is_master() {
                let bits = replica.game_dirtied_aspects();
                if !bits.is_empty() {
                    work.push((net_id, replica.local_entity(), bits, false));
                }
            } else if replica.take_upload_armed() {
                let bits = replica
                    .game_dirtied_aspects()
                    .and(replica.locally_delegated_mask(self.config.delegatable_aspects));
                replica.clear_game_dirtied();
                if !bits.is_empty() {
                    work.push((net_id, replica.local_entity(), bits, true));
                }
            }
        }

        for (net_id, entity, bits, delegated) in work {
            for index in bits.iter() {
                let mut scratch = WriteBuffer::new();
                let wrote = {
                    let translator = BoundTranslator {
                        is_server: self.config.is_server(),
                        local_to_net: &self.local_to_net,
                        replicas: &self.replicas,
                    };
                    let mut writer = FieldWriter::new(&mut scratch, &translator);
                    io.write_aspect(entity, index, &mut writer)
                };
                if !wrote {
                    continue;
                }
                let bytes = scratch.into_vec();
                if bytes.len() > u16::MAX as usize {
                    log::warn!(
                        "aspect {} of entity {} serialized to {} bytes, over the wire limit",
                        index,
                        entity.0,
                        bytes.len()
                    );
                    continue;
                }
                let hash = content_hash(&bytes);
                let Some(replica) = self.replicas.get_mut(&net_id) else {
                    continue;
                };
                if delegated {
                    // gate on the delegated cache, not the slot hash, so a
                    // fresh grant always re-uploads
                    if hash != replica.delegated_hash(index) {
                        replica.commit_aspect_data(index, &bytes, hash, &mut self.events);
                        replica.set_delegated_hash(index, hash);
                        replica.mark_outbound(index);
                    }
                } else if replica.commit_aspect_data(index, &bytes, hash, &mut self.events) {
                    replica.mark_outbound(index);
                }
            }
        }
    }

    // step 7
    fn marshal_outbound(&mut self, carrier: &mut dyn Carrier) {
        let mut ids: Vec<NetEntityId> = self.replicas.keys().copied().collect();
        ids.sort_unstable();
        let is_server = self.config.is_server();

        for net_id in ids {
            let Some(replica) = self.replicas.get_mut(&net_id) else {
                continue;
            };

            if is_server && replica.take_authority_dirty() {
                let envelope = Envelope::Authority {
                    net_id,
                    owner: replica.owner_channel(),
                    aspects: replica.client_delegated_aspects(),
                };
                for &channel in &self.connected_channels {
                    self.outbound.push((channel, envelope.clone()));
                }
            }

            let outbound_mask = replica.take_outbound_aspects();
            if is_server {
                let profiles_dirty = replica.take_profiles_dirty();
                if outbound_mask.is_empty() && !profiles_dirty {
                    continue;
                }
                let delegated = replica
                    .client_delegated_aspects()
                    .and(self.config.delegatable_aspects);
                let owner = replica.owner_channel();
                for &channel in &self.connected_channels {
                    let mut mask = outbound_mask;
                    if channel == owner {
                        // never echo a client's own authored bits back at it
                        mask.nand(delegated);
                    }
                    if mask.is_empty() && !profiles_dirty {
                        continue;
                    }
                    let body = Self::build_aspect_body(replica, mask, profiles_dirty);
                    self.outbound.push((
                        channel,
                        Envelope::AspectUpdate {
                            net_id,
                            aspects: mask,
                            body,
                        },
                    ));
                }
            } else {
                let mask = outbound_mask
                    .and(replica.locally_delegated_mask(self.config.delegatable_aspects));
                if mask.is_empty() {
                    continue;
                }
                let body = Self::build_aspect_body(replica, mask, false);
                self.outbound.push((
                    self.config.server_channel,
                    Envelope::AspectUpdate {
                        net_id,
                        aspects: mask,
                        body,
                    },
                ));
            }
        }

        self.flush_outbound(carrier);
    }

    fn build_aspect_body(
        replica: &EntityReplica,
        mask: AspectMask,
        include_profiles: bool,
    ) -> Vec<u8> {
        let mut writer = WriteBuffer::new();
        for index in mask.iter() {
            replica.marshal_aspect(index, &mut writer);
        }
        writer.write_u8(include_profiles as u8);
        if include_profiles {
            replica.marshal_profiles(&mut writer);
        }
        writer.into_vec()
    }

    fn flush_outbound(&mut self, carrier: &mut dyn Carrier) {
        for (channel, envelope) in std::mem::take(&mut self.outbound) {
            if self.config.is_server() && !self.connected_channels.contains(&channel) {
                continue;
            }
            let mut writer = WriteBuffer::new();
            envelope.ser(&mut writer);
            let wire = writer.into_vec();
            self.stats.record_sent(channel, wire.len());
            carrier.send(channel, &wire);
        }
    }

    fn game_rules_established(&self) -> bool {
        self.replicas
            .values()
            .any(|replica| replica.is_game_rules() && replica.is_established())
    }

    fn require_role(&self, required: HostRole) -> Result<(), SessionError> {
        if self.config.role == required {
            Ok(())
        } else {
            Err(SessionError::WrongRole {
                required,
                actual: self.config.role,
            })
        }
    }
}

/// Read-side id translation. Holds the session internals mutably so a read
/// of an entity reference can establish the referenced proxy on the spot;
/// the replica currently being applied is out of the map, so `current`
/// keeps self-references resolvable.
struct EstablishingResolver<'a> {
    is_server: bool,
    wait_for_game_rules: bool,
    rules_live: &'a mut bool,
    current: (NetEntityId, EntityId),
    replicas: &'a mut HashMap<NetEntityId, EntityReplica>,
    new_proxies: &'a mut Vec<NetEntityId>,
    local_to_net: &'a mut HashMap<EntityId, NetEntityId>,
    events: &'a mut EventFanout,
    factory: &'a mut dyn EntityFactory,
    replay: &'a mut Vec<(EntityId, ReplayRmi)>,
}

impl IdTranslator for EstablishingResolver<'_> {
    fn local_to_net(&self, entity: EntityId) -> NetEntityId {
        if self.is_server {
            return NetEntityId(entity.0);
        }
        if entity == self.current.1 {
            return self.current.0;
        }
        self.local_to_net
            .get(&entity)
            .copied()
            .unwrap_or(NetEntityId::INVALID)
    }

    fn net_to_local(&mut self, net_id: NetEntityId) -> EntityId {
        if self.is_server {
            return EntityId(net_id.0);
        }
        if net_id == self.current.0 {
            return self.current.1;
        }
        let params = match self.replicas.get(&net_id) {
            None => return EntityId::INVALID,
            Some(replica) if replica.is_established() => return replica.local_entity(),
            Some(replica) => {
                if !replica.newly_received() {
                    return EntityId::INVALID;
                }
                if self.wait_for_game_rules && !replica.is_game_rules() && !*self.rules_live {
                    return EntityId::INVALID;
                }
                replica.spawn_params().clone()
            }
        };
        let entity = match self.factory.spawn_entity(&params) {
            Some(entity) if entity.is_valid() => entity,
            _ => return EntityId::INVALID,
        };
        let Some(replica) = self.replicas.get_mut(&net_id) else {
            return EntityId::INVALID;
        };
        match replica.try_establish_proxy(entity) {
            Ok((legacy, actor)) => {
                if replica.is_game_rules() {
                    *self.rules_live = true;
                }
                self.new_proxies.retain(|pending| *pending != net_id);
                self.local_to_net.entry(entity).or_insert(net_id);
                self.events.entity_bound(net_id, entity);
                self.events.entity_established(net_id, entity);
                log::debug!(
                    "established net entity {} as local entity {} mid-read",
                    net_id.0,
                    entity.0
                );
                for rmi in legacy {
                    self.replay.push((entity, ReplayRmi::Legacy(rmi)));
                }
                for rmi in actor {
                    self.replay.push((entity, ReplayRmi::Actor(rmi)));
                }
                entity
            }
            Err(error) => {
                log::warn!("cannot establish net entity {} mid-read: {}", net_id.0, error);
                EntityId::INVALID
            }
        }
    }
}

/// Write-side id translation: lookups only, never establishment.
struct BoundTranslator<'a> {
    is_server: bool,
    local_to_net: &'a HashMap<EntityId, NetEntityId>,
    replicas: &'a HashMap<NetEntityId, EntityReplica>,
}

impl IdTranslator for BoundTranslator<'_> {
    fn local_to_net(&self, entity: EntityId) -> NetEntityId {
        if self.is_server {
            return NetEntityId(entity.0);
        }
        self.local_to_net
            .get(&entity)
            .copied()
            .unwrap_or(NetEntityId::INVALID)
    }

    fn net_to_local(&mut self, net_id: NetEntityId) -> EntityId {
        if self.is_server {
            return EntityId(net_id.0);
        }
        match self.replicas.get(&net_id) {
            Some(replica) if replica.is_established() => replica.local_entity(),
            _ => EntityId::INVALID,
        }
    }
}

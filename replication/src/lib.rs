//! # Replink
//! Entity replication for networked games: per-entity aspect buffers with
//! hash-gated resends, queued remote method invocations with topology-aware
//! routing, and a session root that pumps the whole pipeline once per frame.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use replink_serde::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

mod aspect;
mod carrier;
mod config;
mod constants;
mod events;
mod game;
mod replica;
mod rmi;
mod script;
mod session;
mod types;

pub use aspect::{
    content_hash::content_hash,
    mask::{AspectMask, AspectMaskIter},
    profiles::EntityAspectProfiles,
    serialize_state::{AspectBuffer, AspectSerializeState},
};
pub use carrier::Carrier;
pub use config::SessionConfig;
pub use constants::{
    ASPECT_COUNT, ASPECT_INLINE_CAPACITY, MAX_ACTOR_RMI_PARAMS, MAX_SCRIPT_RMI_DATA,
    RMI_PAYLOAD_INLINE_CAPACITY, SCRIPT_SERIALIZER_POOL_SIZE, UNSET_ASPECT_PROFILE,
};
pub use events::{EventFanout, ReplicaEvents};
pub use game::{
    bridge::{EntityFactory, GameIo},
    field_io::{FieldReader, FieldWriter, IdTranslator},
};
pub use replica::{
    entity_replica::{EntityReplica, ReplicaState},
    error::ReplicaError,
    spawn_params::{spawn_flags, SpawnParams},
};
pub use rmi::{
    dispatch::{
        dispatch_channel, should_dispatch, should_invoke_locally, RmiChannel, RouteContext,
    },
    error::RmiError,
    invocation::{ActorRmi, LegacyRmi, RmiInvocation, ScriptRmi},
    payload::RmiPayload,
    queue::{QueuedRmi, RmiQueue},
    registry::{ActorRepRegistry, ActorRmiRep},
    target::RmiTarget,
};
pub use script::{
    pool::{ScriptSerializer, ScriptSerializerPool},
    values::{
        deserialize_values, serialize_values, try_serialize_values, ScriptError, ScriptFieldKind,
        ScriptValue,
    },
};
pub use session::{
    deferred::{DeferredCommand, DeferredQueue},
    envelope::Envelope,
    error::SessionError,
    network_session::NetworkSession,
    pump_lock::SharedPumpLock,
    stats::{ChannelStats, TrafficStats},
};
pub use types::{AspectIndex, ChannelId, EntityId, HostRole, NetEntityId, RepId};

use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

use crate::{
    constants::{MAX_ACTOR_RMI_PARAMS, MAX_SCRIPT_RMI_DATA},
    rmi::{error::RmiError, payload::RmiPayload, target::RmiTarget},
    types::{ChannelId, RepId},
};

const KIND_LEGACY: u8 = 0;
const KIND_ACTOR: u8 = 1;
const KIND_SCRIPT: u8 = 2;

/// Game-object RMI dispatched through a registered rep id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyRmi {
    pub target: RmiTarget,
    pub origin: ChannelId,
    pub filter: ChannelId,
    pub rep_id: RepId,
    pub payload: RmiPayload,
}

impl LegacyRmi {
    /// # Panics
    ///
    /// Panics on an invalid target combination or an oversized payload.
    /// Use `try_new` for the non-panicking form.
    pub fn new(target: RmiTarget, filter: ChannelId, rep_id: RepId, params: &[u8]) -> LegacyRmi {
        match Self::try_new(target, filter, rep_id, params) {
            Ok(rmi) => rmi,
            Err(error) => panic!("invalid legacy RMI: {}", error),
        }
    }

    pub fn try_new(
        target: RmiTarget,
        filter: ChannelId,
        rep_id: RepId,
        params: &[u8],
    ) -> Result<LegacyRmi, RmiError> {
        target.try_validate(filter)?;
        if params.len() > MAX_ACTOR_RMI_PARAMS {
            return Err(RmiError::ParamsTooLarge {
                size: params.len(),
                limit: MAX_ACTOR_RMI_PARAMS,
            });
        }
        Ok(LegacyRmi {
            target,
            origin: ChannelId::INVALID,
            filter,
            rep_id,
            payload: RmiPayload::from_bytes(params),
        })
    }
}

/// Actor RMI carrying a registered rep id plus an extension discriminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorRmi {
    pub target: RmiTarget,
    pub origin: ChannelId,
    pub filter: ChannelId,
    pub rep_id: RepId,
    pub extension_id: u8,
    pub payload: RmiPayload,
}

impl ActorRmi {
    /// # Panics
    ///
    /// Panics on an invalid target combination or an oversized payload.
    /// Use `try_new` for the non-panicking form.
    pub fn new(
        target: RmiTarget,
        filter: ChannelId,
        rep_id: RepId,
        extension_id: u8,
        params: &[u8],
    ) -> ActorRmi {
        match Self::try_new(target, filter, rep_id, extension_id, params) {
            Ok(rmi) => rmi,
            Err(error) => panic!("invalid actor RMI: {}", error),
        }
    }

    pub fn try_new(
        target: RmiTarget,
        filter: ChannelId,
        rep_id: RepId,
        extension_id: u8,
        params: &[u8],
    ) -> Result<ActorRmi, RmiError> {
        target.try_validate(filter)?;
        if params.len() > MAX_ACTOR_RMI_PARAMS {
            return Err(RmiError::ParamsTooLarge {
                size: params.len(),
                limit: MAX_ACTOR_RMI_PARAMS,
            });
        }
        Ok(ActorRmi {
            target,
            origin: ChannelId::INVALID,
            filter,
            rep_id,
            extension_id,
            payload: RmiPayload::from_bytes(params),
        })
    }
}

/// Script-level RMI. Carries explicit to/avoid channels on the wire instead
/// of the conditional origin/filter fields; whether the call originated on
/// the server is stamped on receipt, never transmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptRmi {
    pub target: RmiTarget,
    pub origin: ChannelId,
    pub server_originated: bool,
    pub to_channel: ChannelId,
    pub avoid_channel: ChannelId,
    pub payload: RmiPayload,
}

impl ScriptRmi {
    /// # Panics
    ///
    /// Panics on an invalid target combination or an oversized payload.
    /// Use `try_new` for the non-panicking form.
    pub fn new(
        target: RmiTarget,
        to_channel: ChannelId,
        avoid_channel: ChannelId,
        data: &[u8],
    ) -> ScriptRmi {
        match Self::try_new(target, to_channel, avoid_channel, data) {
            Ok(rmi) => rmi,
            Err(error) => panic!("invalid script RMI: {}", error),
        }
    }

    pub fn try_new(
        target: RmiTarget,
        to_channel: ChannelId,
        avoid_channel: ChannelId,
        data: &[u8],
    ) -> Result<ScriptRmi, RmiError> {
        target.try_validate(Self::select_filter(target, to_channel, avoid_channel))?;
        if data.len() > MAX_SCRIPT_RMI_DATA {
            return Err(RmiError::ScriptDataTooLarge {
                size: data.len(),
                limit: MAX_SCRIPT_RMI_DATA,
            });
        }
        Ok(ScriptRmi {
            target,
            origin: ChannelId::INVALID,
            server_originated: false,
            to_channel,
            avoid_channel,
            payload: RmiPayload::from_bytes(data),
        })
    }

    /// The channel feeding the routing filter: the avoid-channel for the
    /// "other clients" selectors, the to-channel otherwise.
    pub fn filter(&self) -> ChannelId {
        Self::select_filter(self.target, self.to_channel, self.avoid_channel)
    }

    fn select_filter(target: RmiTarget, to: ChannelId, avoid: ChannelId) -> ChannelId {
        if target.intersects(RmiTarget::TO_OTHER_CLIENTS | RmiTarget::TO_OTHER_REMOTE_CLIENTS) {
            avoid
        } else {
            to
        }
    }
}

/// One queued remote-method invocation. The closed variant set replaces
/// polymorphic serializer objects; each variant owns its wire codec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RmiInvocation {
    Legacy(LegacyRmi),
    Actor(ActorRmi),
    Script(ScriptRmi),
}

impl RmiInvocation {
    pub fn target(&self) -> RmiTarget {
        match self {
            RmiInvocation::Legacy(rmi) => rmi.target,
            RmiInvocation::Actor(rmi) => rmi.target,
            RmiInvocation::Script(rmi) => rmi.target,
        }
    }

    pub fn origin(&self) -> ChannelId {
        match self {
            RmiInvocation::Legacy(rmi) => rmi.origin,
            RmiInvocation::Actor(rmi) => rmi.origin,
            RmiInvocation::Script(rmi) => rmi.origin,
        }
    }

    pub fn set_origin(&mut self, origin: ChannelId) {
        match self {
            RmiInvocation::Legacy(rmi) => rmi.origin = origin,
            RmiInvocation::Actor(rmi) => rmi.origin = origin,
            RmiInvocation::Script(rmi) => rmi.origin = origin,
        }
    }

    /// The channel filter feeding the routing decisions.
    pub fn filter(&self) -> ChannelId {
        match self {
            RmiInvocation::Legacy(rmi) => rmi.filter,
            RmiInvocation::Actor(rmi) => rmi.filter,
            RmiInvocation::Script(rmi) => rmi.filter(),
        }
    }

    pub fn payload(&self) -> &RmiPayload {
        match self {
            RmiInvocation::Legacy(rmi) => &rmi.payload,
            RmiInvocation::Actor(rmi) => &rmi.payload,
            RmiInvocation::Script(rmi) => &rmi.payload,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RmiInvocation::Legacy(_) => "legacy",
            RmiInvocation::Actor(_) => "actor",
            RmiInvocation::Script(_) => "script",
        }
    }

    /// Re-checks the selector invariants.
    ///
    /// # Panics
    ///
    /// Panics if the target combination is invalid.
    pub fn validate(&self) {
        if let Err(error) = self.try_validate() {
            panic!("invalid {} RMI: {}", self.kind_name(), error);
        }
    }

    pub fn try_validate(&self) -> Result<(), RmiError> {
        self.target().try_validate(self.filter())
    }

    /// Writes `[kind: u8]` followed by the variant's wire image: the common
    /// prefix `[selector][origin?][filter?][size][payload]` plus the
    /// variant's trailing fields.
    pub fn marshal(&self, writer: &mut WriteBuffer) {
        match self {
            RmiInvocation::Legacy(rmi) => {
                writer.write_u8(KIND_LEGACY);
                write_prefix(writer, rmi.target, rmi.origin, rmi.filter, &rmi.payload);
                rmi.rep_id.ser(writer);
            }
            RmiInvocation::Actor(rmi) => {
                writer.write_u8(KIND_ACTOR);
                write_prefix(writer, rmi.target, rmi.origin, rmi.filter, &rmi.payload);
                rmi.rep_id.ser(writer);
                writer.write_u8(rmi.extension_id);
            }
            RmiInvocation::Script(rmi) => {
                writer.write_u8(KIND_SCRIPT);
                rmi.target.ser(writer);
                rmi.to_channel.ser(writer);
                rmi.avoid_channel.ser(writer);
                writer.write_u16(rmi.payload.len() as u16);
                writer.write_bytes(rmi.payload.as_slice());
            }
        }
    }

    /// Reads the wire image produced by `marshal`. Origin falls back to
    /// `ChannelId::INVALID` when the selector does not carry it; the session
    /// stamps the sending channel in afterwards.
    pub fn unmarshal(reader: &mut ReadBuffer) -> Result<RmiInvocation, SerdeErr> {
        match reader.read_u8()? {
            KIND_LEGACY => {
                let (target, origin, filter, payload) = read_prefix(reader)?;
                let rep_id = RepId::de(reader)?;
                Ok(RmiInvocation::Legacy(LegacyRmi {
                    target,
                    origin,
                    filter,
                    rep_id,
                    payload,
                }))
            }
            KIND_ACTOR => {
                let (target, origin, filter, payload) = read_prefix(reader)?;
                let rep_id = RepId::de(reader)?;
                let extension_id = reader.read_u8()?;
                Ok(RmiInvocation::Actor(ActorRmi {
                    target,
                    origin,
                    filter,
                    rep_id,
                    extension_id,
                    payload,
                }))
            }
            KIND_SCRIPT => {
                let target = RmiTarget::de(reader)?;
                let to_channel = ChannelId::de(reader)?;
                let avoid_channel = ChannelId::de(reader)?;
                let size = reader.read_u16()? as usize;
                let bytes = reader.read_bytes(size)?;
                Ok(RmiInvocation::Script(ScriptRmi {
                    target,
                    origin: ChannelId::INVALID,
                    server_originated: false,
                    to_channel,
                    avoid_channel,
                    payload: RmiPayload::from_bytes(bytes),
                }))
            }
            _ => Err(SerdeErr::InvalidValue),
        }
    }
}

fn write_prefix(
    writer: &mut WriteBuffer,
    target: RmiTarget,
    origin: ChannelId,
    filter: ChannelId,
    payload: &RmiPayload,
) {
    target.ser(writer);
    if target.requires_origin() {
        origin.ser(writer);
    }
    if target.requires_filter() {
        filter.ser(writer);
    }
    writer.write_u16(payload.len() as u16);
    writer.write_bytes(payload.as_slice());
}

fn read_prefix(
    reader: &mut ReadBuffer,
) -> Result<(RmiTarget, ChannelId, ChannelId, RmiPayload), SerdeErr> {
    let target = RmiTarget::de(reader)?;
    let origin = if target.requires_origin() {
        ChannelId::de(reader)?
    } else {
        ChannelId::INVALID
    };
    let filter = if target.requires_filter() {
        ChannelId::de(reader)?
    } else {
        ChannelId::INVALID
    };
    let size = reader.read_u16()? as usize;
    let bytes = reader.read_bytes(size)?;
    Ok((target, origin, filter, RmiPayload::from_bytes(bytes)))
}

use replink_serde::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

use crate::{
    aspect::mask::AspectMask,
    replica::spawn_params::SpawnParams,
    rmi::invocation::RmiInvocation,
    types::{ChannelId, NetEntityId},
};

const KIND_SPAWN: u8 = 0;
const KIND_ASPECT_UPDATE: u8 = 1;
const KIND_AUTHORITY: u8 = 2;
const KIND_RMI: u8 = 3;
const KIND_DESPAWN: u8 = 4;

/// One carrier payload. Every message the session exchanges is a single
/// envelope addressed by server-space entity id.
///
/// An `AspectUpdate` body is the concatenation of one aspect wire image per
/// set mask bit in ascending index order, then a profile-table flag byte and,
/// when set, the profile table. The body is length-prefixed so the envelope
/// can be decoded without aspect context.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope {
    Spawn {
        net_id: NetEntityId,
        params: SpawnParams,
    },
    AspectUpdate {
        net_id: NetEntityId,
        aspects: AspectMask,
        body: Vec<u8>,
    },
    Authority {
        net_id: NetEntityId,
        owner: ChannelId,
        aspects: AspectMask,
    },
    Rmi {
        net_id: NetEntityId,
        invocation: RmiInvocation,
    },
    Despawn {
        net_id: NetEntityId,
    },
}

impl Envelope {
    pub fn net_id(&self) -> NetEntityId {
        match self {
            Envelope::Spawn { net_id, .. }
            | Envelope::AspectUpdate { net_id, .. }
            | Envelope::Authority { net_id, .. }
            | Envelope::Rmi { net_id, .. }
            | Envelope::Despawn { net_id } => *net_id,
        }
    }
}

impl Serde for Envelope {
    fn ser(&self, writer: &mut WriteBuffer) {
        match self {
            Envelope::Spawn { net_id, params } => {
                writer.write_u8(KIND_SPAWN);
                net_id.ser(writer);
                params.ser(writer);
            }
            Envelope::AspectUpdate {
                net_id,
                aspects,
                body,
            } => {
                writer.write_u8(KIND_ASPECT_UPDATE);
                net_id.ser(writer);
                aspects.ser(writer);
                VarU32::new(body.len() as u32).ser(writer);
                writer.write_bytes(body);
            }
            Envelope::Authority {
                net_id,
                owner,
                aspects,
            } => {
                writer.write_u8(KIND_AUTHORITY);
                net_id.ser(writer);
                owner.ser(writer);
                aspects.ser(writer);
            }
            Envelope::Rmi { net_id, invocation } => {
                writer.write_u8(KIND_RMI);
                net_id.ser(writer);
                invocation.marshal(writer);
            }
            Envelope::Despawn { net_id } => {
                writer.write_u8(KIND_DESPAWN);
                net_id.ser(writer);
            }
        }
    }

    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        match reader.read_u8()? {
            KIND_SPAWN => Ok(Envelope::Spawn {
                net_id: NetEntityId::de(reader)?,
                params: SpawnParams::de(reader)?,
            }),
            KIND_ASPECT_UPDATE => {
                let net_id = NetEntityId::de(reader)?;
                let aspects = AspectMask::de(reader)?;
                let len = VarU32::de(reader)?.get() as usize;
                let body = reader.read_bytes(len)?.to_vec();
                Ok(Envelope::AspectUpdate {
                    net_id,
                    aspects,
                    body,
                })
            }
            KIND_AUTHORITY => Ok(Envelope::Authority {
                net_id: NetEntityId::de(reader)?,
                owner: ChannelId::de(reader)?,
                aspects: AspectMask::de(reader)?,
            }),
            KIND_RMI => Ok(Envelope::Rmi {
                net_id: NetEntityId::de(reader)?,
                invocation: RmiInvocation::unmarshal(reader)?,
            }),
            KIND_DESPAWN => Ok(Envelope::Despawn {
                net_id: NetEntityId::de(reader)?,
            }),
            _ => Err(SerdeErr::InvalidValue),
        }
    }
}

use replink_serde::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

/// Zero-based index of one aspect slot, always less than
/// [`ASPECT_COUNT`](crate::ASPECT_COUNT).
pub type AspectIndex = u8;

/// Identifier of an entity in the local process's id space. Zero is invalid.
///
/// Only the server may treat a local id as equal to the server-assigned id;
/// clients must translate through the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Server-assigned entity identifier, shared by every peer in the session.
/// Zero is invalid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetEntityId(pub u32);

impl NetEntityId {
    pub const INVALID: NetEntityId = NetEntityId(0);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Serde for NetEntityId {
    fn ser(&self, writer: &mut WriteBuffer) {
        VarU32::new(self.0).ser(writer);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(NetEntityId(VarU32::de(reader)?.get()))
    }
}

/// Identifier of one connected peer. Zero is invalid; the server itself
/// occupies [`ChannelId::SERVER`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl ChannelId {
    pub const INVALID: ChannelId = ChannelId(0);
    pub const SERVER: ChannelId = ChannelId(1);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Serde for ChannelId {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u32(self.0);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(ChannelId(reader.read_u32()?))
    }
}

/// Registry id of an actor RMI handler. Zero means "unregistered".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepId(pub u32);

impl RepId {
    pub const UNREGISTERED: RepId = RepId(0);

    pub fn is_registered(&self) -> bool {
        *self != Self::UNREGISTERED
    }
}

impl Serde for RepId {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u32(self.0);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(RepId(reader.read_u32()?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostRole {
    Server,
    Client,
}

impl HostRole {
    pub fn is_server(&self) -> bool {
        *self == HostRole::Server
    }

    pub fn is_client(&self) -> bool {
        *self == HostRole::Client
    }
}

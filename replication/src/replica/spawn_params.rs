use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};

use crate::types::ChannelId;

/// Flags carried inside [`SpawnParams::flags`].
pub mod spawn_flags {
    /// Marks the game-rules singleton, the prerequisite every other proxy
    /// waits on before establishing.
    pub const GAME_RULES: u32 = 1 << 0;

    /// The entity is a client-controlled actor; its owner channel is
    /// meaningful from the first frame.
    pub const CLIENT_ACTOR: u32 = 1 << 1;
}

/// Everything a peer needs to instantiate the local counterpart of a
/// replicated entity. The server-assigned entity id travels in the
/// enclosing envelope, not here.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnParams {
    pub entity_name: String,
    pub class_name: String,
    /// Empty when the entity has no archetype.
    pub archetype: String,
    pub position: [f32; 3],
    pub orientation: [f32; 4],
    pub scale: [f32; 3],
    pub flags: u32,
    pub owner_channel: ChannelId,
}

impl SpawnParams {
    pub fn new(entity_name: &str, class_name: &str) -> SpawnParams {
        SpawnParams {
            entity_name: entity_name.to_string(),
            class_name: class_name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_game_rules(&self) -> bool {
        self.flags & spawn_flags::GAME_RULES != 0
    }
}

impl Default for SpawnParams {
    fn default() -> Self {
        SpawnParams {
            entity_name: String::new(),
            class_name: String::new(),
            archetype: String::new(),
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            flags: 0,
            owner_channel: ChannelId::INVALID,
        }
    }
}

impl Serde for SpawnParams {
    fn ser(&self, writer: &mut WriteBuffer) {
        self.entity_name.ser(writer);
        self.class_name.ser(writer);
        self.archetype.ser(writer);
        self.position.ser(writer);
        self.orientation.ser(writer);
        self.scale.ser(writer);
        writer.write_u32(self.flags);
        self.owner_channel.ser(writer);
    }

    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(SpawnParams {
            entity_name: String::de(reader)?,
            class_name: String::de(reader)?,
            archetype: String::de(reader)?,
            position: <[f32; 3]>::de(reader)?,
            orientation: <[f32; 4]>::de(reader)?,
            scale: <[f32; 3]>::de(reader)?,
            flags: reader.read_u32()?,
            owner_channel: ChannelId::de(reader)?,
        })
    }
}

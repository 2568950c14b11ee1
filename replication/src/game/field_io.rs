//! Typed field access for game-side aspect serialization.
//!
//! Game code never touches the raw buffers: it reads and writes named
//! primitive fields through these wrappers, and entity references cross the
//! boundary in server id space. Reading an entity id may force the
//! referenced proxy to establish immediately, which is why the translator
//! is taken mutably on the read side.

use replink_serde::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

use crate::types::{EntityId, NetEntityId};

/// Local↔server entity-id translation at the serialization boundary.
pub trait IdTranslator {
    /// `NetEntityId::INVALID` when the entity has no network binding.
    fn local_to_net(&self, entity: EntityId) -> NetEntityId;

    /// `EntityId::INVALID` when no local counterpart exists or can be
    /// established right now.
    fn net_to_local(&mut self, net_id: NetEntityId) -> EntityId;
}

pub struct FieldWriter<'a> {
    writer: &'a mut WriteBuffer,
    ids: &'a dyn IdTranslator,
}

impl<'a> FieldWriter<'a> {
    pub fn new(writer: &'a mut WriteBuffer, ids: &'a dyn IdTranslator) -> FieldWriter<'a> {
        FieldWriter { writer, ids }
    }

    pub fn write_bool(&mut self, value: bool) {
        value.ser(self.writer);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.writer.write_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.writer.write_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.writer.write_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.writer.write_u64(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        value.ser(self.writer);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.writer.write_f32(value);
    }

    pub fn write_str(&mut self, value: &str) {
        VarU32::new(value.len() as u32).ser(self.writer);
        self.writer.write_bytes(value.as_bytes());
    }

    pub fn write_vec3(&mut self, value: [f32; 3]) {
        value.ser(self.writer);
    }

    pub fn write_quat(&mut self, value: [f32; 4]) {
        value.ser(self.writer);
    }

    pub fn write_blob(&mut self, bytes: &[u8]) {
        VarU32::new(bytes.len() as u32).ser(self.writer);
        self.writer.write_bytes(bytes);
    }

    /// Translates the local id into server space before writing. Entities
    /// without a binding serialize as the invalid id.
    pub fn write_entity_id(&mut self, entity: EntityId) {
        self.ids.local_to_net(entity).ser(self.writer);
    }
}

pub struct FieldReader<'a, 'b> {
    reader: &'a mut ReadBuffer<'b>,
    ids: &'a mut dyn IdTranslator,
}

impl<'a, 'b> FieldReader<'a, 'b> {
    pub fn new(reader: &'a mut ReadBuffer<'b>, ids: &'a mut dyn IdTranslator) -> FieldReader<'a, 'b> {
        FieldReader { reader, ids }
    }

    pub fn read_bool(&mut self) -> Result<bool, SerdeErr> {
        bool::de(self.reader)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerdeErr> {
        self.reader.read_u8()
    }

    pub fn read_u16(&mut self) -> Result<u16, SerdeErr> {
        self.reader.read_u16()
    }

    pub fn read_u32(&mut self) -> Result<u32, SerdeErr> {
        self.reader.read_u32()
    }

    pub fn read_u64(&mut self) -> Result<u64, SerdeErr> {
        self.reader.read_u64()
    }

    pub fn read_i32(&mut self) -> Result<i32, SerdeErr> {
        i32::de(self.reader)
    }

    pub fn read_f32(&mut self) -> Result<f32, SerdeErr> {
        self.reader.read_f32()
    }

    pub fn read_str(&mut self) -> Result<String, SerdeErr> {
        let len = VarU32::de(self.reader)?.get() as usize;
        let bytes = self.reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::BadString)
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3], SerdeErr> {
        <[f32; 3]>::de(self.reader)
    }

    pub fn read_quat(&mut self) -> Result<[f32; 4], SerdeErr> {
        <[f32; 4]>::de(self.reader)
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>, SerdeErr> {
        let len = VarU32::de(self.reader)?.get() as usize;
        Ok(self.reader.read_bytes(len)?.to_vec())
    }

    /// Reads a server-space id and resolves it locally, forcing the
    /// referenced proxy to establish when the session allows it.
    pub fn read_entity_id(&mut self) -> Result<EntityId, SerdeErr> {
        let net_id = NetEntityId::de(self.reader)?;
        Ok(self.ids.net_to_local(net_id))
    }
}

use crate::{ReadBuffer, Serde, SerdeErr, VarU32, WriteBuffer};

// Unsigned integers

impl Serde for u8 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u8(*self);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        reader.read_u8()
    }
}

impl Serde for u16 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u16(*self);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        reader.read_u16()
    }
}

impl Serde for u32 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u32(*self);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        reader.read_u32()
    }
}

impl Serde for u64 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u64(*self);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        reader.read_u64()
    }
}

// Signed / float

impl Serde for i32 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u32(*self as u32);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok(reader.read_u32()? as i32)
    }
}

impl Serde for f32 {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_f32(*self);
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        reader.read_f32()
    }
}

// Bool

impl Serde for bool {
    fn ser(&self, writer: &mut WriteBuffer) {
        writer.write_u8(u8::from(*self));
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        match reader.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerdeErr::InvalidValue),
        }
    }
}

// Fixed float arrays (spawn transforms)

impl Serde for [f32; 3] {
    fn ser(&self, writer: &mut WriteBuffer) {
        for value in self {
            writer.write_f32(*value);
        }
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok([
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
        ])
    }
}

impl Serde for [f32; 4] {
    fn ser(&self, writer: &mut WriteBuffer) {
        for value in self {
            writer.write_f32(*value);
        }
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        Ok([
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
            reader.read_f32()?,
        ])
    }
}

// Length-prefixed string (VarU32 length, utf-8 bytes)

impl Serde for String {
    fn ser(&self, writer: &mut WriteBuffer) {
        VarU32::new(self.len() as u32).ser(writer);
        writer.write_bytes(self.as_bytes());
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        let length = VarU32::de(reader)?.get() as usize;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr::BadString)
    }
}

// Option (presence byte)

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut WriteBuffer) {
        match self {
            Some(value) => {
                writer.write_u8(1);
                value.ser(writer);
            }
            None => writer.write_u8(0),
        }
    }
    fn de(reader: &mut ReadBuffer) -> Result<Self, SerdeErr> {
        match reader.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::de(reader)?)),
            _ => Err(SerdeErr::InvalidValue),
        }
    }
}

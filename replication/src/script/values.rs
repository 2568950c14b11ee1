//! Script-property wire marshaling.
//!
//! Script RMIs carry dynamically-declared property tables. The field kinds
//! form a schema declared once per serializer name; values then travel as
//! raw schema-ordered bytes with no per-value tags. Serialization is a pure
//! function pair over that schema.

use replink_serde::{ReadBuffer, Serde, SerdeErr, WriteBuffer};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptFieldKind {
    Bool,
    I32,
    F32,
    Str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    Bool(bool),
    I32(i32),
    F32(f32),
    Str(String),
}

impl ScriptValue {
    pub fn kind(&self) -> ScriptFieldKind {
        match self {
            ScriptValue::Bool(_) => ScriptFieldKind::Bool,
            ScriptValue::I32(_) => ScriptFieldKind::I32,
            ScriptValue::F32(_) => ScriptFieldKind::F32,
            ScriptValue::Str(_) => ScriptFieldKind::Str,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script serializer pool is full ({capacity} slots)")]
    PoolExhausted { capacity: usize },
    #[error("script serializer {name:?} is already committed")]
    DuplicateSerializer { name: String },
    #[error("schema has {expected} fields, got {actual} values")]
    FieldCountMismatch { expected: usize, actual: usize },
    #[error("value {index} does not match its declared field kind")]
    FieldKindMismatch { index: usize },
}

/// Writes `values` in schema order.
///
/// # Panics
///
/// Panics when the values do not match the schema; the schema is declared by
/// the same code that invokes it, so a mismatch is a programmer error. Use
/// `try_serialize_values` for the non-panicking form.
pub fn serialize_values(schema: &[ScriptFieldKind], values: &[ScriptValue], writer: &mut WriteBuffer) {
    if let Err(error) = try_serialize_values(schema, values, writer) {
        panic!("cannot serialize script values: {}", error);
    }
}

pub fn try_serialize_values(
    schema: &[ScriptFieldKind],
    values: &[ScriptValue],
    writer: &mut WriteBuffer,
) -> Result<(), ScriptError> {
    if schema.len() != values.len() {
        return Err(ScriptError::FieldCountMismatch {
            expected: schema.len(),
            actual: values.len(),
        });
    }
    for (index, (kind, value)) in schema.iter().zip(values).enumerate() {
        if *kind != value.kind() {
            return Err(ScriptError::FieldKindMismatch { index });
        }
        match value {
            ScriptValue::Bool(value) => value.ser(writer),
            ScriptValue::I32(value) => value.ser(writer),
            ScriptValue::F32(value) => writer.write_f32(*value),
            ScriptValue::Str(value) => value.ser(writer),
        }
    }
    Ok(())
}

/// Reads one value per schema field, in order.
pub fn deserialize_values(
    schema: &[ScriptFieldKind],
    reader: &mut ReadBuffer,
) -> Result<Vec<ScriptValue>, SerdeErr> {
    let mut values = Vec::with_capacity(schema.len());
    for kind in schema {
        let value = match kind {
            ScriptFieldKind::Bool => ScriptValue::Bool(bool::de(reader)?),
            ScriptFieldKind::I32 => ScriptValue::I32(i32::de(reader)?),
            ScriptFieldKind::F32 => ScriptValue::F32(reader.read_f32()?),
            ScriptFieldKind::Str => ScriptValue::Str(String::de(reader)?),
        };
        values.push(value);
    }
    Ok(values)
}

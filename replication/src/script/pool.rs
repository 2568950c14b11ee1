use crate::{
    constants::SCRIPT_SERIALIZER_POOL_SIZE,
    script::values::{ScriptError, ScriptFieldKind},
};

/// One named script-property schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptSerializer {
    name: String,
    schema: Vec<ScriptFieldKind>,
}

impl ScriptSerializer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[ScriptFieldKind] {
        &self.schema
    }
}

/// Maps named script serializers onto a fixed set of wire slots. The slot
/// index is what actually travels, so the pool size is a wire-format
/// constant, not a tunable.
pub struct ScriptSerializerPool {
    slots: Vec<ScriptSerializer>,
}

impl ScriptSerializerPool {
    pub fn new() -> ScriptSerializerPool {
        ScriptSerializerPool {
            slots: Vec::with_capacity(SCRIPT_SERIALIZER_POOL_SIZE),
        }
    }

    /// Claims the next free slot for `name`.
    ///
    /// # Panics
    ///
    /// Panics when the pool is full or the name is already committed; both
    /// peers must declare identical tables, so failing quietly here would
    /// surface later as a desync. Use `try_commit_serializer` for the
    /// non-panicking form.
    pub fn commit_serializer(&mut self, name: &str, schema: Vec<ScriptFieldKind>) -> u8 {
        match self.try_commit_serializer(name, schema) {
            Ok(slot) => slot,
            Err(error) => panic!("cannot commit script serializer: {}", error),
        }
    }

    pub fn try_commit_serializer(
        &mut self,
        name: &str,
        schema: Vec<ScriptFieldKind>,
    ) -> Result<u8, ScriptError> {
        if self.slots.iter().any(|slot| slot.name == name) {
            return Err(ScriptError::DuplicateSerializer {
                name: name.to_string(),
            });
        }
        if self.slots.len() >= SCRIPT_SERIALIZER_POOL_SIZE {
            return Err(ScriptError::PoolExhausted {
                capacity: SCRIPT_SERIALIZER_POOL_SIZE,
            });
        }
        let slot = self.slots.len() as u8;
        self.slots.push(ScriptSerializer {
            name: name.to_string(),
            schema,
        });
        Ok(slot)
    }

    pub fn find_serializer(&self, name: &str) -> Option<(u8, &ScriptSerializer)> {
        self.slots
            .iter()
            .position(|slot| slot.name == name)
            .map(|index| (index as u8, &self.slots[index]))
    }

    pub fn serializer_at(&self, slot: u8) -> Option<&ScriptSerializer> {
        self.slots.get(slot as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for ScriptSerializerPool {
    fn default() -> Self {
        Self::new()
    }
}

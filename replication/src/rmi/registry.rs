use replink_serde::{ReadBuffer, SerdeErr};

use crate::{
    rmi::error::RmiError,
    types::{EntityId, RepId},
};

/// Receive-side handler for one actor-RMI family. The handler owns the
/// parameter deserialization; a decode failure is surfaced to the session,
/// which applies the usual desync policy.
pub trait ActorRmiRep {
    fn invoke(
        &mut self,
        entity: EntityId,
        extension_id: u8,
        reader: &mut ReadBuffer,
    ) -> Result<(), SerdeErr>;
}

/// Sorted-by-id rep collection with binary-search lookup.
///
/// Ids are globally unique and never zero; `RepId::UNREGISTERED` is the
/// "no rep" sentinel everywhere else in the crate.
pub struct ActorRepRegistry {
    reps: Vec<(RepId, Box<dyn ActorRmiRep>)>,
    next_id: u32,
}

impl ActorRepRegistry {
    pub fn new() -> ActorRepRegistry {
        ActorRepRegistry {
            reps: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers under the next monotonically assigned id.
    pub fn register(&mut self, rep: Box<dyn ActorRmiRep>) -> RepId {
        let rep_id = RepId(self.next_id);
        self.next_id += 1;
        // monotonic ids always append in sorted position
        self.reps.push((rep_id, rep));
        rep_id
    }

    /// Registers under a caller-chosen id.
    ///
    /// # Panics
    ///
    /// Panics if the id is zero or already registered. Use
    /// `try_register_at` for the non-panicking form.
    pub fn register_at(&mut self, rep_id: RepId, rep: Box<dyn ActorRmiRep>) {
        if let Err(error) = self.try_register_at(rep_id, rep) {
            panic!("cannot register RMI rep: {}", error);
        }
    }

    pub fn try_register_at(
        &mut self,
        rep_id: RepId,
        rep: Box<dyn ActorRmiRep>,
    ) -> Result<(), RmiError> {
        if rep_id == RepId::UNREGISTERED {
            return Err(RmiError::ZeroRepId);
        }
        match self.reps.binary_search_by_key(&rep_id, |entry| entry.0) {
            Ok(_) => Err(RmiError::RepAlreadyRegistered { rep_id: rep_id.0 }),
            Err(position) => {
                self.reps.insert(position, (rep_id, rep));
                if rep_id.0 >= self.next_id {
                    self.next_id = rep_id.0 + 1;
                }
                Ok(())
            }
        }
    }

    /// Removes a registered rep.
    ///
    /// # Panics
    ///
    /// Panics if the id was never registered. Use `try_unregister` for the
    /// non-panicking form.
    pub fn unregister(&mut self, rep_id: RepId) -> Box<dyn ActorRmiRep> {
        match self.try_unregister(rep_id) {
            Ok(rep) => rep,
            Err(error) => panic!("cannot unregister RMI rep: {}", error),
        }
    }

    pub fn try_unregister(&mut self, rep_id: RepId) -> Result<Box<dyn ActorRmiRep>, RmiError> {
        match self.reps.binary_search_by_key(&rep_id, |entry| entry.0) {
            Ok(position) => Ok(self.reps.remove(position).1),
            Err(_) => Err(RmiError::RepNotRegistered { rep_id: rep_id.0 }),
        }
    }

    pub fn find_mut(&mut self, rep_id: RepId) -> Option<&mut dyn ActorRmiRep> {
        match self.reps.binary_search_by_key(&rep_id, |entry| entry.0) {
            Ok(position) => Some(self.reps[position].1.as_mut()),
            Err(_) => None,
        }
    }

    pub fn contains(&self, rep_id: RepId) -> bool {
        self.reps
            .binary_search_by_key(&rep_id, |entry| entry.0)
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }
}

impl Default for ActorRepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

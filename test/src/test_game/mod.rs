/// Scripted game double for E2E testing.
/// One u32 value per (entity, aspect) slot and an append-only log of every
/// call the replication layer makes into the game.
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use replink::{
    ActorRmiRep, AspectIndex, EntityFactory, EntityId, FieldReader, FieldWriter, GameIo, LegacyRmi,
    ReadBuffer, ScriptRmi, SerdeErr, SpawnParams,
};

#[derive(Default)]
struct GameState {
    next_entity: u32,
    /// Spawn-name to local id, filled by factory spawns only.
    entities: HashMap<String, u32>,
    aspect_values: HashMap<(u32, AspectIndex), u32>,
    log: Vec<String>,
}

/// Cheap-to-clone handle; the session's factory and IO halves are two
/// clones of the same underlying state.
#[derive(Clone, Default)]
pub struct TestGame {
    state: Rc<RefCell<GameState>>,
}

impl TestGame {
    /// `first_entity` seeds the local id allocator. Peers use disjoint
    /// ranges so an id leaking across processes shows up as a wrong value
    /// instead of an accidental match.
    pub fn new(first_entity: u32) -> TestGame {
        TestGame {
            state: Rc::new(RefCell::new(GameState {
                next_entity: first_entity,
                ..Default::default()
            })),
        }
    }

    pub fn set_aspect(&self, entity: EntityId, aspect: AspectIndex, value: u32) {
        self.state
            .borrow_mut()
            .aspect_values
            .insert((entity.0, aspect), value);
    }

    pub fn aspect(&self, entity: EntityId, aspect: AspectIndex) -> Option<u32> {
        self.state
            .borrow()
            .aspect_values
            .get(&(entity.0, aspect))
            .copied()
    }

    /// The local id the factory assigned to a spawn, by entity name.
    pub fn entity_named(&self, name: &str) -> Option<EntityId> {
        self.state.borrow().entities.get(name).copied().map(EntityId)
    }

    pub fn log(&self) -> Vec<String> {
        self.state.borrow().log.clone()
    }

    /// Drains the log, so consecutive phases of a test assert only their
    /// own traffic.
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().log)
    }

    /// An actor rep recording into this game's log, for registering with
    /// the session under a test-chosen rep id.
    pub fn actor_rep(&self) -> Box<dyn ActorRmiRep> {
        Box::new(RecordingRep {
            state: self.state.clone(),
        })
    }
}

impl EntityFactory for TestGame {
    fn spawn_entity(&mut self, params: &SpawnParams) -> Option<EntityId> {
        let mut state = self.state.borrow_mut();
        let entity = EntityId(state.next_entity);
        state.next_entity += 1;
        state.entities.insert(params.entity_name.clone(), entity.0);
        let line = format!("spawn {} as {}", params.entity_name, entity.0);
        state.log.push(line);
        Some(entity)
    }

    fn release_entity(&mut self, entity: EntityId) {
        let mut state = self.state.borrow_mut();
        state.entities.retain(|_, id| *id != entity.0);
        state.log.push(format!("release {}", entity.0));
    }
}

impl GameIo for TestGame {
    fn write_aspect(
        &mut self,
        entity: EntityId,
        aspect: AspectIndex,
        writer: &mut FieldWriter,
    ) -> bool {
        match self.state.borrow().aspect_values.get(&(entity.0, aspect)) {
            Some(value) => {
                writer.write_u32(*value);
                true
            }
            None => false,
        }
    }

    fn read_aspect(
        &mut self,
        entity: EntityId,
        aspect: AspectIndex,
        reader: &mut FieldReader,
    ) -> Result<(), SerdeErr> {
        let value = reader.read_u32()?;
        let mut state = self.state.borrow_mut();
        state.aspect_values.insert((entity.0, aspect), value);
        state
            .log
            .push(format!("aspect {} of {} = {}", aspect, entity.0, value));
        Ok(())
    }

    fn handle_legacy_rmi(&mut self, entity: EntityId, rmi: &LegacyRmi) {
        self.state
            .borrow_mut()
            .log
            .push(format!("legacy {} on {}", rmi.rep_id.0, entity.0));
    }

    fn handle_script_rmi(&mut self, entity: EntityId, rmi: &ScriptRmi) {
        let from = if rmi.server_originated {
            "server"
        } else {
            "client"
        };
        self.state
            .borrow_mut()
            .log
            .push(format!("script on {} from {}", entity.0, from));
    }
}

struct RecordingRep {
    state: Rc<RefCell<GameState>>,
}

impl ActorRmiRep for RecordingRep {
    fn invoke(
        &mut self,
        entity: EntityId,
        extension_id: u8,
        reader: &mut ReadBuffer,
    ) -> Result<(), SerdeErr> {
        let mut params = Vec::new();
        while !reader.is_exhausted() {
            params.push(reader.read_u8()?);
        }
        self.state.borrow_mut().log.push(format!(
            "actor ext {} on {} params {:?}",
            extension_id, entity.0, params
        ));
        Ok(())
    }
}

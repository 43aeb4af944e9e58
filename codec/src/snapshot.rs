//! Entity snapshot and per-class baselines.

use std::collections::HashMap;

use protocol::MAX_EDICTS;

use crate::entity::PropValue;
use crate::error::{CodecError, CodecResult};

/// Property values of one entity or baseline, in flattened order.
pub type PropArray = Vec<Option<PropValue>>;

/// A networked entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub server_class: u32,
    pub serial: u32,
    pub props: PropArray,
    pub in_pvs: bool,
}

/// Every entity slot at one point in time. `Clone` is the deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    entities: Vec<Option<Entity>>,
    pub engine_tick: i32,
}

impl Default for EntitySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitySnapshot {
    /// An empty snapshot with every slot cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: vec![None; MAX_EDICTS],
            engine_tick: 0,
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)?.as_ref()
    }

    /// Live entities with their slot index.
    pub fn live(&self) -> impl Iterator<Item = (usize, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|entity| (index, entity)))
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entities.iter().filter(|slot| slot.is_some()).count()
    }

    fn slot_mut(&mut self, index: usize) -> CodecResult<&mut Option<Entity>> {
        self.entities
            .get_mut(index)
            .ok_or(CodecError::EntityIndexOutOfRange {
                index: index as u32,
            })
    }

    /// Brings an entity into the PVS. A new entity starts from a copy of
    /// `baseline`; otherwise the occupant of the slot is kept.
    pub fn enter_pvs(
        &mut self,
        index: usize,
        server_class: u32,
        serial: u32,
        is_new: bool,
        baseline: Option<&PropArray>,
    ) -> CodecResult<&mut Entity> {
        let slot = self.slot_mut(index)?;
        if is_new || slot.is_none() {
            *slot = Some(Entity {
                server_class,
                serial,
                props: baseline.cloned().unwrap_or_default(),
                in_pvs: true,
            });
        }
        let entity = slot.as_mut().ok_or(CodecError::EntityNotFound {
            index: index as u32,
        })?;
        entity.in_pvs = true;
        Ok(entity)
    }

    /// Takes an entity out of the PVS, clearing the slot on delete.
    pub fn leave_pvs(&mut self, index: usize, delete: bool) -> CodecResult<()> {
        let slot = self.slot_mut(index)?;
        if delete {
            *slot = None;
        } else if let Some(entity) = slot.as_mut() {
            entity.in_pvs = false;
        }
        Ok(())
    }

    /// Writes `changes` into the entity at `index`.
    pub fn apply_delta(&mut self, index: usize, changes: &[(usize, PropValue)]) -> CodecResult<()> {
        let entity = self
            .slot_mut(index)?
            .as_mut()
            .ok_or(CodecError::EntityNotFound {
                index: index as u32,
            })?;
        write_props(&mut entity.props, changes);
        Ok(())
    }
}

/// Copies `changes` into `props`, growing it to fit.
pub fn write_props(props: &mut PropArray, changes: &[(usize, PropValue)]) {
    for (prop_index, value) in changes {
        if *prop_index >= props.len() {
            props.resize(prop_index + 1, None);
        }
        props[*prop_index] = Some(value.clone());
    }
}

/// Default property values per server class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baselines {
    by_class: HashMap<u32, PropArray>,
}

impl Baselines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, server_class: u32) -> Option<&PropArray> {
        self.by_class.get(&server_class)
    }

    pub fn set(&mut self, server_class: u32, props: PropArray) {
        self.by_class.insert(server_class, props);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_class.clear();
    }
}

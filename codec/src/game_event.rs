//! Game events, decoded against the descriptors from `SvcGameEventList`.

use std::collections::HashMap;

use bitstream::BitReader;

use crate::error::{CodecError, CodecResult};

/// Width of an event id.
pub const EVENT_INDEX_BITS: u32 = 9;
/// Width of a key type tag.
pub const EVENT_KEY_TYPE_BITS: u32 = 3;

/// Wire type of an event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKeyType {
    String,
    Float,
    Long,
    Short,
    Byte,
    Bool,
    /// Server-side only; never on the wire.
    Local,
}

impl EventKeyType {
    /// Maps a tag; zero ends a key list and is `None`.
    #[must_use]
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::String),
            2 => Some(Self::Float),
            3 => Some(Self::Long),
            4 => Some(Self::Short),
            5 => Some(Self::Byte),
            6 => Some(Self::Bool),
            7 => Some(Self::Local),
            _ => None,
        }
    }
}

/// Shape of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEventDescriptor {
    pub id: u32,
    pub name: String,
    pub keys: Vec<(String, EventKeyType)>,
}

impl GameEventDescriptor {
    pub fn read(reader: &mut BitReader<'_>) -> CodecResult<Self> {
        let id = reader.read_bits(EVENT_INDEX_BITS)?;
        let name = reader.read_cstring()?;
        let mut keys = Vec::new();
        while let Some(kind) = EventKeyType::from_tag(reader.read_bits(EVENT_KEY_TYPE_BITS)?) {
            keys.push((reader.read_cstring()?, kind));
        }
        Ok(Self { id, name, keys })
    }
}

/// Descriptors by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameEventList {
    by_id: HashMap<u32, GameEventDescriptor>,
}

impl GameEventList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: GameEventDescriptor) {
        self.by_id.insert(descriptor.id, descriptor);
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&GameEventDescriptor> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Decodes one event payload.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> CodecResult<GameEvent> {
        let id = reader.read_bits(EVENT_INDEX_BITS)?;
        let descriptor = self.get(id).ok_or(CodecError::UnknownGameEvent { id })?;
        let mut values = Vec::with_capacity(descriptor.keys.len());
        for (key, kind) in &descriptor.keys {
            let value = match kind {
                EventKeyType::String => GameEventValue::String(reader.read_cstring()?),
                EventKeyType::Float => GameEventValue::Float(reader.read_f32()?),
                EventKeyType::Long => GameEventValue::Long(reader.read_i32()?),
                EventKeyType::Short => GameEventValue::Short(reader.read_i16()?),
                EventKeyType::Byte => GameEventValue::Byte(reader.read_u8()?),
                EventKeyType::Bool => GameEventValue::Bool(reader.read_bool()?),
                EventKeyType::Local => continue,
            };
            values.push((key.clone(), value));
        }
        Ok(GameEvent {
            id,
            name: descriptor.name.clone(),
            values,
        })
    }
}

/// A decoded key value.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEventValue {
    String(String),
    Float(f32),
    Long(i32),
    Short(i16),
    Byte(u8),
    Bool(bool),
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub id: u32,
    pub name: String,
    pub values: Vec<(String, GameEventValue)>,
}

impl GameEvent {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&GameEventValue> {
        self.values
            .iter()
            .find_map(|(name, value)| (name == key).then_some(value))
    }
}

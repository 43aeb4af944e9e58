//! String table state.
//!
//! Tables are created by `SvcCreateStringTable`, grown and edited by
//! `SvcUpdateStringTable`, and overwritten wholesale by `StringTables`
//! frames. A table whose update fails is marked not readable and answers
//! every read with `None` from then on.

use std::collections::VecDeque;

use bitstream::BitReader;
use protocol::ProtocolFacts;
use tracing::debug;

use crate::error::{CodecError, CodecResult};

/// Number of recent names an update may reuse a prefix of.
pub const STRING_HISTORY_SIZE: usize = 32;
/// Width of a history slot reference.
pub const HISTORY_INDEX_BITS: u32 = 5;
/// Width of a reused prefix length.
pub const HISTORY_PREFIX_BITS: u32 = 5;
/// Width of a variable-size user data byte count.
pub const MAX_USERDATA_BITS: u32 = 14;
/// Fixed size of name fields inside player info.
pub const MAX_PLAYER_NAME_LENGTH: usize = 32;
/// Fixed size of the GUID field inside player info.
pub const SIGNED_GUID_LENGTH: usize = 33;

/// One table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StringTableEntry {
    pub name: String,
    pub data: Option<EntryData>,
}

/// Entry payload, typed by the owning table's name.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryData {
    PlayerInfo(PlayerInfo),
    Precache { flags: u8 },
    /// Baseline bits for the class whose id is the entry name. Decoded once
    /// the class schema is known.
    InstanceBaseline {
        class_id: Option<u32>,
        bytes: Vec<u8>,
        bits: usize,
    },
    GameRulesCreation { class_name: String },
    QueryPort(u32),
    Raw { bytes: Vec<u8>, bits: usize },
}

impl EntryData {
    /// Raw payload bits as `(bytes, bit_len)`, when kept.
    #[must_use]
    pub fn raw_bits(&self) -> Option<(&[u8], usize)> {
        match self {
            Self::InstanceBaseline { bytes, bits, .. } | Self::Raw { bytes, bits } => {
                Some((bytes, *bits))
            }
            _ => None,
        }
    }
}

/// Player description carried by `userinfo` entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerInfo {
    /// Present on the split-screen engine.
    pub xuid: Option<u64>,
    pub name: String,
    pub user_id: i32,
    pub guid: String,
    pub friends_id: u32,
    pub friends_name: String,
    pub fake_player: bool,
    pub is_hltv: bool,
    pub custom_files: [u32; 4],
    pub files_downloaded: u8,
}

impl PlayerInfo {
    /// Reads the fixed-size engine structure.
    pub fn read(reader: &mut BitReader<'_>, new_engine: bool) -> CodecResult<Self> {
        let xuid = if new_engine {
            Some(reader.read_u64()?)
        } else {
            None
        };
        let name = reader.read_string_of_length(MAX_PLAYER_NAME_LENGTH)?;
        let user_id = reader.read_i32()?;
        let guid = reader.read_string_of_length(SIGNED_GUID_LENGTH)?;
        reader.skip_bytes(3)?;
        let friends_id = reader.read_u32()?;
        let friends_name = reader.read_string_of_length(MAX_PLAYER_NAME_LENGTH)?;
        let fake_player = reader.read_u8()? != 0;
        let is_hltv = reader.read_u8()? != 0;
        reader.skip_bytes(2)?;
        let mut custom_files = [0; 4];
        for file in &mut custom_files {
            *file = reader.read_u32()?;
        }
        let files_downloaded = reader.read_u8()?;
        Ok(Self {
            xuid,
            name,
            user_id,
            guid,
            friends_id,
            friends_name,
            fake_player,
            is_hltv,
            custom_files,
            files_downloaded,
        })
    }
}

/// How entry payloads are decoded during an update.
#[derive(Debug, Clone, Copy)]
pub struct PayloadDecoding {
    /// Decode payloads by table name; otherwise keep raw bits.
    pub typed: bool,
    /// Player info carries a leading xuid.
    pub new_engine: bool,
}

impl PayloadDecoding {
    #[must_use]
    pub fn new(facts: &ProtocolFacts, typed: bool) -> Self {
        Self {
            typed,
            new_engine: facts.is_new_engine(),
        }
    }
}

/// A named, growable table of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct StringTable {
    pub id: usize,
    pub name: String,
    pub max_entries: u32,
    pub user_data_fixed_size: bool,
    pub user_data_size: u32,
    pub user_data_size_bits: u32,
    pub flags: u32,
    entries: Vec<StringTableEntry>,
    classes: Vec<StringTableEntry>,
    readable: bool,
}

impl StringTable {
    /// Creates an empty readable table.
    #[must_use]
    pub fn new(name: impl Into<String>, max_entries: u32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            max_entries,
            user_data_fixed_size: false,
            user_data_size: 0,
            user_data_size_bits: 0,
            flags: 0,
            entries: Vec::new(),
            classes: Vec::new(),
            readable: true,
        }
    }

    /// Sets a fixed user data size.
    #[must_use]
    pub const fn with_fixed_user_data(mut self, size: u32, size_bits: u32) -> Self {
        self.user_data_fixed_size = true;
        self.user_data_size = size;
        self.user_data_size_bits = size_bits;
        self
    }

    /// Stand-in for a table the stream references but never created.
    #[must_use]
    pub fn placeholder(id: usize) -> Self {
        let mut table = Self::new(format!("<unknown table {id}>"), 0);
        table.id = id;
        table.readable = false;
        table
    }

    /// Returns `false` once an update failed or for placeholders.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.readable
    }

    /// Marks the table not readable for the rest of the file.
    pub fn mark_not_readable(&mut self) {
        self.readable = false;
    }

    /// Entries, or `None` if the table is not readable.
    #[must_use]
    pub fn entries(&self) -> Option<&[StringTableEntry]> {
        self.readable.then_some(self.entries.as_slice())
    }

    /// Client-side entries from a `StringTables` frame.
    #[must_use]
    pub fn classes(&self) -> Option<&[StringTableEntry]> {
        self.readable.then_some(self.classes.as_slice())
    }

    /// Entry at `index`, or `None` if absent or not readable.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&StringTableEntry> {
        self.entries()?.get(index)
    }

    /// First entry named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&StringTableEntry> {
        self.entries()?.iter().find(|entry| entry.name == name)
    }

    /// Number of entries, or `None` if the table is not readable.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.entries().map(<[_]>::len)
    }

    /// Whether the table holds no entries, or `None` if it is not readable.
    #[must_use]
    pub fn is_empty(&self) -> Option<bool> {
        self.entries().map(<[_]>::is_empty)
    }

    /// Width of an explicit entry index.
    #[must_use]
    pub fn entry_index_bits(&self) -> u32 {
        if self.max_entries <= 1 {
            0
        } else {
            self.max_entries.ilog2()
        }
    }

    /// Applies `changes` entry edits from `reader`. Returns the touched
    /// entry indices. A failure marks the table not readable.
    pub fn update(
        &mut self,
        reader: &mut BitReader<'_>,
        changes: u32,
        payloads: PayloadDecoding,
    ) -> CodecResult<Vec<usize>> {
        if !self.readable {
            return Err(CodecError::TableNotReadable {
                table: self.name.clone(),
            });
        }
        match self.read_changes(reader, changes, payloads) {
            Ok(touched) => Ok(touched),
            Err(err) => {
                self.readable = false;
                Err(err)
            }
        }
    }

    fn read_changes(
        &mut self,
        reader: &mut BitReader<'_>,
        changes: u32,
        payloads: PayloadDecoding,
    ) -> CodecResult<Vec<usize>> {
        let index_bits = self.entry_index_bits();
        let mut history: VecDeque<String> = VecDeque::with_capacity(STRING_HISTORY_SIZE);
        let mut touched = Vec::with_capacity(changes as usize);
        let mut last_index: i64 = -1;

        for _ in 0..changes {
            let index = if reader.read_bool()? {
                (last_index + 1) as u32
            } else {
                reader.read_bits(index_bits)?
            };
            if index >= self.max_entries {
                return Err(CodecError::EntryIndexOutOfRange {
                    index,
                    max_entries: self.max_entries,
                });
            }
            last_index = i64::from(index);

            let name = if reader.read_bool()? {
                Some(read_entry_name(reader, &history)?)
            } else {
                None
            };

            let user_data = if reader.read_bool()? {
                let bits = if self.user_data_fixed_size {
                    self.user_data_size_bits as usize
                } else {
                    reader.read_bits(MAX_USERDATA_BITS)? as usize * 8
                };
                Some(read_bit_vec(reader, bits)?)
            } else {
                None
            };

            let slot = index as usize;
            let (position, resolved) = if slot < self.entries.len() {
                let existing = self.entries[slot].name.clone();
                if let Some((bytes, bits)) = user_data {
                    let data = decode_entry_data(&self.name, &existing, bytes, bits, payloads)?;
                    self.entries[slot].data = Some(data);
                }
                (slot, existing)
            } else {
                let name = name.unwrap_or_default();
                let data = match user_data {
                    Some((bytes, bits)) => {
                        Some(decode_entry_data(&self.name, &name, bytes, bits, payloads)?)
                    }
                    None => None,
                };
                self.entries.push(StringTableEntry {
                    name: name.clone(),
                    data,
                });
                (self.entries.len() - 1, name)
            };
            touched.push(position);

            if history.len() == STRING_HISTORY_SIZE {
                history.pop_front();
            }
            history.push_back(resolved);
        }

        debug!(table = %self.name, changes, entries = self.entries.len(), "string table updated");
        Ok(touched)
    }
}

/// Types an entry payload by its table's name.
pub fn decode_entry_data(
    table: &str,
    entry_name: &str,
    bytes: Vec<u8>,
    bits: usize,
    payloads: PayloadDecoding,
) -> CodecResult<EntryData> {
    if table == "instancebaseline" {
        return Ok(EntryData::InstanceBaseline {
            class_id: entry_name.parse().ok(),
            bytes,
            bits,
        });
    }
    if !payloads.typed {
        return Ok(EntryData::Raw { bytes, bits });
    }
    let mut reader = BitReader::new(&bytes);
    let data = match table {
        "userinfo" if bits > 0 => {
            EntryData::PlayerInfo(PlayerInfo::read(&mut reader, payloads.new_engine)?)
        }
        "soundprecache" | "modelprecache" | "genericprecache" | "decalprecache" if bits >= 2 => {
            EntryData::Precache {
                flags: reader.read_bits(2)? as u8,
            }
        }
        "GameRulesCreation" => EntryData::GameRulesCreation {
            class_name: reader.read_cstring()?,
        },
        "QueryPort" => EntryData::QueryPort(reader.read_u32()?),
        _ => EntryData::Raw { bytes, bits },
    };
    Ok(data)
}

/// Reads a name, optionally reusing a prefix of a recent name.
fn read_entry_name(reader: &mut BitReader<'_>, history: &VecDeque<String>) -> CodecResult<String> {
    if !reader.read_bool()? {
        return Ok(reader.read_cstring()?);
    }
    let index = reader.read_bits(HISTORY_INDEX_BITS)?;
    let prefix_len = reader.read_bits(HISTORY_PREFIX_BITS)? as usize;
    let base = history
        .get(index as usize)
        .ok_or(CodecError::HistoryIndexOutOfRange {
            index,
            len: history.len(),
        })?;
    let suffix = reader.read_cstring()?;
    let prefix = &base.as_bytes()[..prefix_len.min(base.len())];
    let mut name = String::from_utf8_lossy(prefix).into_owned();
    name.push_str(&suffix);
    Ok(name)
}

/// Reads `bits` bits into bytes, the last one partially filled.
pub(crate) fn read_bit_vec(reader: &mut BitReader<'_>, bits: usize) -> CodecResult<(Vec<u8>, usize)> {
    let mut bytes = reader.read_bytes(bits / 8)?;
    let tail = (bits % 8) as u32;
    if tail > 0 {
        bytes.push(reader.read_bits(tail)? as u8);
    }
    Ok((bytes, bits))
}

/// One table from a `StringTables` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub name: String,
    pub entries: Vec<(String, Option<Vec<u8>>)>,
    pub classes: Vec<(String, Option<Vec<u8>>)>,
}

/// Contents of a `StringTables` frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringTablesSnapshot {
    pub tables: Vec<TableSnapshot>,
}

impl StringTablesSnapshot {
    pub fn read(reader: &mut BitReader<'_>) -> CodecResult<Self> {
        let count = reader.read_u8()?;
        let mut tables = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = reader.read_cstring()?;
            let entries = read_snapshot_entries(reader)?;
            let classes = if reader.read_bool()? {
                read_snapshot_entries(reader)?
            } else {
                Vec::new()
            };
            tables.push(TableSnapshot {
                name,
                entries,
                classes,
            });
        }
        Ok(Self { tables })
    }
}

fn read_snapshot_entries(reader: &mut BitReader<'_>) -> CodecResult<Vec<(String, Option<Vec<u8>>)>> {
    let count = reader.read_u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.read_cstring()?;
        let data = if reader.read_bool()? {
            let len = reader.read_u16()?;
            Some(reader.read_bytes(len as usize)?)
        } else {
            None
        };
        out.push((name, data));
    }
    Ok(out)
}

/// Every table currently known for the file, indexed by table id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringTableManager {
    tables: Vec<StringTable>,
}

impl StringTableManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `table` under the next id and returns that id.
    pub fn create(&mut self, mut table: StringTable) -> usize {
        let id = self.tables.len();
        table.id = id;
        self.tables.push(table);
        id
    }

    /// Drops every table.
    pub fn reset(&mut self) {
        self.tables.clear();
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&StringTable> {
        self.tables.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut StringTable> {
        self.tables.get_mut(id)
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&StringTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Table `id`, filling any gap up to it with not-readable placeholders.
    /// The `bool` is `true` if the table had to be substituted.
    pub fn get_or_placeholder(&mut self, id: usize) -> (&mut StringTable, bool) {
        let substituted = id >= self.tables.len();
        while self.tables.len() <= id {
            let next = self.tables.len();
            self.tables.push(StringTable::placeholder(next));
        }
        (&mut self.tables[id], substituted)
    }

    #[must_use]
    pub fn tables(&self) -> &[StringTable] {
        &self.tables
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Replaces table contents with a frame snapshot. Tables not yet known
    /// are created. Returns the ids of the tables written.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &StringTablesSnapshot,
        payloads: PayloadDecoding,
    ) -> CodecResult<Vec<usize>> {
        let mut written = Vec::with_capacity(snapshot.tables.len());
        for table in &snapshot.tables {
            let id = match self.tables.iter().position(|t| t.name == table.name) {
                Some(id) => id,
                None => {
                    let max = (table.entries.len() as u32).max(1).next_power_of_two();
                    self.create(StringTable::new(table.name.clone(), max))
                }
            };
            let entries = convert_entries(&table.name, &table.entries, payloads)?;
            let classes = convert_entries(&table.name, &table.classes, payloads)?;
            let target = &mut self.tables[id];
            target.entries = entries;
            target.classes = classes;
            target.readable = true;
            written.push(id);
        }
        Ok(written)
    }
}

fn convert_entries(
    table: &str,
    raw: &[(String, Option<Vec<u8>>)],
    payloads: PayloadDecoding,
) -> CodecResult<Vec<StringTableEntry>> {
    raw.iter()
        .map(|(name, data)| {
            let data = match data {
                Some(bytes) => {
                    let bits = bytes.len() * 8;
                    Some(decode_entry_data(table, name, bytes.clone(), bits, payloads)?)
                }
                None => None,
            };
            Ok(StringTableEntry {
                name: name.clone(),
                data,
            })
        })
        .collect()
}

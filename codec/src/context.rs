//! Mutable state of one decode pass.

use std::fmt;

use bitstream::{BitReader, BitSpan};
use protocol::ProtocolFacts;
use schema::{flatten_all, DataTables, FlattenedClass, Reorder, ServerClass};
use tracing::{debug, warn};

use crate::entity::{EntityDecoder, EntityPass, PacketEntitiesShape};
use crate::error::{CodecError, CodecResult};
use crate::game_event::GameEventList;
use crate::limits::ParseOptions;
use crate::snapshot::{Baselines, EntitySnapshot};
use crate::string_table::{
    EntryData, PayloadDecoding, StringTable, StringTableManager, StringTablesSnapshot,
};

const BASELINE_TABLE: &str = "instancebaseline";

/// Baseline bits waiting for the class schema.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingBaseline {
    class_id: u32,
    bytes: Vec<u8>,
    bits: usize,
}

/// Everything a decode pass mutates. One per file.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    pub facts: ProtocolFacts,
    pub options: ParseOptions,
    /// Tick of the frame being decoded.
    pub tick: i32,
    pub frame_index: usize,
    pub string_tables: StringTableManager,
    pub data_tables: Option<DataTables>,
    pub flattened: Vec<FlattenedClass>,
    pub baselines: Baselines,
    pub entities: EntitySnapshot,
    pub game_events: GameEventList,
    pending_baselines: Vec<PendingBaseline>,
    error_log: Vec<String>,
    dropped_errors: usize,
}

impl DecodeContext {
    #[must_use]
    pub fn new(facts: ProtocolFacts, options: ParseOptions) -> Self {
        Self {
            facts,
            options,
            tick: 0,
            frame_index: 0,
            string_tables: StringTableManager::new(),
            data_tables: None,
            flattened: Vec::new(),
            baselines: Baselines::new(),
            entities: EntitySnapshot::new(),
            game_events: GameEventList::new(),
            pending_baselines: Vec::new(),
            error_log: Vec::new(),
            dropped_errors: 0,
        }
    }

    /// Appends a line to the error log, up to the configured cap.
    pub fn log(&mut self, line: String) {
        warn!(tick = self.tick, frame = self.frame_index, "{line}");
        if self.error_log.len() < self.options.max_error_log {
            self.error_log.push(line);
        } else {
            self.dropped_errors += 1;
        }
    }

    /// Logs a unit that was demoted to its unknown placeholder.
    pub fn log_demoted(
        &mut self,
        kind: impl fmt::Debug,
        byte: u8,
        span: BitSpan,
        buffer: &[u8],
        err: &CodecError,
    ) {
        let hex = BitReader::at(buffer, span)
            .map(|reader| reader.to_hex_string())
            .unwrap_or_default();
        let line = format!(
            "[tick {}] {kind:?} (byte {byte}) failed after {} bits: {err}; hex: {hex}",
            self.tick, span.len
        );
        self.log(line);
    }

    #[must_use]
    pub fn error_log(&self) -> &[String] {
        &self.error_log
    }

    /// Lines that did not fit under the cap.
    #[must_use]
    pub const fn dropped_errors(&self) -> usize {
        self.dropped_errors
    }

    /// Server classes of the installed data tables.
    #[must_use]
    pub fn classes(&self) -> &[ServerClass] {
        self.data_tables
            .as_ref()
            .map_or(&[], |tables| tables.classes.as_slice())
    }

    fn payloads(&self) -> PayloadDecoding {
        PayloadDecoding::new(&self.facts, self.options.decode_string_table_payloads)
    }

    /// Flattens `tables` and decodes any baselines that were waiting for it.
    ///
    /// Replacing earlier tables drops entities and baselines decoded against
    /// the old layout; baselines are decoded again from the
    /// `instancebaseline` table.
    pub fn install_data_tables(&mut self, tables: DataTables) -> CodecResult<()> {
        let reorder = Reorder::for_priority(self.facts.has_prop_priority);
        let flattened = flatten_all(&tables, reorder)?;
        let replacing = self.data_tables.is_some();
        debug!(
            classes = flattened.len(),
            ?reorder,
            replacing,
            "installed data tables"
        );
        self.flattened = flattened;
        self.data_tables = Some(tables);

        if replacing {
            self.entities = EntitySnapshot::new();
            self.baselines = Baselines::new();
        }
        for pending in std::mem::take(&mut self.pending_baselines) {
            self.decode_baseline(pending);
        }
        if replacing {
            if let Some(id) = self
                .string_tables
                .tables()
                .iter()
                .position(|table| table.name == BASELINE_TABLE)
            {
                let len = self.string_tables.get(id).and_then(StringTable::len).unwrap_or(0);
                let all: Vec<usize> = (0..len).collect();
                self.collect_baselines(id, &all);
            }
        }
        Ok(())
    }

    fn decode_baseline(&mut self, pending: PendingBaseline) {
        if self.flattened.is_empty() {
            self.pending_baselines.push(pending);
            return;
        }
        let decoder = EntityDecoder::new(&self.flattened, self.facts.delta_new_way);
        let span = BitSpan::new(0, pending.bits);
        let result = BitReader::at(&pending.bytes, span)
            .map_err(CodecError::from)
            .and_then(|mut reader| decoder.decode_baseline(&mut reader, pending.class_id));
        match result {
            Ok(props) => self.baselines.set(pending.class_id, props),
            Err(err) => self.log(format!(
                "[tick {}] baseline for class {} failed: {err}",
                self.tick, pending.class_id
            )),
        }
    }

    /// Queues or decodes baselines for `touched` entries of table `id`.
    fn collect_baselines(&mut self, id: usize, touched: &[usize]) {
        let Some(table) = self.string_tables.get(id) else {
            return;
        };
        if table.name != BASELINE_TABLE {
            return;
        }
        let mut found = Vec::new();
        for &index in touched {
            if let Some(EntryData::InstanceBaseline {
                class_id: Some(class_id),
                bytes,
                bits,
            }) = table.entry(index).and_then(|entry| entry.data.as_ref())
            {
                found.push(PendingBaseline {
                    class_id: *class_id,
                    bytes: bytes.clone(),
                    bits: *bits,
                });
            }
        }
        for pending in found {
            self.decode_baseline(pending);
        }
    }

    fn log_table_failure(&mut self, id: usize, err: &CodecError) {
        let name = self
            .string_tables
            .get(id)
            .map_or_else(|| format!("#{id}"), |table| table.name.clone());
        self.log(format!(
            "[tick {}] string table '{name}' not readable: {err}",
            self.tick
        ));
    }

    /// Registers `table` and applies its initial entries.
    pub fn create_string_table(
        &mut self,
        table: StringTable,
        data: &mut BitReader<'_>,
        num_entries: u32,
    ) -> usize {
        let id = self.string_tables.create(table);
        self.update_string_table(id, data, num_entries);
        id
    }

    /// Applies an update to table `id`. Unknown ids get a not-readable
    /// placeholder. Returns the touched entries.
    pub fn update_string_table(
        &mut self,
        id: usize,
        data: &mut BitReader<'_>,
        changes: u32,
    ) -> Vec<usize> {
        let payloads = self.payloads();
        let (table, substituted) = self.string_tables.get_or_placeholder(id);
        let result = if substituted {
            Err(CodecError::TableNotReadable {
                table: table.name.clone(),
            })
        } else {
            table.update(data, changes, payloads)
        };
        match result {
            Ok(touched) => {
                self.collect_baselines(id, &touched);
                touched
            }
            Err(err) => {
                self.log_table_failure(id, &err);
                Vec::new()
            }
        }
    }

    /// Marks table `id` not readable after a failure outside the entry list.
    pub fn fail_string_table(&mut self, id: usize, err: &CodecError) {
        if let Some(table) = self.string_tables.get_mut(id) {
            table.mark_not_readable();
        }
        self.log_table_failure(id, err);
    }

    /// Overwrites tables from a `StringTables` frame.
    pub fn apply_string_tables(&mut self, snapshot: &StringTablesSnapshot) -> CodecResult<()> {
        let payloads = self.payloads();
        let written = self.string_tables.apply_snapshot(snapshot, payloads)?;
        for id in written {
            let len = self.string_tables.get(id).and_then(StringTable::len).unwrap_or(0);
            let all: Vec<usize> = (0..len).collect();
            self.collect_baselines(id, &all);
        }
        Ok(())
    }

    /// A new server connection: tables are rebuilt from scratch.
    pub fn reset_for_server_info(&mut self) {
        debug!(tables = self.string_tables.len(), "resetting string tables");
        self.string_tables.reset();
    }

    /// Applies a `SvcPacketEntities` payload.
    pub fn apply_packet_entities(
        &mut self,
        data: &mut BitReader<'_>,
        shape: PacketEntitiesShape,
    ) -> EntityPass {
        if self.flattened.is_empty() {
            return EntityPass {
                updates: Vec::new(),
                error: Some(CodecError::MissingSchema),
            };
        }
        let decoder = EntityDecoder::new(&self.flattened, self.facts.delta_new_way);
        let pass =
            decoder.apply_packet_entities(data, shape, &mut self.entities, &mut self.baselines);
        self.entities.engine_tick = self.tick;
        pass
    }
}

//! Demo fixtures built bit by bit.

#![allow(dead_code)]

use bitstream::BitWriter;
use codec::CMD_INFO_SIZE;
use protocol::{DemoHeader, MessageKind, PacketKind, ProtocolFacts};
use schema::DataTables;

/// Writes a header and then frames for one protocol pair.
pub struct DemoBuilder {
    writer: BitWriter,
    facts: ProtocolFacts,
}

impl DemoBuilder {
    pub fn new(demo_protocol: i32, network_protocol: i32) -> Self {
        let mut writer = BitWriter::new();
        DemoHeader::minimal(demo_protocol, network_protocol).write(&mut writer);
        Self {
            writer,
            facts: ProtocolFacts::new(demo_protocol, network_protocol),
        }
    }

    pub fn facts(&self) -> &ProtocolFacts {
        &self.facts
    }

    pub fn messages(&self) -> MessageWriter {
        MessageWriter::new(self.facts.clone())
    }

    pub fn frame_header(&mut self, kind: PacketKind, tick: i32) -> &mut Self {
        self.writer.write_u8(self.facts.packet_byte(kind).unwrap());
        self.writer.write_i32(tick);
        if self.facts.has_player_slot {
            self.writer.write_u8(0);
        }
        self
    }

    pub fn stop(&mut self, tick: i32) -> &mut Self {
        self.frame_header(PacketKind::Stop, tick)
    }

    pub fn sync_tick(&mut self, tick: i32) -> &mut Self {
        self.frame_header(PacketKind::SyncTick, tick)
    }

    pub fn console(&mut self, tick: i32, text: &str) -> &mut Self {
        self.frame_header(PacketKind::ConsoleCmd, tick);
        self.writer.write_i32(text.len() as i32 + 1);
        self.writer.write_cstring(text);
        self
    }

    /// A `Packet` frame carrying the given message bits.
    pub fn packet(&mut self, tick: i32, messages: MessageWriter) -> &mut Self {
        self.frame_header(PacketKind::Packet, tick);
        for _ in 0..self.facts.cmd_info_slots {
            self.writer.write_bytes(&[0; CMD_INFO_SIZE]);
        }
        self.writer.write_i32(1);
        self.writer.write_i32(2);
        let bytes = messages.finish();
        self.writer.write_i32(bytes.len() as i32);
        self.writer.write_bytes(&bytes);
        self
    }

    /// A `DataTables` frame holding `tables`.
    pub fn data_tables(&mut self, tick: i32, tables: &DataTables) -> &mut Self {
        let mut body = BitWriter::new();
        tables.write(&mut body, &self.facts).unwrap();
        let bytes = body.finish();
        self.frame_header(PacketKind::DataTables, tick);
        self.writer.write_i32(bytes.len() as i32);
        self.writer.write_bytes(&bytes);
        self
    }

    /// Arbitrary raw bytes, for corrupt tails.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.writer.write_bytes(bytes);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

/// Message selectors and bodies for one packet.
pub struct MessageWriter {
    writer: BitWriter,
    facts: ProtocolFacts,
}

impl MessageWriter {
    pub fn new(facts: ProtocolFacts) -> Self {
        Self {
            writer: BitWriter::new(),
            facts,
        }
    }

    pub fn facts(&self) -> &ProtocolFacts {
        &self.facts
    }

    pub fn message(&mut self, kind: MessageKind, body: impl FnOnce(&mut BitWriter)) -> &mut Self {
        let byte = self.facts.message_byte(kind).unwrap();
        self.writer
            .write_bits(u32::from(byte), self.facts.message_type_bits)
            .unwrap();
        body(&mut self.writer);
        self
    }

    pub fn set_pause(&mut self, paused: bool) -> &mut Self {
        self.message(MessageKind::SvcSetPause, |w| w.write_bool(paused))
    }

    pub fn print(&mut self, text: &str) -> &mut Self {
        self.message(MessageKind::SvcPrint, |w| w.write_cstring(text))
    }

    /// Pads to a whole byte with zeros.
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

/// String table entry edits with the sequential-index bit set and no
/// history or user data.
pub fn entry_names(names: &[&str]) -> BitWriter {
    let mut writer = BitWriter::new();
    for name in names {
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bool(false);
        writer.write_cstring(name);
        writer.write_bool(false);
    }
    writer
}

//! Indented text rendering of decoded objects.

use std::fmt::{self, Write as _};

use protocol::DemoHeader;

use crate::demo::Demo;
use crate::entity::PropValue;
use crate::frame::{Frame, Packet};
use crate::message::{MessageBody, NetMessage};
use crate::snapshot::EntitySnapshot;
use crate::string_table::{EntryData, StringTable};
use crate::user_message::{UserMessage, UserMessageBody};

const INDENT: &str = "  ";

/// Line-oriented output with nesting.
#[derive(Debug, Default)]
pub struct Renderer {
    out: String,
    depth: usize,
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl fmt::Display) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        let _ = writeln!(self.out, "{text}");
    }

    /// Renders `f`'s lines one level deeper.
    pub fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

pub trait Render {
    fn render_into(&self, out: &mut Renderer);
}

/// Renders `value` to a string.
pub fn render<T: Render + ?Sized>(value: &T) -> String {
    let mut out = Renderer::new();
    value.render_into(&mut out);
    out.finish()
}

impl Render for DemoHeader {
    fn render_into(&self, out: &mut Renderer) {
        out.line(format_args!(
            "demo protocol {}, network protocol {}",
            self.demo_protocol, self.network_protocol
        ));
        out.nested(|out| {
            out.line(format_args!("server: {}", self.server_name));
            out.line(format_args!("client: {}", self.client_name));
            out.line(format_args!("map: {}", self.map_name));
            out.line(format_args!("game: {}", self.game_directory));
            out.line(format_args!(
                "playback: {:.3}s, {} ticks, {} frames",
                self.playback_time, self.playback_ticks, self.playback_frames
            ));
        });
    }
}

impl Render for Demo {
    fn render_into(&self, out: &mut Renderer) {
        self.header().render_into(out);
        out.line(format_args!("variant: {:?}", self.facts().variant));
        for frame in self.frames() {
            frame.render_into(out);
        }
        if !self.error_log().is_empty() {
            out.line(format_args!("{} errors", self.error_log().len()));
            out.nested(|out| {
                for line in self.error_log() {
                    out.line(line);
                }
            });
        }
    }
}

impl Render for Frame {
    fn render_into(&self, out: &mut Renderer) {
        let slot = self
            .player_slot
            .map(|slot| format!(" slot {slot}"))
            .unwrap_or_default();
        out.line(format_args!(
            "[{}] tick {}{slot} {:?} (byte {})",
            self.index, self.tick, self.kind, self.byte
        ));
        out.nested(|out| match &self.packet {
            Packet::SignOn(data) | Packet::Packet(data) => {
                out.line(format_args!(
                    "seq in {} out {}, {} messages",
                    data.in_sequence,
                    data.out_sequence,
                    data.messages.len()
                ));
                for message in &data.messages {
                    message.render_into(out);
                }
            }
            Packet::ConsoleCmd(cmd) => out.line(format_args!("{:?}", cmd.command)),
            Packet::UserCmd(cmd) => out.line(format_args!(
                "sequence {}, command {:?}, buttons {:?}",
                cmd.sequence, cmd.cmd.command_number, cmd.cmd.buttons
            )),
            Packet::DataTables(tables) => out.line(format_args!(
                "{} send tables, {} server classes",
                tables.table_count, tables.class_count
            )),
            Packet::StringTables(tables) => {
                for table in &tables.snapshot.tables {
                    out.line(format_args!("{}: {} entries", table.name, table.entries.len()));
                }
            }
            Packet::CustomData(data) => out.line(format_args!(
                "type {}, {} bytes",
                data.kind,
                data.data.len / 8
            )),
            Packet::Unknown(span) => out.line(format_args!("unknown, {} bits", span.len)),
            Packet::SyncTick | Packet::Stop => {}
        });
    }
}

impl Render for NetMessage {
    fn render_into(&self, out: &mut Renderer) {
        let summary = summarize(&self.body);
        if summary.is_empty() {
            out.line(format_args!("{:?}", self.kind));
        } else {
            out.line(format_args!("{:?}: {summary}", self.kind));
        }
        match &self.body {
            MessageBody::SvcUserMessage(msg) => out.nested(|out| msg.message.render_into(out)),
            MessageBody::SvcGameEvent(msg) => out.nested(|out| {
                for (key, value) in &msg.event.values {
                    out.line(format_args!("{key} = {value:?}"));
                }
            }),
            _ => {}
        }
    }
}

fn summarize(body: &MessageBody) -> String {
    match body {
        MessageBody::NetDisconnect(msg) => format!("{:?}", msg.reason),
        MessageBody::NetTick(msg) => format!("tick {}", msg.tick),
        MessageBody::NetStringCmd(msg) => format!("{:?}", msg.command),
        MessageBody::NetSetConVar(msg) => msg
            .convars
            .iter()
            .map(|cvar| format!("{} = {:?}", cvar.name, cvar.value))
            .collect::<Vec<_>>()
            .join(", "),
        MessageBody::NetSignOnState(msg) => format!("state {}", msg.state),
        MessageBody::SvcPrint(msg) => format!("{:?}", msg.text.trim_end()),
        MessageBody::SvcServerInfo(msg) => {
            format!("map {}, {} classes", msg.map_name, msg.max_classes)
        }
        MessageBody::SvcSetPause(msg) => format!("paused {}", msg.paused),
        MessageBody::SvcCreateStringTable(msg) => {
            format!("{} ({} entries)", msg.name, msg.num_entries)
        }
        MessageBody::SvcUpdateStringTable(msg) => {
            format!("table {}, {} changed", msg.table_id, msg.changed_entries)
        }
        MessageBody::SvcSounds(msg) => format!("{} sounds", msg.sounds.len()),
        MessageBody::SvcGameEvent(msg) => msg.event.name.clone(),
        MessageBody::SvcGameEventList(msg) => format!("{} events", msg.descriptors.len()),
        MessageBody::SvcPacketEntities(msg) => {
            format!("{} entries, {} applied", msg.updated_entries, msg.updates.len())
        }
        MessageBody::Unknown(span) => format!("unknown, {} bits", span.len),
        _ => String::new(),
    }
}

impl Render for UserMessage {
    fn render_into(&self, out: &mut Renderer) {
        match &self.body {
            UserMessageBody::Unimplemented => out.line(format_args!(
                "{:?} (byte {}), {} bits",
                self.kind, self.byte, self.span.len
            )),
            body => out.line(format_args!("{body:?}")),
        }
    }
}

impl Render for StringTable {
    fn render_into(&self, out: &mut Renderer) {
        let Some(entries) = self.entries() else {
            out.line(format_args!("{} (not readable)", self.name));
            return;
        };
        out.line(format_args!(
            "{} ({}/{} entries)",
            self.name,
            entries.len(),
            self.max_entries
        ));
        out.nested(|out| {
            for (index, entry) in entries.iter().enumerate() {
                match &entry.data {
                    None => out.line(format_args!("[{index}] {}", entry.name)),
                    Some(EntryData::PlayerInfo(info)) => out.line(format_args!(
                        "[{index}] {}: {} (user id {})",
                        entry.name, info.name, info.user_id
                    )),
                    Some(data) => out.line(format_args!("[{index}] {}: {data:?}", entry.name)),
                }
            }
        });
    }
}

impl Render for EntitySnapshot {
    fn render_into(&self, out: &mut Renderer) {
        out.line(format_args!(
            "{} entities at tick {}",
            self.live_count(),
            self.engine_tick
        ));
        out.nested(|out| {
            for (index, entity) in self.live() {
                out.line(format_args!(
                    "[{index}] class {} serial {}{}",
                    entity.server_class,
                    entity.serial,
                    if entity.in_pvs { "" } else { " (dormant)" }
                ));
                out.nested(|out| {
                    for (prop, value) in entity.props.iter().enumerate() {
                        if let Some(value) = value {
                            out.line(format_args!("#{prop} = {}", PropDisplay(value)));
                        }
                    }
                });
            }
        });
    }
}

struct PropDisplay<'a>(&'a PropValue);

impl fmt::Display for PropDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            PropValue::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            PropValue::String(text) => write!(f, "{text:?}"),
            PropValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", PropDisplay(item))?;
                }
                f.write_str("]")
            }
            PropValue::Unparsed => f.write_str("<unparsed>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PropArray;

    #[test]
    fn nested_lines_are_indented() {
        let mut out = Renderer::new();
        out.line("a");
        out.nested(|out| {
            out.line("b");
            out.nested(|out| out.line("c"));
        });
        assert_eq!(out.finish(), "a\n  b\n    c\n");
    }

    #[test]
    fn header_renders_map() {
        let mut header = DemoHeader::minimal(3, 24);
        header.map_name = "testchmb_a_00".into();
        let text = render(&header);
        assert!(text.starts_with("demo protocol 3, network protocol 24\n"));
        assert!(text.contains("  map: testchmb_a_00\n"));
    }

    #[test]
    fn unreadable_table_says_so() {
        let table = StringTable::placeholder(4);
        assert_eq!(render(&table), "<unknown table 4> (not readable)\n");
    }

    #[test]
    fn entities_render_props() {
        let mut snapshot = EntitySnapshot::new();
        let baseline: PropArray = vec![Some(PropValue::Int(100)), None];
        snapshot
            .enter_pvs(3, 1, 7, true, Some(&baseline))
            .unwrap();
        let text = render(&snapshot);
        assert!(text.contains("[3] class 1 serial 7\n"));
        assert!(text.contains("    #0 = 100\n"));
    }
}

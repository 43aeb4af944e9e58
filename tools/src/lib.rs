//! Inspection, search and patching tools for Source engine demos.
//!
//! This crate backs the `srcdem-tools` binary:
//!
//! - Summarize a demo: header, frame and message counts, string tables
//! - List the error log of a decode pass
//! - Search console commands
//! - Rewrite console commands in place and write the patched file
//!
//! Reports are plain serializable structs so the CLI can print them as text
//! or JSON.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use bitstream::BitWriter;
use codec::{Demo, Packet};
use protocol::{DemoHeader, GameVariant};
use serde::Serialize;

/// Summary of one decoded demo.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub header: DemoHeader,
    pub variant: GameVariant,
    pub frames: usize,
    pub frames_by_kind: BTreeMap<String, usize>,
    pub messages: usize,
    pub messages_by_kind: BTreeMap<String, usize>,
    pub unknown_messages: usize,
    pub string_tables: Vec<TableSummary>,
    pub server_classes: usize,
    pub live_entities: usize,
    pub game_events: usize,
    pub errors: usize,
    pub dropped_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    /// `None` when the table was marked not readable.
    pub entries: Option<usize>,
    pub max_entries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub errors: Vec<String>,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandHit {
    pub frame: usize,
    pub tick: i32,
    pub command: String,
}

/// Outcome of [`patch_console_commands`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub bytes: Vec<u8>,
    pub patched: Vec<CommandHit>,
}

#[must_use]
pub fn inspect_demo(demo: &Demo) -> InspectReport {
    let mut frames_by_kind = BTreeMap::new();
    for frame in demo.frames() {
        *frames_by_kind.entry(format!("{:?}", frame.kind)).or_insert(0) += 1;
    }

    let mut messages = 0;
    let mut unknown_messages = 0;
    let mut messages_by_kind = BTreeMap::new();
    for (_, message) in demo.messages() {
        messages += 1;
        if message.is_unknown() {
            unknown_messages += 1;
        }
        *messages_by_kind
            .entry(format!("{:?}", message.kind))
            .or_insert(0) += 1;
    }

    let string_tables = demo
        .string_tables()
        .tables()
        .iter()
        .map(|table| TableSummary {
            name: table.name.clone(),
            entries: table.entries().map(<[_]>::len),
            max_entries: table.max_entries,
        })
        .collect();

    InspectReport {
        header: demo.header().clone(),
        variant: demo.facts().variant,
        frames: demo.frames().len(),
        frames_by_kind,
        messages,
        messages_by_kind,
        unknown_messages,
        string_tables,
        server_classes: demo.flattened_classes().len(),
        live_entities: demo.entities().live_count(),
        game_events: demo.game_events().len(),
        errors: demo.error_log().len(),
        dropped_errors: demo.dropped_errors(),
    }
}

#[must_use]
pub fn error_report(demo: &Demo) -> ErrorReport {
    ErrorReport {
        errors: demo.error_log().to_vec(),
        dropped: demo.dropped_errors(),
    }
}

/// Console commands containing `text`, in file order.
#[must_use]
pub fn search_console(demo: &Demo, text: &str) -> Vec<CommandHit> {
    demo.console_commands_containing(text)
        .map(|(frame, cmd)| CommandHit {
            frame: frame.index,
            tick: frame.tick,
            command: cmd.command.clone(),
        })
        .collect()
}

/// Replaces `from` with `to` in every console command that contains it.
///
/// Each command's bytes are swapped for the new NUL-terminated text and its
/// `i32` size prefix is rewritten. Commands are patched from the end of the
/// file backwards so earlier spans stay valid.
pub fn patch_console_commands(demo: &Demo, from: &str, to: &str) -> Result<PatchOutcome> {
    anyhow::ensure!(!from.is_empty(), "search text must not be empty");

    let mut targets: Vec<_> = demo
        .frames()
        .iter()
        .filter_map(|frame| match &frame.packet {
            Packet::ConsoleCmd(cmd) if cmd.command.contains(from) => Some((frame, cmd)),
            _ => None,
        })
        .collect();
    targets.sort_by_key(|(_, cmd)| std::cmp::Reverse(cmd.data.start));

    let mut writer = BitWriter::from_bytes(demo.bytes().to_vec());
    let mut patched = Vec::with_capacity(targets.len());
    for (frame, cmd) in targets {
        let command = cmd.command.replace(from, to);
        let mut text = command.clone().into_bytes();
        text.push(0);
        let size = i32::try_from(text.len()).context("patched command too long")?;
        let size_at = cmd
            .data
            .start
            .checked_sub(32)
            .context("console command without size prefix")?;

        writer
            .remove_bits_at_index(cmd.data.start, cmd.data.len)
            .with_context(|| format!("remove command in frame {}", frame.index))?;
        writer
            .insert_bits_at_index(cmd.data.start, &text, text.len() * 8)
            .with_context(|| format!("insert command in frame {}", frame.index))?;
        writer
            .edit_bits_at_index(size_at, &size.to_le_bytes(), 32)
            .with_context(|| format!("rewrite size in frame {}", frame.index))?;

        patched.push(CommandHit {
            frame: frame.index,
            tick: frame.tick,
            command,
        });
    }
    patched.reverse();

    Ok(PatchOutcome {
        bytes: writer.finish(),
        patched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::ParseOptions;
    use protocol::{PacketKind, ProtocolFacts};

    fn frame_header(writer: &mut BitWriter, facts: &ProtocolFacts, kind: PacketKind, tick: i32) {
        writer.write_u8(facts.packet_byte(kind).unwrap());
        writer.write_i32(tick);
    }

    fn demo_with_commands(commands: &[&str]) -> Demo {
        let facts = ProtocolFacts::new(3, 24);
        let mut writer = BitWriter::new();
        DemoHeader::minimal(3, 24).write(&mut writer);
        for (tick, command) in commands.iter().enumerate() {
            frame_header(&mut writer, &facts, PacketKind::ConsoleCmd, tick as i32);
            writer.write_i32(command.len() as i32 + 1);
            writer.write_cstring(command);
        }
        frame_header(&mut writer, &facts, PacketKind::Stop, commands.len() as i32);
        Demo::parse(writer.finish(), &ParseOptions::for_testing()).unwrap()
    }

    #[test]
    fn inspect_counts_frames() {
        let demo = demo_with_commands(&["+jump", "-jump"]);
        let report = inspect_demo(&demo);
        assert_eq!(report.frames, 3);
        assert_eq!(report.frames_by_kind.get("ConsoleCmd"), Some(&2));
        assert_eq!(report.frames_by_kind.get("Stop"), Some(&1));
        assert_eq!(report.messages, 0);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn inspect_report_serializes() {
        let demo = demo_with_commands(&["echo hi"]);
        let json = serde_json::to_string(&inspect_demo(&demo)).unwrap();
        assert!(json.contains("\"frames\":2"));
        assert!(json.contains("\"demo_protocol\":3"));
    }

    #[test]
    fn search_finds_commands() {
        let demo = demo_with_commands(&["+jump", "sv_cheats 1", "-jump"]);
        let hits = search_console(&demo, "jump");
        let ticks: Vec<_> = hits.iter().map(|hit| hit.tick).collect();
        assert_eq!(ticks, vec![0, 2]);
    }

    #[test]
    fn patch_rewrites_commands_and_sizes() {
        let demo = demo_with_commands(&["+jump", "sv_cheats 1", "-jump"]);
        let outcome = patch_console_commands(&demo, "jump", "duck_long").unwrap();
        assert_eq!(outcome.patched.len(), 2);
        assert_eq!(outcome.patched[0].command, "+duck_long");

        let patched = Demo::parse(outcome.bytes, &ParseOptions::for_testing()).unwrap();
        let commands: Vec<_> = patched
            .console_commands_matching(|_| true)
            .map(|(_, cmd)| cmd.command.clone())
            .collect();
        assert_eq!(commands, vec!["+duck_long", "sv_cheats 1", "-duck_long"]);
        assert!(patched.error_log().is_empty());
        assert_eq!(patched.frames().len(), 4);
    }

    #[test]
    fn patch_without_matches_keeps_bytes() {
        let demo = demo_with_commands(&["+jump"]);
        let outcome = patch_console_commands(&demo, "attack", "reload").unwrap();
        assert!(outcome.patched.is_empty());
        assert_eq!(outcome.bytes, demo.bytes());
    }

    #[test]
    fn patch_rejects_empty_search() {
        let demo = demo_with_commands(&["+jump"]);
        assert!(patch_console_commands(&demo, "", "x").is_err());
    }
}

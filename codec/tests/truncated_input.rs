mod common;

use bitstream::BitWriter;
use codec::{lzss, Demo, ParseOptions};
use common::{entry_names, DemoBuilder};
use protocol::{MessageKind, UserMessageKind};
use proptest::prelude::*;

fn busy_demo() -> Vec<u8> {
    let mut demo = DemoBuilder::new(3, 24);
    let facts = demo.facts().clone();
    let battery = facts.user_message_byte(UserMessageKind::Battery).unwrap();

    let entries = entry_names(&["0", "1", "2"]).finish();
    let block = lzss::compress(&entries);
    let mut compressed = BitWriter::new();
    compressed.write_u32(entries.len() as u32);
    compressed.write_u32(block.len() as u32);
    compressed.write_bytes(&block);
    let compressed = compressed.finish();

    let mut messages = demo.messages();
    messages.message(MessageKind::SvcCreateStringTable, |w| {
        w.write_cstring("userinfo");
        w.write_u16(256);
        w.write_bits(3, 9).unwrap();
        w.write_bits(
            (compressed.len() * 8) as u32,
            facts.create_string_table_length_bits,
        )
        .unwrap();
        w.write_bool(false);
        w.write_bool(true);
        w.write_bytes(&compressed);
    });
    messages.set_pause(true);
    messages.message(MessageKind::SvcUserMessage, |w| {
        w.write_u8(battery);
        w.write_bits(16, facts.user_message_length_bits).unwrap();
        w.write_u16(90);
    });
    messages.print("round 1\n");

    demo.sync_tick(0)
        .console(0, "connect localhost")
        .packet(1, messages)
        .console(2, "+attack")
        .stop(3);
    demo.finish()
}

#[test]
fn busy_demo_decodes_cleanly() {
    let demo = Demo::parse(busy_demo(), &ParseOptions::for_testing()).unwrap();
    assert_eq!(demo.frames().len(), 5);
    assert_eq!(demo.messages().count(), 4);
    assert!(demo.error_log().is_empty(), "{:?}", demo.error_log());
    let table = demo.string_tables().by_name("userinfo").unwrap();
    assert_eq!(table.len(), Some(3));
}

proptest! {
    #[test]
    fn truncated_demo_never_panics(cut in 0usize..2048) {
        let bytes = busy_demo();
        let cut = cut.min(bytes.len());
        let _ = Demo::parse(bytes[..cut].to_vec(), &ParseOptions::for_testing());
    }

    #[test]
    fn flipped_byte_never_panics(index in 0usize..2048, value in any::<u8>()) {
        let mut bytes = busy_demo();
        let index = index % bytes.len();
        bytes[index] = value;
        let _ = Demo::parse(bytes, &ParseOptions::for_testing());
    }

    #[test]
    fn garbage_after_header_never_panics(tail in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut demo = DemoBuilder::new(3, 24);
        demo.raw(&tail);
        let _ = Demo::parse(demo.finish(), &ParseOptions::for_testing());
    }
}

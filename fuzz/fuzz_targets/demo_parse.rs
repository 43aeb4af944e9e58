#![no_main]

use bitstream::BitWriter;
use codec::{Demo, ParseOptions};
use libfuzzer_sys::fuzz_target;
use protocol::DemoHeader;

fuzz_target!(|data: &[u8]| {
    let options = ParseOptions::for_testing();

    // Raw input, mostly rejected at the header.
    let _ = Demo::parse(data.to_vec(), &options);

    // A valid header for the first byte's protocol pair, then the input as frames.
    let Some((&selector, frames)) = data.split_first() else {
        return;
    };
    let (demo_protocol, network_protocol) = match selector % 5 {
        0 => (2, 7),
        1 => (3, 14),
        2 => (3, 24),
        3 => (4, 2001),
        _ => (4, 2042),
    };
    let mut writer = BitWriter::new();
    DemoHeader::minimal(demo_protocol, network_protocol).write(&mut writer);
    writer.write_bytes(frames);
    let _ = Demo::parse(writer.finish(), &options);
});

#![no_main]

use codec::lzss;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = lzss::decompress(data);
    if let Ok(out) = lzss::decompress(&lzss::compress(data)) {
        assert_eq!(out, data);
    }
});

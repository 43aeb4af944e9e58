#![no_main]

use bitstream::BitReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = BitReader::new(data);
    let mut idx = 0usize;

    // Input bytes pick a bounded sequence of reads.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 8;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_bool();
            }
            1 => {
                let bits = u32::from(data[idx.saturating_sub(1)] % 32) + 1;
                let _ = reader.read_bits(bits);
            }
            2 => {
                let _ = reader.read_ubit_int();
            }
            3 => {
                let _ = reader.read_cstring();
            }
            4 => {
                let _ = reader.read_bit_coord();
            }
            5 => {
                let flags = data.get(idx).copied().unwrap_or(0);
                let _ = reader.read_bit_coord_mp(flags & 1 == 0, flags & 2 == 0);
            }
            6 => {
                let len = usize::from(data[idx.saturating_sub(1)]);
                if let Ok(mut sub) = reader.split_and_skip(len) {
                    let _ = sub.read_bits(8);
                }
            }
            _ => {
                let _ = reader.read_bit_normal();
            }
        }
    }
});

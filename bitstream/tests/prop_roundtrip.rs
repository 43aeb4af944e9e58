use bitstream::{BitReader, BitWriter};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Bool(bool),
    Bits { bits: u32, value: u32 },
    SBits { bits: u32, value: i32 },
    U8(u8),
    U32(u32),
    F32(u32),
    CString(String),
}

fn mask_value(bits: u32, value: u32) -> u32 {
    if bits >= 32 {
        value
    } else {
        value & ((1u32 << bits) - 1)
    }
}

fn clamp_signed(bits: u32, value: i32) -> i32 {
    let shift = 32 - bits;
    (value << shift) >> shift
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Bool),
        (0u32..=32, any::<u32>()).prop_map(|(bits, value)| Op::Bits {
            bits,
            value: mask_value(bits, value),
        }),
        (1u32..=32, any::<i32>()).prop_map(|(bits, value)| Op::SBits {
            bits,
            value: clamp_signed(bits, value),
        }),
        any::<u8>().prop_map(Op::U8),
        any::<u32>().prop_map(Op::U32),
        any::<u32>().prop_map(Op::F32),
        "[a-z]{0,12}".prop_map(Op::CString),
    ]
}

proptest! {
    #[test]
    fn prop_uint_roundtrip(bits in 0u32..=32, raw in any::<u32>()) {
        let value = mask_value(bits, raw);
        let mut writer = BitWriter::new();
        writer.write_bits(value, bits).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        prop_assert_eq!(reader.read_bits(bits).unwrap(), value);
    }

    #[test]
    fn prop_roundtrip_ops(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let mut writer = BitWriter::new();
        for op in &ops {
            match op {
                Op::Bool(b) => writer.write_bool(*b),
                Op::Bits { bits, value } => writer.write_bits(*value, *bits).unwrap(),
                Op::SBits { bits, value } => writer.write_sbits(*value, *bits).unwrap(),
                Op::U8(v) => writer.write_u8(*v),
                Op::U32(v) => writer.write_u32(*v),
                Op::F32(v) => writer.write_f32(f32::from_bits(*v)),
                Op::CString(s) => writer.write_cstring(s),
            }
        }

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        for op in &ops {
            match op {
                Op::Bool(b) => prop_assert_eq!(reader.read_bool().unwrap(), *b),
                Op::Bits { bits, value } => {
                    prop_assert_eq!(reader.read_bits(*bits).unwrap(), *value);
                }
                Op::SBits { bits, value } => {
                    prop_assert_eq!(reader.read_sbits(*bits).unwrap(), *value);
                }
                Op::U8(v) => prop_assert_eq!(reader.read_u8().unwrap(), *v),
                Op::U32(v) => prop_assert_eq!(reader.read_u32().unwrap(), *v),
                Op::F32(v) => prop_assert_eq!(reader.read_f32().unwrap().to_bits(), *v),
                Op::CString(s) => prop_assert_eq!(&reader.read_cstring().unwrap(), s),
            }
        }
    }

    #[test]
    fn prop_split_matches_sequential_reads(
        bytes in prop::collection::vec(any::<u8>(), 1..32),
        skip_frac in 0.0f64..1.0,
        take_frac in 0.0f64..1.0,
    ) {
        let total = bytes.len() * 8;
        let skip = ((total as f64) * skip_frac) as usize;
        let mut reader = BitReader::new(&bytes);
        reader.skip_bits(skip).unwrap();
        let k = ((reader.bits_remaining() as f64) * take_frac) as usize;

        let mut sub = reader.split(k).unwrap();
        prop_assert_eq!(sub.bits_remaining(), k);

        let mut sequential = reader.clone();
        for _ in 0..k {
            prop_assert_eq!(sub.read_bool().unwrap(), sequential.read_bool().unwrap());
        }
        prop_assert!(sub.read_bool().is_err());
        // split does not advance the parent.
        prop_assert_eq!(reader.bit_position(), skip);
    }

    #[test]
    fn prop_reads_never_panic(
        bytes in prop::collection::vec(any::<u8>(), 0..16),
        widths in prop::collection::vec(0u32..=40, 1..32),
    ) {
        let mut reader = BitReader::new(&bytes);
        for width in widths {
            let before = reader.bit_position();
            match reader.read_bits(width) {
                Ok(_) => prop_assert_eq!(reader.bit_position(), before + width as usize),
                Err(err) => {
                    prop_assert!(err.is_out_of_range());
                    prop_assert_eq!(reader.bit_position(), before);
                }
            }
        }
    }
}

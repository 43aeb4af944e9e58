//! Send-prop flag layouts.
//!
//! The engine renumbered its send-prop flags twice. Raw flags are read with
//! the variant's width and translated into one normalized [`PropFlags`] set
//! so that schema and entity code never look at raw bit positions.

/// Normalized send-prop flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropFlags(u32);

impl PropFlags {
    pub const UNSIGNED: u32 = 1 << 0;
    pub const COORD: u32 = 1 << 1;
    pub const NOSCALE: u32 = 1 << 2;
    pub const ROUNDDOWN: u32 = 1 << 3;
    pub const ROUNDUP: u32 = 1 << 4;
    pub const NORMAL: u32 = 1 << 5;
    pub const EXCLUDE: u32 = 1 << 6;
    pub const XYZE: u32 = 1 << 7;
    pub const INSIDE_ARRAY: u32 = 1 << 8;
    pub const PROXY_ALWAYS_YES: u32 = 1 << 9;
    pub const CHANGES_OFTEN: u32 = 1 << 10;
    pub const IS_A_VECTOR_ELEM: u32 = 1 << 11;
    pub const COLLAPSIBLE: u32 = 1 << 12;
    pub const COORD_MP: u32 = 1 << 13;
    pub const COORD_MP_LOWPRECISION: u32 = 1 << 14;
    pub const COORD_MP_INTEGRAL: u32 = 1 << 15;
    pub const CELL_COORD: u32 = 1 << 16;
    pub const CELL_COORD_LOWPRECISION: u32 = 1 << 17;
    pub const CELL_COORD_INTEGRAL: u32 = 1 << 18;

    /// Creates flags from normalized bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Translates raw wire flags in `layout` to the normalized set.
    /// Unknown raw bits are dropped.
    #[must_use]
    pub fn from_raw(raw: u32, layout: FlagLayout) -> Self {
        let mut bits = 0;
        for (raw_bit, flag) in layout.positions().iter().enumerate() {
            if raw & (1 << raw_bit) != 0 {
                bits |= flag;
            }
        }
        Self(bits)
    }

    /// Translates back to raw wire flags in `layout`. Flags the layout
    /// cannot express are dropped.
    #[must_use]
    pub fn to_raw(self, layout: FlagLayout) -> u32 {
        let mut raw = 0;
        for (raw_bit, flag) in layout.positions().iter().enumerate() {
            if self.0 & flag != 0 {
                raw |= 1 << raw_bit;
            }
        }
        raw
    }

    /// Returns the normalized bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit in `flag` is set.
    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// Raw send-prop flag numbering used by a protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlagLayout {
    /// 13 bits, original engine release.
    Legacy13,
    /// 16 bits, adds multiplayer coordinates.
    Legacy16,
    /// 19 bits, split-screen engine: cell coordinates, `CHANGES_OFTEN` moved
    /// to the top bit.
    Modern19,
}

const LEGACY: [u32; 16] = [
    PropFlags::UNSIGNED,
    PropFlags::COORD,
    PropFlags::NOSCALE,
    PropFlags::ROUNDDOWN,
    PropFlags::ROUNDUP,
    PropFlags::NORMAL,
    PropFlags::EXCLUDE,
    PropFlags::XYZE,
    PropFlags::INSIDE_ARRAY,
    PropFlags::PROXY_ALWAYS_YES,
    PropFlags::CHANGES_OFTEN,
    PropFlags::IS_A_VECTOR_ELEM,
    PropFlags::COLLAPSIBLE,
    PropFlags::COORD_MP,
    PropFlags::COORD_MP_LOWPRECISION,
    PropFlags::COORD_MP_INTEGRAL,
];

const MODERN: [u32; 19] = [
    PropFlags::UNSIGNED,
    PropFlags::COORD,
    PropFlags::NOSCALE,
    PropFlags::ROUNDDOWN,
    PropFlags::ROUNDUP,
    PropFlags::NORMAL,
    PropFlags::EXCLUDE,
    PropFlags::XYZE,
    PropFlags::INSIDE_ARRAY,
    PropFlags::PROXY_ALWAYS_YES,
    PropFlags::IS_A_VECTOR_ELEM,
    PropFlags::COLLAPSIBLE,
    PropFlags::COORD_MP,
    PropFlags::COORD_MP_LOWPRECISION,
    PropFlags::COORD_MP_INTEGRAL,
    PropFlags::CELL_COORD,
    PropFlags::CELL_COORD_LOWPRECISION,
    PropFlags::CELL_COORD_INTEGRAL,
    PropFlags::CHANGES_OFTEN,
];

impl FlagLayout {
    /// Width of the raw flag field.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Legacy13 => 13,
            Self::Legacy16 => 16,
            Self::Modern19 => 19,
        }
    }

    /// Normalized flag for each raw bit position.
    fn positions(self) -> &'static [u32] {
        match self {
            Self::Legacy13 => &LEGACY[..13],
            Self::Legacy16 => &LEGACY,
            Self::Modern19 => &MODERN,
        }
    }
}

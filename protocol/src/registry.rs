//! Protocol version registry.
//!
//! A demo's two header integers select a [`GameVariant`]; the variant fixes
//! every field width and dispatch table used by the rest of the decoder.

use crate::dispatch::{
    DispatchKind, DispatchTable, MessageKind, PacketKind, PropKind, UserMessageKind,
    MESSAGES_2007, MESSAGES_L4D, MESSAGES_OE, MESSAGES_PORTAL2, MESSAGES_STEAMPIPE,
    PACKETS_DEMO2, PACKETS_DEMO3, PACKETS_DEMO4, PROPS, PROPS_OE, USER_MESSAGES_HL2,
    USER_MESSAGES_PORTAL2,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::props::FlagLayout;

/// Known game builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameVariant {
    /// Half-Life 2 original engine (2, 7).
    Hl2Oe,
    /// Portal 1 "unpack" build (3, 14).
    Portal1Unpack,
    /// Portal 1 build 3420 (3, 15).
    Portal1_3420,
    /// Portal 1 on Steampipe (3, 24).
    Portal1Steampipe,
    /// Portal 2 (4, 2001).
    Portal2,
    /// Left 4 Dead (4, 37).
    L4d1,
    /// Left 4 Dead 2 (4, 2000..=2042 other than 2001).
    L4d2,
    /// Unrecognized combination.
    Unknown,
}

impl GameVariant {
    /// Classifies a header's version pair.
    #[must_use]
    pub const fn classify(demo_protocol: i32, network_protocol: i32) -> Self {
        match (demo_protocol, network_protocol) {
            (2, 7) => Self::Hl2Oe,
            (3, 14) => Self::Portal1Unpack,
            (3, 15) => Self::Portal1_3420,
            (3, 24) => Self::Portal1Steampipe,
            (4, 2001) => Self::Portal2,
            (4, 37) => Self::L4d1,
            (4, 2000..=2042) => Self::L4d2,
            _ => Self::Unknown,
        }
    }

    /// Variant whose defaults stand in for an unrecognized pair.
    #[must_use]
    pub const fn fallback_for(demo_protocol: i32) -> Option<Self> {
        match demo_protocol {
            2 => Some(Self::Hl2Oe),
            3 => Some(Self::Portal1Steampipe),
            4 => Some(Self::Portal2),
            _ => None,
        }
    }

    /// Split-screen engine branch (demo protocol 4).
    #[must_use]
    pub const fn is_new_engine(self) -> bool {
        matches!(self, Self::Portal2 | Self::L4d1 | Self::L4d2)
    }

    #[must_use]
    pub const fn is_l4d(self) -> bool {
        matches!(self, Self::L4d1 | Self::L4d2)
    }

    /// Builds that still use the five-bit message selector.
    const fn is_five_bit(self) -> bool {
        matches!(self, Self::Hl2Oe | Self::Portal1Unpack | Self::Portal1_3420)
    }
}

/// Immutable per-file protocol facts.
///
/// Computed once from the header and shared by every decoder. Construction is
/// total: unrecognized pairs log a warning and borrow the defaults of the
/// demo protocol's reference build, or carry no tables at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFacts {
    /// Demo container version from the header.
    pub demo_protocol: i32,
    /// Network protocol version from the header.
    pub network_protocol: i32,
    /// The classified variant; `Unknown` even when defaults were borrowed.
    pub variant: GameVariant,
    /// The variant actually used for widths and tables.
    pub effective: Option<GameVariant>,

    /// Width of the message-type selector.
    pub message_type_bits: u32,
    /// Width of `SvcUserMessage`'s length.
    pub user_message_length_bits: u32,
    /// Raw send-prop flag layout.
    pub prop_flag_layout: FlagLayout,
    /// Send props carry an 8-bit priority.
    pub has_prop_priority: bool,
    /// Width of a sound's flags.
    pub sound_flag_bits: u32,
    /// Width of sound indices in sounds and prefetches.
    pub sound_index_bits: u32,
    /// Width of model indices in decals.
    pub model_index_bits: u32,
    /// Width of `SvcCreateStringTable`'s data length.
    pub create_string_table_length_bits: u32,
    /// `SvcCreateStringTable` carries a compressed flag.
    pub string_table_compression: bool,
    /// Width of `SvcTempEntities`'s data length.
    pub temp_entities_length_bits: u32,
    /// `NetTick` carries host frame time.
    pub net_tick_has_frame_time: bool,
    /// `SvcServerInfo` carries a map MD5 instead of a CRC.
    pub server_info_has_md5: bool,
    /// `NetSignOnState` carries player ids and the map name.
    pub extended_signon_state: bool,
    /// Frames carry a player slot byte.
    pub has_player_slot: bool,
    /// Number of `CmdInfo` records before a packet's sequence numbers.
    pub cmd_info_slots: usize,
    /// Entity deltas carry the small-delta field index encoding.
    pub delta_new_way: bool,

    packets: Option<DispatchTable<PacketKind>>,
    messages: Option<DispatchTable<MessageKind>>,
    user_messages: Option<DispatchTable<UserMessageKind>>,
    prop_kinds: Option<DispatchTable<PropKind>>,
}

impl ProtocolFacts {
    /// Derives facts for a header's version pair.
    #[must_use]
    pub fn new(demo_protocol: i32, network_protocol: i32) -> Self {
        let variant = GameVariant::classify(demo_protocol, network_protocol);
        let effective = if variant == GameVariant::Unknown {
            let fallback = GameVariant::fallback_for(demo_protocol);
            tracing::warn!(
                demo_protocol,
                network_protocol,
                ?fallback,
                "unrecognized demo protocol combination"
            );
            fallback
        } else {
            Some(variant)
        };
        Self::build(demo_protocol, network_protocol, variant, effective)
    }

    fn build(
        demo_protocol: i32,
        network_protocol: i32,
        variant: GameVariant,
        effective: Option<GameVariant>,
    ) -> Self {
        let v = effective.unwrap_or(GameVariant::Unknown);
        let new_engine = v.is_new_engine();
        let tables = effective.is_some();

        let packets = match v {
            _ if !tables => None,
            GameVariant::Hl2Oe => Some(DispatchTable::new(&PACKETS_DEMO2)),
            _ if new_engine => Some(DispatchTable::new(&PACKETS_DEMO4)),
            _ => Some(DispatchTable::new(&PACKETS_DEMO3)),
        };
        let messages = match v {
            GameVariant::Hl2Oe => Some(DispatchTable::new(&MESSAGES_OE)),
            GameVariant::Portal1Unpack | GameVariant::Portal1_3420 => {
                Some(DispatchTable::new(&MESSAGES_2007))
            }
            GameVariant::Portal1Steampipe => Some(DispatchTable::new(&MESSAGES_STEAMPIPE)),
            GameVariant::Portal2 => Some(DispatchTable::new(&MESSAGES_PORTAL2)),
            GameVariant::L4d1 | GameVariant::L4d2 => Some(DispatchTable::new(&MESSAGES_L4D)),
            GameVariant::Unknown => None,
        };
        let user_messages = match v {
            GameVariant::Portal2 => Some(DispatchTable::new(&USER_MESSAGES_PORTAL2)),
            GameVariant::L4d1 | GameVariant::L4d2 | GameVariant::Unknown => None,
            _ => Some(DispatchTable::new(&USER_MESSAGES_HL2)),
        };
        let prop_kinds = match v {
            _ if !tables => None,
            GameVariant::Hl2Oe => Some(DispatchTable::new(&PROPS_OE)),
            _ => Some(DispatchTable::new(&PROPS)),
        };

        let prop_flag_layout = match v {
            GameVariant::Hl2Oe => FlagLayout::Legacy13,
            _ if new_engine => FlagLayout::Modern19,
            _ => FlagLayout::Legacy16,
        };

        Self {
            demo_protocol,
            network_protocol,
            variant,
            effective,
            message_type_bits: if v.is_five_bit() { 5 } else { 6 },
            user_message_length_bits: if new_engine { 12 } else { 11 },
            prop_flag_layout,
            has_prop_priority: new_engine,
            sound_flag_bits: if new_engine { 13 } else { 9 },
            sound_index_bits: if new_engine { 14 } else { 13 },
            model_index_bits: if new_engine { 13 } else { 11 },
            create_string_table_length_bits: if new_engine { 21 } else { 20 },
            string_table_compression: network_protocol >= 15,
            temp_entities_length_bits: if new_engine { 18 } else { 17 },
            net_tick_has_frame_time: v != GameVariant::Hl2Oe,
            server_info_has_md5: network_protocol >= 18,
            extended_signon_state: matches!(v, GameVariant::Portal2 | GameVariant::L4d2),
            has_player_slot: new_engine,
            cmd_info_slots: match v {
                GameVariant::Portal2 => 2,
                GameVariant::L4d1 | GameVariant::L4d2 => 4,
                _ => 1,
            },
            delta_new_way: demo_protocol >= 3 && v != GameVariant::Hl2Oe,
            packets,
            messages,
            user_messages,
            prop_kinds,
        }
    }

    /// The variant used for widths and tables, or `Unknown`.
    #[must_use]
    pub fn layout_variant(&self) -> GameVariant {
        self.effective.unwrap_or(GameVariant::Unknown)
    }

    /// Split-screen engine branch.
    #[must_use]
    pub fn is_new_engine(&self) -> bool {
        self.layout_variant().is_new_engine()
    }

    /// Resolves a frame's packet byte.
    #[must_use]
    pub fn packet_kind(&self, byte: u8) -> PacketKind {
        lookup(self.packets.as_ref(), byte)
    }

    /// Resolves a message selector.
    #[must_use]
    pub fn message_kind(&self, byte: u8) -> MessageKind {
        lookup(self.messages.as_ref(), byte)
    }

    /// Resolves a user message type byte.
    #[must_use]
    pub fn user_message_kind(&self, byte: u8) -> UserMessageKind {
        lookup(self.user_messages.as_ref(), byte)
    }

    /// Resolves a send-prop type.
    #[must_use]
    pub fn prop_kind(&self, byte: u8) -> PropKind {
        lookup(self.prop_kinds.as_ref(), byte)
    }

    pub fn packet_byte(&self, kind: PacketKind) -> ProtocolResult<u8> {
        reverse(self.packets.as_ref(), kind, self.variant)
    }

    pub fn message_byte(&self, kind: MessageKind) -> ProtocolResult<u8> {
        reverse(self.messages.as_ref(), kind, self.variant)
    }

    pub fn user_message_byte(&self, kind: UserMessageKind) -> ProtocolResult<u8> {
        reverse(self.user_messages.as_ref(), kind, self.variant)
    }

    pub fn prop_kind_byte(&self, kind: PropKind) -> ProtocolResult<u8> {
        reverse(self.prop_kinds.as_ref(), kind, self.variant)
    }

    #[must_use]
    pub const fn packet_table(&self) -> Option<&DispatchTable<PacketKind>> {
        self.packets.as_ref()
    }

    #[must_use]
    pub const fn message_table(&self) -> Option<&DispatchTable<MessageKind>> {
        self.messages.as_ref()
    }

    #[must_use]
    pub const fn user_message_table(&self) -> Option<&DispatchTable<UserMessageKind>> {
        self.user_messages.as_ref()
    }
}

fn lookup<K: DispatchKind>(table: Option<&DispatchTable<K>>, byte: u8) -> K {
    table.map_or(K::UNKNOWN, |t| t.kind(byte))
}

fn reverse<K: DispatchKind>(
    table: Option<&DispatchTable<K>>,
    kind: K,
    variant: GameVariant,
) -> ProtocolResult<u8> {
    table
        .and_then(|t| t.byte(kind))
        .ok_or_else(|| ProtocolError::NoMapping {
            axis: K::AXIS,
            kind: format!("{kind:?}"),
            variant,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_pairs() {
        assert_eq!(GameVariant::classify(2, 7), GameVariant::Hl2Oe);
        assert_eq!(GameVariant::classify(3, 14), GameVariant::Portal1Unpack);
        assert_eq!(GameVariant::classify(3, 15), GameVariant::Portal1_3420);
        assert_eq!(GameVariant::classify(3, 24), GameVariant::Portal1Steampipe);
        assert_eq!(GameVariant::classify(4, 2001), GameVariant::Portal2);
        assert_eq!(GameVariant::classify(4, 37), GameVariant::L4d1);
        assert_eq!(GameVariant::classify(4, 2000), GameVariant::L4d2);
        assert_eq!(GameVariant::classify(4, 2042), GameVariant::L4d2);
        assert_eq!(GameVariant::classify(4, 2043), GameVariant::Unknown);
    }

    #[test]
    fn unknown_pair_borrows_demo_protocol_defaults() {
        let facts = ProtocolFacts::new(3, 99);
        assert_eq!(facts.variant, GameVariant::Unknown);
        assert_eq!(facts.effective, Some(GameVariant::Portal1Steampipe));
        assert_eq!(facts.message_type_bits, 6);
        assert_eq!(facts.message_kind(11), MessageKind::SvcSetPause);
    }

    #[test]
    fn unknown_demo_protocol_has_no_tables() {
        let facts = ProtocolFacts::new(9, 1);
        assert_eq!(facts.effective, None);
        assert_eq!(facts.packet_kind(7), PacketKind::Unknown);
        assert_eq!(facts.message_kind(0), MessageKind::Unknown);
        assert!(matches!(
            facts.packet_byte(PacketKind::Stop),
            Err(ProtocolError::NoMapping { .. })
        ));
    }

    #[test]
    fn widths_follow_engine_generation() {
        let oe = ProtocolFacts::new(2, 7);
        assert_eq!(oe.message_type_bits, 5);
        assert_eq!(oe.prop_flag_layout, FlagLayout::Legacy13);
        assert!(!oe.net_tick_has_frame_time);
        assert_eq!(oe.prop_kind(3), PropKind::String);

        let p1 = ProtocolFacts::new(3, 24);
        assert_eq!(p1.message_type_bits, 6);
        assert_eq!(p1.prop_flag_layout, FlagLayout::Legacy16);
        assert_eq!(p1.user_message_length_bits, 11);
        assert!(p1.server_info_has_md5);
        assert_eq!(p1.prop_kind(3), PropKind::Vector2);

        let p2 = ProtocolFacts::new(4, 2001);
        assert_eq!(p2.prop_flag_layout, FlagLayout::Modern19);
        assert_eq!(p2.user_message_length_bits, 12);
        assert_eq!(p2.cmd_info_slots, 2);
        assert!(p2.has_player_slot);
        assert!(p2.has_prop_priority);
        assert!(p2.extended_signon_state);

        let l4d = ProtocolFacts::new(4, 37);
        assert_eq!(l4d.cmd_info_slots, 4);
        assert!(!l4d.extended_signon_state);
    }

    #[test]
    fn l4d_has_no_user_message_table() {
        let facts = ProtocolFacts::new(4, 2042);
        assert_eq!(facts.user_message_kind(3), UserMessageKind::Unknown);
        assert!(facts.user_message_byte(UserMessageKind::SayText).is_err());
    }

    #[test]
    fn packet_tables_by_demo_protocol() {
        assert_eq!(ProtocolFacts::new(2, 7).packet_kind(8), PacketKind::Invalid);
        assert_eq!(
            ProtocolFacts::new(3, 24).packet_kind(8),
            PacketKind::StringTables
        );
        assert_eq!(
            ProtocolFacts::new(4, 2001).packet_kind(8),
            PacketKind::CustomData
        );
    }

    #[test]
    fn message_selector_moves_on_new_engine() {
        let p1 = ProtocolFacts::new(3, 24);
        let p2 = ProtocolFacts::new(4, 2001);
        assert_eq!(p1.message_byte(MessageKind::SvcPrint).unwrap(), 7);
        assert_eq!(p2.message_byte(MessageKind::SvcPrint).unwrap(), 16);
        assert_eq!(p2.message_byte(MessageKind::SvcPaintmapData).unwrap(), 33);
        assert!(p1.message_byte(MessageKind::SvcPaintmapData).is_err());
    }
}

//! Byte <-> kind dispatch tables.
//!
//! Each dispatch axis (packet, message, user message, send-prop type) is an
//! ordered array of kinds indexed by wire byte, chosen per [`GameVariant`].
//! Tables are plain data; the reverse map is built once when a table is
//! constructed and never mutated afterwards.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// A dispatch kind with explicit placeholders for unmapped bytes.
pub trait DispatchKind: Copy + Eq + Hash + Debug + 'static {
    /// Axis name used in diagnostics.
    const AXIS: &'static str;
    /// The variant has no table for this axis.
    const UNKNOWN: Self;
    /// The byte is outside the table or names an unused slot.
    const INVALID: Self;
}

/// A byte-indexed lookup table with its reverse map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable<K: DispatchKind> {
    entries: &'static [Option<K>],
    reverse: HashMap<K, u8>,
}

impl<K: DispatchKind> DispatchTable<K> {
    /// Builds a table over `entries`; the first occurrence of a kind wins
    /// in the reverse map.
    #[must_use]
    pub fn new(entries: &'static [Option<K>]) -> Self {
        let mut reverse = HashMap::with_capacity(entries.len());
        for (byte, kind) in entries.iter().enumerate() {
            if let Some(kind) = kind {
                reverse.entry(*kind).or_insert(byte as u8);
            }
        }
        Self { entries, reverse }
    }

    /// Resolves a wire byte.
    #[must_use]
    pub fn kind(&self, byte: u8) -> K {
        self.entries
            .get(usize::from(byte))
            .copied()
            .flatten()
            .unwrap_or(K::INVALID)
    }

    /// Resolves a kind back to its wire byte.
    #[must_use]
    pub fn byte(&self, kind: K) -> Option<u8> {
        self.reverse.get(&kind).copied()
    }

    /// Number of slots, used or not.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(byte, kind)` for every used slot.
    pub fn mappings(&self) -> impl Iterator<Item = (u8, K)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(byte, kind)| kind.map(|k| (byte as u8, k)))
    }
}

/// Top-level frame packet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketKind {
    Unknown,
    Invalid,
    SignOn,
    Packet,
    SyncTick,
    ConsoleCmd,
    UserCmd,
    DataTables,
    Stop,
    CustomData,
    StringTables,
}

impl DispatchKind for PacketKind {
    const AXIS: &'static str = "packet";
    const UNKNOWN: Self = Self::Unknown;
    const INVALID: Self = Self::Invalid;
}

/// Net/svc message kinds nested in `SignOn` and `Packet` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MessageKind {
    Unknown,
    Invalid,
    NetNop,
    NetDisconnect,
    NetFile,
    NetSplitScreenUser,
    NetTick,
    NetStringCmd,
    NetSetConVar,
    NetSignOnState,
    SvcPrint,
    SvcServerInfo,
    SvcSendTable,
    SvcClassInfo,
    SvcSetPause,
    SvcCreateStringTable,
    SvcUpdateStringTable,
    SvcVoiceInit,
    SvcVoiceData,
    SvcSounds,
    SvcSetView,
    SvcFixAngle,
    SvcCrosshairAngle,
    SvcBspDecal,
    SvcSplitScreen,
    SvcUserMessage,
    SvcEntityMessage,
    SvcGameEvent,
    SvcPacketEntities,
    SvcTempEntities,
    SvcPrefetch,
    SvcMenu,
    SvcGameEventList,
    SvcGetCvarValue,
    SvcCmdKeyValues,
    SvcPaintmapData,
}

impl DispatchKind for MessageKind {
    const AXIS: &'static str = "message";
    const UNKNOWN: Self = Self::Unknown;
    const INVALID: Self = Self::Invalid;
}

/// User message kinds carried by `SvcUserMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UserMessageKind {
    Unknown,
    Invalid,
    Geiger,
    Train,
    HudText,
    SayText,
    SayText2,
    TextMsg,
    HudMsg,
    ResetHud,
    GameTitle,
    ItemPickup,
    ShowMenu,
    Shake,
    Tilt,
    Fade,
    VguiMenu,
    Rumble,
    Battery,
    Damage,
    VoiceMask,
    RequestState,
    CloseCaption,
    CloseCaptionDirect,
    HintText,
    KeyHintText,
    SquadMemberDied,
    AmmoDenied,
    CreditsMsg,
    EntityPortalled,
    KillCam,
    LogoTimeMsg,
    AchievementEvent,
    UpdateJalopyRadar,
    CurrentTimescale,
    DesiredTimescale,
    CreditsPortalMsg,
    InventoryFlash,
    IndicatorFlash,
    ControlHelperAnimate,
    TakePhoto,
    Flash,
    HudPingIndicator,
    OpenRadialMenu,
    AddLocator,
    MpMapCompleted,
    MpMapIncomplete,
    MpMapCompletedData,
    MpTauntEarned,
    MpTauntUnlocked,
    MpTauntLocked,
    MpAllTauntsLocked,
    PortalFxSurface,
    PaintWorld,
    PaintEntity,
    ChangePaintColor,
    PaintBombExplode,
    RemoveAllPaint,
    PaintAllSurfaces,
    RemovePaint,
    StartSurvey,
    ApplyHitBoxDamageEffect,
    SetMixLayerTriggerFactor,
    TransitionFade,
    ScoreboardTempUpdate,
    ChallengeModeCheatSession,
    ChallengeModeCloseAllUi,
}

impl DispatchKind for UserMessageKind {
    const AXIS: &'static str = "user message";
    const UNKNOWN: Self = Self::Unknown;
    const INVALID: Self = Self::Invalid;
}

/// Send-prop value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropKind {
    Unknown,
    Invalid,
    Int,
    Float,
    Vector3,
    Vector2,
    String,
    Array,
    DataTable,
}

impl DispatchKind for PropKind {
    const AXIS: &'static str = "send prop type";
    const UNKNOWN: Self = Self::Unknown;
    const INVALID: Self = Self::Invalid;
}

use MessageKind as M;
use PacketKind as P;
use UserMessageKind as U;

/// Demo protocol 2: no string table frames.
pub(crate) static PACKETS_DEMO2: [Option<PacketKind>; 8] = [
    None,
    Some(P::SignOn),
    Some(P::Packet),
    Some(P::SyncTick),
    Some(P::ConsoleCmd),
    Some(P::UserCmd),
    Some(P::DataTables),
    Some(P::Stop),
];

pub(crate) static PACKETS_DEMO3: [Option<PacketKind>; 9] = [
    None,
    Some(P::SignOn),
    Some(P::Packet),
    Some(P::SyncTick),
    Some(P::ConsoleCmd),
    Some(P::UserCmd),
    Some(P::DataTables),
    Some(P::Stop),
    Some(P::StringTables),
];

pub(crate) static PACKETS_DEMO4: [Option<PacketKind>; 10] = [
    None,
    Some(P::SignOn),
    Some(P::Packet),
    Some(P::SyncTick),
    Some(P::ConsoleCmd),
    Some(P::UserCmd),
    Some(P::DataTables),
    Some(P::Stop),
    Some(P::CustomData),
    Some(P::StringTables),
];

/// Original engine release; five-bit selector, so no slot above 31.
pub(crate) static MESSAGES_OE: [Option<MessageKind>; 31] = [
    Some(M::NetNop),
    Some(M::NetDisconnect),
    Some(M::NetFile),
    Some(M::NetTick),
    Some(M::NetStringCmd),
    Some(M::NetSetConVar),
    Some(M::NetSignOnState),
    Some(M::SvcPrint),
    Some(M::SvcServerInfo),
    Some(M::SvcSendTable),
    Some(M::SvcClassInfo),
    Some(M::SvcSetPause),
    Some(M::SvcCreateStringTable),
    Some(M::SvcUpdateStringTable),
    Some(M::SvcVoiceInit),
    Some(M::SvcVoiceData),
    None,
    Some(M::SvcSounds),
    Some(M::SvcSetView),
    Some(M::SvcFixAngle),
    Some(M::SvcCrosshairAngle),
    Some(M::SvcBspDecal),
    None,
    Some(M::SvcUserMessage),
    Some(M::SvcEntityMessage),
    Some(M::SvcGameEvent),
    Some(M::SvcPacketEntities),
    Some(M::SvcTempEntities),
    Some(M::SvcPrefetch),
    Some(M::SvcMenu),
    Some(M::SvcGameEventList),
];

/// Portal 1 unpack and 3420 builds add `SvcGetCvarValue`.
pub(crate) static MESSAGES_2007: [Option<MessageKind>; 32] = [
    Some(M::NetNop),
    Some(M::NetDisconnect),
    Some(M::NetFile),
    Some(M::NetTick),
    Some(M::NetStringCmd),
    Some(M::NetSetConVar),
    Some(M::NetSignOnState),
    Some(M::SvcPrint),
    Some(M::SvcServerInfo),
    Some(M::SvcSendTable),
    Some(M::SvcClassInfo),
    Some(M::SvcSetPause),
    Some(M::SvcCreateStringTable),
    Some(M::SvcUpdateStringTable),
    Some(M::SvcVoiceInit),
    Some(M::SvcVoiceData),
    None,
    Some(M::SvcSounds),
    Some(M::SvcSetView),
    Some(M::SvcFixAngle),
    Some(M::SvcCrosshairAngle),
    Some(M::SvcBspDecal),
    None,
    Some(M::SvcUserMessage),
    Some(M::SvcEntityMessage),
    Some(M::SvcGameEvent),
    Some(M::SvcPacketEntities),
    Some(M::SvcTempEntities),
    Some(M::SvcPrefetch),
    Some(M::SvcMenu),
    Some(M::SvcGameEventList),
    Some(M::SvcGetCvarValue),
];

/// Steampipe builds widen the selector to six bits and add `SvcCmdKeyValues`.
pub(crate) static MESSAGES_STEAMPIPE: [Option<MessageKind>; 33] = [
    Some(M::NetNop),
    Some(M::NetDisconnect),
    Some(M::NetFile),
    Some(M::NetTick),
    Some(M::NetStringCmd),
    Some(M::NetSetConVar),
    Some(M::NetSignOnState),
    Some(M::SvcPrint),
    Some(M::SvcServerInfo),
    Some(M::SvcSendTable),
    Some(M::SvcClassInfo),
    Some(M::SvcSetPause),
    Some(M::SvcCreateStringTable),
    Some(M::SvcUpdateStringTable),
    Some(M::SvcVoiceInit),
    Some(M::SvcVoiceData),
    None,
    Some(M::SvcSounds),
    Some(M::SvcSetView),
    Some(M::SvcFixAngle),
    Some(M::SvcCrosshairAngle),
    Some(M::SvcBspDecal),
    None,
    Some(M::SvcUserMessage),
    Some(M::SvcEntityMessage),
    Some(M::SvcGameEvent),
    Some(M::SvcPacketEntities),
    Some(M::SvcTempEntities),
    Some(M::SvcPrefetch),
    Some(M::SvcMenu),
    Some(M::SvcGameEventList),
    Some(M::SvcGetCvarValue),
    Some(M::SvcCmdKeyValues),
];

/// Split-screen engine (Left 4 Dead series).
pub(crate) static MESSAGES_L4D: [Option<MessageKind>; 33] = [
    Some(M::NetNop),
    Some(M::NetDisconnect),
    Some(M::NetFile),
    Some(M::NetSplitScreenUser),
    Some(M::NetTick),
    Some(M::NetStringCmd),
    Some(M::NetSetConVar),
    Some(M::NetSignOnState),
    Some(M::SvcServerInfo),
    Some(M::SvcSendTable),
    Some(M::SvcClassInfo),
    Some(M::SvcSetPause),
    Some(M::SvcCreateStringTable),
    Some(M::SvcUpdateStringTable),
    Some(M::SvcVoiceInit),
    Some(M::SvcVoiceData),
    Some(M::SvcPrint),
    Some(M::SvcSounds),
    Some(M::SvcSetView),
    Some(M::SvcFixAngle),
    Some(M::SvcCrosshairAngle),
    Some(M::SvcBspDecal),
    Some(M::SvcSplitScreen),
    Some(M::SvcUserMessage),
    Some(M::SvcEntityMessage),
    Some(M::SvcGameEvent),
    Some(M::SvcPacketEntities),
    Some(M::SvcTempEntities),
    Some(M::SvcPrefetch),
    Some(M::SvcMenu),
    Some(M::SvcGameEventList),
    Some(M::SvcGetCvarValue),
    Some(M::SvcCmdKeyValues),
];

/// Portal 2 adds `SvcPaintmapData`.
pub(crate) static MESSAGES_PORTAL2: [Option<MessageKind>; 34] = [
    Some(M::NetNop),
    Some(M::NetDisconnect),
    Some(M::NetFile),
    Some(M::NetSplitScreenUser),
    Some(M::NetTick),
    Some(M::NetStringCmd),
    Some(M::NetSetConVar),
    Some(M::NetSignOnState),
    Some(M::SvcServerInfo),
    Some(M::SvcSendTable),
    Some(M::SvcClassInfo),
    Some(M::SvcSetPause),
    Some(M::SvcCreateStringTable),
    Some(M::SvcUpdateStringTable),
    Some(M::SvcVoiceInit),
    Some(M::SvcVoiceData),
    Some(M::SvcPrint),
    Some(M::SvcSounds),
    Some(M::SvcSetView),
    Some(M::SvcFixAngle),
    Some(M::SvcCrosshairAngle),
    Some(M::SvcBspDecal),
    Some(M::SvcSplitScreen),
    Some(M::SvcUserMessage),
    Some(M::SvcEntityMessage),
    Some(M::SvcGameEvent),
    Some(M::SvcPacketEntities),
    Some(M::SvcTempEntities),
    Some(M::SvcPrefetch),
    Some(M::SvcMenu),
    Some(M::SvcGameEventList),
    Some(M::SvcGetCvarValue),
    Some(M::SvcCmdKeyValues),
    Some(M::SvcPaintmapData),
];

/// Half-Life 2 and Portal 1 user messages.
pub(crate) static USER_MESSAGES_HL2: [Option<UserMessageKind>; 27] = [
    Some(U::Geiger),
    Some(U::Train),
    Some(U::HudText),
    Some(U::SayText),
    Some(U::SayText2),
    Some(U::TextMsg),
    Some(U::HudMsg),
    Some(U::ResetHud),
    Some(U::GameTitle),
    Some(U::ItemPickup),
    Some(U::ShowMenu),
    Some(U::Shake),
    Some(U::Fade),
    Some(U::VguiMenu),
    Some(U::Rumble),
    Some(U::Battery),
    Some(U::Damage),
    Some(U::VoiceMask),
    Some(U::RequestState),
    Some(U::CloseCaption),
    Some(U::HintText),
    Some(U::KeyHintText),
    Some(U::SquadMemberDied),
    Some(U::AmmoDenied),
    Some(U::CreditsMsg),
    Some(U::EntityPortalled),
    Some(U::KillCam),
];

pub(crate) static USER_MESSAGES_PORTAL2: [Option<UserMessageKind>; 63] = [
    Some(U::Geiger),
    Some(U::Train),
    Some(U::HudText),
    Some(U::SayText),
    Some(U::SayText2),
    Some(U::TextMsg),
    Some(U::HudMsg),
    Some(U::ResetHud),
    Some(U::GameTitle),
    Some(U::ItemPickup),
    Some(U::ShowMenu),
    Some(U::Shake),
    Some(U::Tilt),
    Some(U::Fade),
    Some(U::VguiMenu),
    Some(U::Rumble),
    Some(U::Battery),
    Some(U::Damage),
    Some(U::VoiceMask),
    Some(U::RequestState),
    Some(U::CloseCaption),
    Some(U::CloseCaptionDirect),
    Some(U::HintText),
    Some(U::KeyHintText),
    Some(U::SquadMemberDied),
    Some(U::AmmoDenied),
    Some(U::CreditsMsg),
    Some(U::LogoTimeMsg),
    Some(U::AchievementEvent),
    Some(U::UpdateJalopyRadar),
    Some(U::CurrentTimescale),
    Some(U::DesiredTimescale),
    Some(U::CreditsPortalMsg),
    Some(U::InventoryFlash),
    Some(U::IndicatorFlash),
    Some(U::ControlHelperAnimate),
    Some(U::TakePhoto),
    Some(U::Flash),
    Some(U::HudPingIndicator),
    Some(U::OpenRadialMenu),
    Some(U::AddLocator),
    Some(U::MpMapCompleted),
    Some(U::MpMapIncomplete),
    Some(U::MpMapCompletedData),
    Some(U::MpTauntEarned),
    Some(U::MpTauntUnlocked),
    Some(U::MpTauntLocked),
    Some(U::MpAllTauntsLocked),
    Some(U::PortalFxSurface),
    Some(U::PaintWorld),
    Some(U::PaintEntity),
    Some(U::ChangePaintColor),
    Some(U::PaintBombExplode),
    Some(U::RemoveAllPaint),
    Some(U::PaintAllSurfaces),
    Some(U::RemovePaint),
    Some(U::StartSurvey),
    Some(U::ApplyHitBoxDamageEffect),
    Some(U::SetMixLayerTriggerFactor),
    Some(U::TransitionFade),
    Some(U::ScoreboardTempUpdate),
    Some(U::ChallengeModeCheatSession),
    Some(U::ChallengeModeCloseAllUi),
];

/// The original release has no two-component vector type.
pub(crate) static PROPS_OE: [Option<PropKind>; 6] = [
    Some(PropKind::Int),
    Some(PropKind::Float),
    Some(PropKind::Vector3),
    Some(PropKind::String),
    Some(PropKind::Array),
    Some(PropKind::DataTable),
];

pub(crate) static PROPS: [Option<PropKind>; 7] = [
    Some(PropKind::Int),
    Some(PropKind::Float),
    Some(PropKind::Vector3),
    Some(PropKind::Vector2),
    Some(PropKind::String),
    Some(PropKind::Array),
    Some(PropKind::DataTable),
];

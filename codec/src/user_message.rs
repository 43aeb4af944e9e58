//! User messages carried inside `SvcUserMessage`.
//!
//! A handful of common kinds have typed decoders; every other kind is kept
//! as [`UserMessageBody::Unimplemented`] with its span.

use bitstream::{BitReader, BitResult, BitSpan};
use protocol::UserMessageKind;

/// A user message with its selector and payload span.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub kind: UserMessageKind,
    pub byte: u8,
    pub span: BitSpan,
    pub body: UserMessageBody,
}

/// Decoded user message payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum UserMessageBody {
    Geiger { range: u8 },
    Train { position: u8 },
    HudText { text: String },
    SayText {
        client: u8,
        text: String,
        wants_to_chat: bool,
    },
    SayText2 {
        client: u8,
        wants_to_chat: bool,
        message: String,
        params: Vec<String>,
    },
    TextMsg { destination: u8, message: String, params: Vec<String> },
    ResetHud { reset: u8 },
    Shake {
        command: u8,
        amplitude: f32,
        frequency: f32,
        duration: f32,
    },
    Fade {
        duration: u16,
        hold_time: u16,
        flags: u16,
        rgba: [u8; 4],
    },
    Rumble { waveform: u8, data: u8, flags: u8 },
    Battery { value: u16 },
    CloseCaption {
        token: String,
        duration: f32,
        flags: u8,
    },
    HintText { text: String },
    KeyHintText { count: u8, text: String },
    AchievementEvent { achievement_id: u16 },
    /// Recognized kind without a decoder; payload kept as the span.
    Unimplemented,
}

impl UserMessageBody {
    /// Decodes the payload of `kind`. Kinds without a decoder read nothing.
    pub fn read(kind: UserMessageKind, reader: &mut BitReader<'_>) -> BitResult<Self> {
        use UserMessageKind as K;

        let body = match kind {
            K::Geiger => Self::Geiger {
                range: reader.read_u8()?,
            },
            K::Train => Self::Train {
                position: reader.read_u8()?,
            },
            K::HudText => Self::HudText {
                text: reader.read_cstring()?,
            },
            K::SayText => Self::SayText {
                client: reader.read_u8()?,
                text: reader.read_cstring()?,
                wants_to_chat: reader.read_u8()? != 0,
            },
            K::SayText2 => Self::SayText2 {
                client: reader.read_u8()?,
                wants_to_chat: reader.read_u8()? != 0,
                message: reader.read_cstring()?,
                params: read_params(reader)?,
            },
            K::TextMsg => Self::TextMsg {
                destination: reader.read_u8()?,
                message: reader.read_cstring()?,
                params: read_params(reader)?,
            },
            K::ResetHud => Self::ResetHud {
                reset: reader.read_u8()?,
            },
            K::Shake => Self::Shake {
                command: reader.read_u8()?,
                amplitude: reader.read_f32()?,
                frequency: reader.read_f32()?,
                duration: reader.read_f32()?,
            },
            K::Fade => Self::Fade {
                duration: reader.read_u16()?,
                hold_time: reader.read_u16()?,
                flags: reader.read_u16()?,
                rgba: [
                    reader.read_u8()?,
                    reader.read_u8()?,
                    reader.read_u8()?,
                    reader.read_u8()?,
                ],
            },
            K::Rumble => Self::Rumble {
                waveform: reader.read_u8()?,
                data: reader.read_u8()?,
                flags: reader.read_u8()?,
            },
            K::Battery => Self::Battery {
                value: reader.read_u16()?,
            },
            K::CloseCaption => Self::CloseCaption {
                token: reader.read_cstring()?,
                duration: f32::from(reader.read_i16()?) * 0.1,
                flags: reader.read_u8()?,
            },
            K::HintText => Self::HintText {
                text: reader.read_cstring()?,
            },
            K::KeyHintText => Self::KeyHintText {
                count: reader.read_u8()?,
                text: reader.read_cstring()?,
            },
            K::AchievementEvent => Self::AchievementEvent {
                achievement_id: reader.read_u16()?,
            },
            _ => Self::Unimplemented,
        };
        Ok(body)
    }

    /// Returns `true` if the payload was left undecoded.
    #[must_use]
    pub const fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented)
    }
}

/// Decodes a user message payload of `kind`.
pub fn decode_user_message(
    kind: UserMessageKind,
    reader: &mut BitReader<'_>,
) -> BitResult<UserMessageBody> {
    UserMessageBody::read(kind, reader)
}

/// Up to four trailing string parameters.
fn read_params(reader: &mut BitReader<'_>) -> BitResult<Vec<String>> {
    let mut params = Vec::new();
    while params.len() < 4 && reader.bits_remaining() >= 8 {
        params.push(reader.read_cstring()?);
    }
    Ok(params)
}

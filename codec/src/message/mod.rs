//! Net and svc messages inside a packet frame.
//!
//! A message is a selector of `message_type_bits` followed by a payload whose
//! layout depends on the kind. Failures come in two strengths:
//!
//! - a **desync** happens while reading the fields that locate the message's
//!   end. Nothing after it can be trusted, so the message becomes
//!   [`MessageBody::Unknown`] over the rest of the stream and the loop stops.
//! - a **resync** happens inside a payload whose length was already read.
//!   The message becomes `Unknown` over its own span and decoding continues
//!   with the next message.
//!
//! Either way one line is appended to the context's error log.

mod net;
mod svc;

use bitstream::{BitReader, BitSpan};
use protocol::MessageKind;
use tracing::trace;

use crate::context::DecodeContext;
use crate::error::CodecError;

pub use net::{
    ConVar, NetDisconnect, NetFile, NetSetConVar, NetSignOnState, NetSplitScreenUser,
    NetStringCmd, NetTick, SignOnExtension,
};
pub use svc::{
    ClassInfoEntry, MapChecksum, SvcBspDecal, SvcClassInfo, SvcCmdKeyValues,
    SvcCreateStringTable, SvcCrosshairAngle, SvcEntityMessage, SvcFixAngle, SvcGameEvent,
    SvcGameEventList, SvcGetCvarValue, SvcMenu, SvcPacketEntities, SvcPaintmapData, SvcPrefetch,
    SvcPrint, SvcSendTable, SvcServerInfo, SvcSetPause, SvcSetView, SvcSounds, SvcSplitScreen,
    SvcTempEntities, SvcUpdateStringTable, SvcUserMessage, SvcVoiceData, SvcVoiceInit,
};

/// One decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct NetMessage {
    pub kind: MessageKind,
    /// Raw selector.
    pub byte: u8,
    /// Selector and payload.
    pub span: BitSpan,
    pub body: MessageBody,
}

impl NetMessage {
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self.body, MessageBody::Unknown(_))
    }
}

/// Message payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    NetNop,
    NetDisconnect(NetDisconnect),
    NetFile(NetFile),
    NetSplitScreenUser(NetSplitScreenUser),
    NetTick(NetTick),
    NetStringCmd(NetStringCmd),
    NetSetConVar(NetSetConVar),
    NetSignOnState(NetSignOnState),
    SvcPrint(SvcPrint),
    SvcServerInfo(Box<SvcServerInfo>),
    SvcSendTable(SvcSendTable),
    SvcClassInfo(SvcClassInfo),
    SvcSetPause(SvcSetPause),
    SvcCreateStringTable(SvcCreateStringTable),
    SvcUpdateStringTable(SvcUpdateStringTable),
    SvcVoiceInit(SvcVoiceInit),
    SvcVoiceData(SvcVoiceData),
    SvcSounds(SvcSounds),
    SvcSetView(SvcSetView),
    SvcFixAngle(SvcFixAngle),
    SvcCrosshairAngle(SvcCrosshairAngle),
    SvcBspDecal(SvcBspDecal),
    SvcSplitScreen(SvcSplitScreen),
    SvcUserMessage(SvcUserMessage),
    SvcEntityMessage(SvcEntityMessage),
    SvcGameEvent(SvcGameEvent),
    SvcPacketEntities(SvcPacketEntities),
    SvcTempEntities(SvcTempEntities),
    SvcPrefetch(SvcPrefetch),
    SvcMenu(SvcMenu),
    SvcGameEventList(SvcGameEventList),
    SvcGetCvarValue(SvcGetCvarValue),
    SvcCmdKeyValues(SvcCmdKeyValues),
    SvcPaintmapData(SvcPaintmapData),
    /// Undecodable bits; the span covers what could not be trusted.
    Unknown(BitSpan),
}

/// How far a failure reaches.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The message's end is unknown.
    Desync(CodecError),
    /// The message's end is known; its payload is not.
    Resync(CodecError),
}

impl From<bitstream::BitError> for Failure {
    fn from(err: bitstream::BitError) -> Self {
        Self::Desync(err.into())
    }
}

impl From<CodecError> for Failure {
    fn from(err: CodecError) -> Self {
        Self::Desync(err)
    }
}

pub(crate) type MessageResult<T> = Result<T, Failure>;

/// Downgrades payload errors to [`Failure::Resync`].
pub(crate) trait ResyncExt<T> {
    fn resync(self) -> MessageResult<T>;
}

impl<T, E: Into<CodecError>> ResyncExt<T> for Result<T, E> {
    fn resync(self) -> MessageResult<T> {
        self.map_err(|err| Failure::Resync(err.into()))
    }
}

/// Fails with a resync if a length-delimited payload was not fully read.
pub(crate) fn expect_consumed(payload: &BitReader<'_>, kind: MessageKind) -> MessageResult<()> {
    match payload.bits_remaining() {
        0 => Ok(()),
        remaining_bits => Err(Failure::Resync(CodecError::TrailingBits {
            kind,
            remaining_bits,
        })),
    }
}

/// Reads messages until the stream holds only padding.
pub(crate) fn read_messages(reader: &mut BitReader<'_>, ctx: &mut DecodeContext) -> Vec<NetMessage> {
    let type_bits = ctx.facts.message_type_bits;
    let mut messages = Vec::new();

    while !only_padding_left(reader, type_bits) {
        let start = reader.absolute_position();
        let byte = match reader.read_bits(type_bits) {
            Ok(byte) => byte as u8,
            Err(_) => break,
        };
        let kind = ctx.facts.message_kind(byte);

        match decode_message_body(kind, byte, reader, ctx) {
            Ok(body) => {
                let span = reader.span_from(start);
                trace!(?kind, bits = span.len, "message");
                messages.push(NetMessage {
                    kind,
                    byte,
                    span,
                    body,
                });
            }
            Err(Failure::Resync(err)) => {
                let span = reader.span_from(start);
                ctx.log_demoted(kind, byte, span, reader.buffer(), &err);
                messages.push(NetMessage {
                    kind,
                    byte,
                    span,
                    body: MessageBody::Unknown(span),
                });
            }
            Err(Failure::Desync(err)) => {
                let end = reader.span().end();
                let span = BitSpan::new(start, end - start);
                ctx.log_demoted(kind, byte, span, reader.buffer(), &err);
                messages.push(NetMessage {
                    kind,
                    byte,
                    span,
                    body: MessageBody::Unknown(span),
                });
                break;
            }
        }
    }
    messages
}

/// Fewer bits than a selector, or a short all-zero tail.
fn only_padding_left(reader: &BitReader<'_>, type_bits: u32) -> bool {
    let remaining = reader.bits_remaining();
    if remaining < type_bits as usize {
        return true;
    }
    remaining < 8
        && reader
            .clone()
            .read_bits(remaining as u32)
            .map_or(true, |tail| tail == 0)
}

/// Decodes the payload of one message whose selector was already read.
pub(crate) fn decode_message_body(
    kind: MessageKind,
    byte: u8,
    r: &mut BitReader<'_>,
    ctx: &mut DecodeContext,
) -> MessageResult<MessageBody> {
    use MessageKind as K;

    let body = match kind {
        K::NetNop => MessageBody::NetNop,
        K::NetDisconnect => MessageBody::NetDisconnect(NetDisconnect::read(r)?),
        K::NetFile => MessageBody::NetFile(NetFile::read(r, &ctx.facts)?),
        K::NetSplitScreenUser => MessageBody::NetSplitScreenUser(NetSplitScreenUser::read(r)?),
        K::NetTick => MessageBody::NetTick(NetTick::read(r, &ctx.facts)?),
        K::NetStringCmd => MessageBody::NetStringCmd(NetStringCmd::read(r)?),
        K::NetSetConVar => MessageBody::NetSetConVar(NetSetConVar::read(r)?),
        K::NetSignOnState => MessageBody::NetSignOnState(NetSignOnState::read(r, &ctx.facts)?),
        K::SvcPrint => MessageBody::SvcPrint(SvcPrint::read(r)?),
        K::SvcServerInfo => MessageBody::SvcServerInfo(Box::new(SvcServerInfo::read(r, ctx)?)),
        K::SvcSendTable => MessageBody::SvcSendTable(SvcSendTable::read(r)?),
        K::SvcClassInfo => MessageBody::SvcClassInfo(SvcClassInfo::read(r)?),
        K::SvcSetPause => MessageBody::SvcSetPause(SvcSetPause::read(r)?),
        K::SvcCreateStringTable => {
            MessageBody::SvcCreateStringTable(SvcCreateStringTable::read(r, ctx)?)
        }
        K::SvcUpdateStringTable => {
            MessageBody::SvcUpdateStringTable(SvcUpdateStringTable::read(r, ctx)?)
        }
        K::SvcVoiceInit => MessageBody::SvcVoiceInit(SvcVoiceInit::read(r)?),
        K::SvcVoiceData => MessageBody::SvcVoiceData(SvcVoiceData::read(r)?),
        K::SvcSounds => MessageBody::SvcSounds(SvcSounds::read(r, ctx)?),
        K::SvcSetView => MessageBody::SvcSetView(SvcSetView::read(r)?),
        K::SvcFixAngle => MessageBody::SvcFixAngle(SvcFixAngle::read(r)?),
        K::SvcCrosshairAngle => MessageBody::SvcCrosshairAngle(SvcCrosshairAngle::read(r)?),
        K::SvcBspDecal => MessageBody::SvcBspDecal(SvcBspDecal::read(r, &ctx.facts)?),
        K::SvcSplitScreen => MessageBody::SvcSplitScreen(SvcSplitScreen::read(r)?),
        K::SvcUserMessage => MessageBody::SvcUserMessage(SvcUserMessage::read(r, ctx)?),
        K::SvcEntityMessage => MessageBody::SvcEntityMessage(SvcEntityMessage::read(r)?),
        K::SvcGameEvent => MessageBody::SvcGameEvent(SvcGameEvent::read(r, ctx)?),
        K::SvcPacketEntities => MessageBody::SvcPacketEntities(SvcPacketEntities::read(r, ctx)?),
        K::SvcTempEntities => MessageBody::SvcTempEntities(SvcTempEntities::read(r, &ctx.facts)?),
        K::SvcPrefetch => MessageBody::SvcPrefetch(SvcPrefetch::read(r, &ctx.facts)?),
        K::SvcMenu => MessageBody::SvcMenu(SvcMenu::read(r)?),
        K::SvcGameEventList => MessageBody::SvcGameEventList(SvcGameEventList::read(r, ctx)?),
        K::SvcGetCvarValue => MessageBody::SvcGetCvarValue(SvcGetCvarValue::read(r)?),
        K::SvcCmdKeyValues => MessageBody::SvcCmdKeyValues(SvcCmdKeyValues::read(r)?),
        K::SvcPaintmapData => MessageBody::SvcPaintmapData(SvcPaintmapData::read(r)?),
        K::Unknown | K::Invalid => {
            return Err(Failure::Desync(CodecError::UnmappedMessage { byte, kind }))
        }
    };
    Ok(body)
}

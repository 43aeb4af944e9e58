//! `net_*` messages: connection control shared by client and server.

use bitstream::{BitReader, BitResult};
use protocol::ProtocolFacts;

/// `NetTick` frame times are sent in units of 1/100000 s.
const NET_TICK_SCALE: f32 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetDisconnect {
    pub reason: String,
}

impl NetDisconnect {
    pub fn read(r: &mut BitReader<'_>) -> BitResult<Self> {
        Ok(Self {
            reason: r.read_cstring()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetFile {
    pub transfer_id: u32,
    pub file_name: String,
    pub requested: bool,
    /// Replay demo transfer; new engine only.
    pub is_replay_demo: bool,
}

impl NetFile {
    pub fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> BitResult<Self> {
        let transfer_id = r.read_u32()?;
        let file_name = r.read_cstring()?;
        let requested = r.read_bool()?;
        let is_replay_demo = facts.is_new_engine() && r.read_bool()?;
        Ok(Self {
            transfer_id,
            file_name,
            requested,
            is_replay_demo,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetSplitScreenUser {
    pub player_slot: bool,
}

impl NetSplitScreenUser {
    pub fn read(r: &mut BitReader<'_>) -> BitResult<Self> {
        Ok(Self {
            player_slot: r.read_bool()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetTick {
    pub tick: i32,
    /// Host frame time and its deviation, in seconds.
    pub frame_time: Option<(f32, f32)>,
}

impl NetTick {
    pub fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> BitResult<Self> {
        let tick = r.read_i32()?;
        let frame_time = if facts.net_tick_has_frame_time {
            let time = f32::from(r.read_u16()?) / NET_TICK_SCALE;
            let deviation = f32::from(r.read_u16()?) / NET_TICK_SCALE;
            Some((time, deviation))
        } else {
            None
        };
        Ok(Self { tick, frame_time })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetStringCmd {
    pub command: String,
}

impl NetStringCmd {
    pub fn read(r: &mut BitReader<'_>) -> BitResult<Self> {
        Ok(Self {
            command: r.read_cstring()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSetConVar {
    pub convars: Vec<ConVar>,
}

impl NetSetConVar {
    pub fn read(r: &mut BitReader<'_>) -> BitResult<Self> {
        let count = r.read_u8()?;
        let mut convars = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            convars.push(ConVar {
                name: r.read_cstring()?,
                value: r.read_cstring()?,
            });
        }
        Ok(Self { convars })
    }
}

/// Fields Portal 2 and L4D2 append to `NetSignOnState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOnExtension {
    pub num_server_players: u32,
    pub player_network_ids: Vec<u8>,
    pub map_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetSignOnState {
    pub state: u8,
    pub spawn_count: i32,
    pub extension: Option<SignOnExtension>,
}

impl NetSignOnState {
    pub fn read(r: &mut BitReader<'_>, facts: &ProtocolFacts) -> BitResult<Self> {
        let state = r.read_u8()?;
        let spawn_count = r.read_i32()?;
        let extension = if facts.extended_signon_state {
            let num_server_players = r.read_u32()?;
            let ids_len = r.read_u32()? as usize;
            let player_network_ids = r.read_bytes(ids_len)?;
            let name_len = r.read_u32()? as usize;
            let map_name = r.read_string_of_length(name_len)?;
            Some(SignOnExtension {
                num_server_players,
                player_network_ids,
                map_name,
            })
        } else {
            None
        };
        Ok(Self {
            state,
            spawn_count,
            extension,
        })
    }
}

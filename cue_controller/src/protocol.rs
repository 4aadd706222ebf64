use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub const SOCKET_PATH: &str = "/ws";

/// Largest text frame accepted from a panel.
pub const MAX_MESSAGE_SIZE: usize = 512;

pub type ClientId = u64;

#[derive(Debug)]
pub enum InboundMsg {
    ClientConnected {
        client: ClientId,
        socket_addr: SocketAddr,
    },
    ClientDisconnected {
        client: ClientId,
    },
    Action {
        client: ClientId,
        action: ClientAction,
    },
}

#[derive(Debug)]
pub enum OutboundMsg {
    To { client: ClientId, msg: ServerMessage },
    Broadcast { msg: ServerMessage },
}

pub use cue_protocol::{ClientAction, CueIndex, CueState, ServerMessage, WifiInfo};

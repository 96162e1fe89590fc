use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

/// A Packet type to use when receiving and sending data to the server.
///
/// Each variant maps to exactly one websocket frame: every text packet is a
/// text frame starting with its type digit, [`Packet::Binary`] is a raw
/// binary frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Open packet sent by the server to initiate the session
    Open(OpenPacket),
    /// Close packet used by the server to end the session
    Close,
    /// Ping packet, only sent by the server
    Ping,
    /// Pong packet, the client reply to a [`Packet::Ping`]
    Pong,
    /// Message packet carrying one socket.io payload
    Message(String),
    /// Upgrade packet, unused by a websocket-only client
    Upgrade,
    /// Noop packet, unused by a websocket-only client
    Noop,

    /// Binary packet carrying one raw socket.io attachment.
    /// Not part of the text grammar, it travels as a websocket binary frame.
    Binary(Bytes),
}

/// An error that occurs when parsing a packet.
#[derive(Debug)]
pub enum PacketParseError {
    /// Invalid open packet payload
    InvalidOpenPacket(serde_json::Error),
    /// The packet type digit is invalid.
    InvalidPacketType(Option<char>),
}

impl fmt::Display for PacketParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketParseError::InvalidOpenPacket(e) => write!(f, "invalid open packet: {e}"),
            PacketParseError::InvalidPacketType(c) => write!(f, "invalid packet type: {c:?}"),
        }
    }
}
impl std::error::Error for PacketParseError {}

impl From<serde_json::Error> for PacketParseError {
    fn from(err: serde_json::Error) -> Self {
        PacketParseError::InvalidOpenPacket(err)
    }
}

impl Packet {
    /// Convert the packet into the websocket frame carrying it.
    pub fn into_ws_message(self) -> Message {
        match self {
            Packet::Binary(data) => Message::Binary(data),
            packet => Message::text(String::from(packet)),
        }
    }
}

/// Serialize a [`Packet`] to a [`String`] according to the Engine.IO protocol
impl From<Packet> for String {
    fn from(packet: Packet) -> String {
        match packet {
            Packet::Open(open) => {
                let mut buffer = String::with_capacity(156);
                buffer.push('0');
                buffer.push_str(&serde_json::to_string(&open).unwrap());
                buffer
            }
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Message(msg) => {
                let mut buffer = String::with_capacity(1 + msg.len());
                buffer.push('4');
                buffer.push_str(&msg);
                buffer
            }
            Packet::Upgrade => "5".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Binary(_) => panic!("binary packets are sent as websocket binary frames"),
        }
    }
}

/// Deserialize a [`Packet`] from a text frame according to the Engine.IO protocol
impl TryFrom<&str> for Packet {
    type Error = PacketParseError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let packet_type = value
            .as_bytes()
            .first()
            .ok_or(PacketParseError::InvalidPacketType(None))?;
        let res = match packet_type {
            b'0' => Packet::Open(serde_json::from_str(&value[1..])?),
            b'1' => Packet::Close,
            b'2' => Packet::Ping,
            b'3' => Packet::Pong,
            b'4' => Packet::Message(value[1..].to_string()),
            b'5' => Packet::Upgrade,
            b'6' => Packet::Noop,
            c => Err(PacketParseError::InvalidPacketType(Some(*c as char)))?,
        };
        Ok(res)
    }
}

/// An [`OpenPacket`] is sent by the server as the first frame of a session.
///
/// Everything but the `sid` is defaulted so that sparse handshakes from
/// minimal servers still open the session.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    /// The session ID.
    pub sid: String,
    /// The list of available transport upgrades.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// The ping interval, used in the heartbeat mechanism (in milliseconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// The ping timeout, used in the heartbeat mechanism (in milliseconds).
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// The maximum number of bytes per chunk, advisory for the client.
    #[serde(default)]
    pub max_payload: u64,
}

fn default_ping_interval() -> u64 {
    25000
}
fn default_ping_timeout() -> u64 {
    60000
}

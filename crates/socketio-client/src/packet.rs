//! Socket.io packet implementation.
//! The [`Packet`] is the base unit of data that travels over the engine.io
//! transport: one text frame plus any number of binary attachment frames.

use crate::value::Value;

/// The socket.io packet type.
/// Each packet has a type and a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// The packet data
    pub inner: PacketData,
    /// The namespace the packet belongs to
    pub ns: String,
}

impl Packet {
    /// Create a connect packet for the given namespace with an optional auth payload
    pub fn connect(ns: impl Into<String>, auth: Option<Value>) -> Self {
        Self {
            inner: PacketData::Connect(auth),
            ns: ns.into(),
        }
    }

    /// Create a disconnect packet for the given namespace
    pub fn disconnect(ns: impl Into<String>) -> Self {
        Self {
            inner: PacketData::Disconnect,
            ns: ns.into(),
        }
    }

    /// Create an event packet for the given namespace
    pub fn event(ns: impl Into<String>, data: Value) -> Self {
        Self {
            inner: PacketData::Event(data, None),
            ns: ns.into(),
        }
    }

    /// Create an ack packet for the given namespace
    pub fn ack(ns: impl Into<String>, data: Value, ack: i64) -> Self {
        Self {
            inner: PacketData::EventAck(data, ack),
            ns: ns.into(),
        }
    }
}

/// | Type          | ID  | Usage                                                              |
/// |---------------|-----|--------------------------------------------------------------------|
/// | CONNECT       | 0   | Used during the connection to a namespace.                         |
/// | DISCONNECT    | 1   | Used when disconnecting from a namespace.                          |
/// | EVENT         | 2   | Used to send data to the other side.                               |
/// | ACK           | 3   | Used to acknowledge an event.                                      |
/// | CONNECT_ERROR | 4   | Used during the connection to a namespace.                         |
/// | BINARY_EVENT  | 5   | Used to send binary data to the other side.                        |
/// | BINARY_ACK    | 6   | Used to acknowledge an event with a binary response.               |
#[derive(Debug, Clone, PartialEq)]
pub enum PacketData {
    /// Connect packet with optional auth payload
    Connect(Option<Value>),
    /// Disconnect packet, used to disconnect from a namespace
    Disconnect,
    /// Event packet with optional ack id, to request an ack from the other side
    Event(Value, Option<i64>),
    /// Event ack packet, to acknowledge an event
    EventAck(Value, i64),
    /// Connect error packet, carries the server supplied error payload
    ConnectError(Value),
    /// Binary event packet with optional ack id, to request an ack from the other side
    BinaryEvent(Value, Option<i64>),
    /// Binary ack packet, to acknowledge an event with binary data
    BinaryAck(Value, i64),
}

impl PacketData {
    pub fn index(&self) -> usize {
        match self {
            PacketData::Connect(_) => 0,
            PacketData::Disconnect => 1,
            PacketData::Event(_, _) => 2,
            PacketData::EventAck(_, _) => 3,
            PacketData::ConnectError(_) => 4,
            PacketData::BinaryEvent(_, _) => 5,
            PacketData::BinaryAck(_, _) => 6,
        }
    }

    /// Set the ack id for the packet.
    /// It will only set the ack id for the packets that support it.
    pub fn set_ack_id(&mut self, ack_id: i64) {
        match self {
            PacketData::Event(_, ack) | PacketData::BinaryEvent(_, ack) => *ack = Some(ack_id),
            _ => {}
        };
    }

    /// The ack id carried by the packet, if any.
    pub fn ack_id(&self) -> Option<i64> {
        match self {
            PacketData::Event(_, ack) | PacketData::BinaryEvent(_, ack) => *ack,
            PacketData::EventAck(_, ack) | PacketData::BinaryAck(_, ack) => Some(*ack),
            _ => None,
        }
    }

    /// Check if the packet is a binary packet (either binary event or binary ack)
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            PacketData::BinaryEvent(_, _) | PacketData::BinaryAck(_, _)
        )
    }
}

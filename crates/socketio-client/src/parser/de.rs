use std::io::Cursor;

use bytes::{Buf, Bytes};

use crate::packet::{Packet, PacketData};
use crate::value::Value;

/// Header parse failures. They never leave the decoder: a failed parse
/// degrades to a delivered null-payload packet.
#[derive(thiserror::Error, Debug)]
pub(super) enum ParseError {
    #[error("invalid packet type")]
    InvalidPacketType,

    #[error("invalid attachments")]
    InvalidAttachments,
}

/// Outcome of parsing one text frame.
pub(super) enum Decoded {
    /// The packet is self contained and can be delivered.
    Complete(Packet),
    /// The packet declares binary attachments that arrive in subsequent
    /// binary frames; the JSON body stays unparsed until they do.
    Partial(PartialPacket),
}

#[derive(Debug)]
pub(super) struct PartialPacket {
    pub kind: u8,
    pub ns: String,
    pub ack: Option<i64>,
    pub json: String,
    pub expected: usize,
    pub bins: Vec<Bytes>,
}

pub(super) fn deserialize_packet(data: &str) -> Result<Decoded, ParseError> {
    if data.is_empty() {
        return Err(ParseError::InvalidPacketType);
    }
    // The packet can be parsed from a byte cursor because all separators are ASCII.
    let mut reader = Cursor::new(data);
    let index = reader.get_u8();
    if !(b'0'..=b'6').contains(&index) {
        return Err(ParseError::InvalidPacketType);
    }

    let attachments: Option<usize> = if index == b'5' || index == b'6' {
        Some(read_attachments(&mut reader).ok_or(ParseError::InvalidAttachments)?)
    } else {
        None
    };

    // Custom namespaces start with a slash
    let ns = if reader.has_remaining().then(|| reader.chunk()[0]) == Some(b'/') {
        read_nsp(&mut reader, data)
    } else {
        "/".to_string()
    };
    let ack = read_ack(&mut reader);

    let body = &data[reader.position() as usize..];
    let inner = match index {
        b'0' => PacketData::Connect((!body.is_empty()).then(|| parse_body(body, &[]))),
        b'1' => PacketData::Disconnect,
        b'2' => PacketData::Event(parse_body(body, &[]), ack),
        b'3' => PacketData::EventAck(parse_body(body, &[]), ack.ok_or(ParseError::InvalidPacketType)?),
        b'4' => PacketData::ConnectError(parse_body(body, &[])),
        b'5' | b'6' => {
            if index == b'6' && ack.is_none() {
                return Err(ParseError::InvalidPacketType);
            }
            let partial = PartialPacket {
                kind: index,
                ns,
                ack,
                json: body.to_string(),
                expected: attachments.unwrap_or(0),
                bins: Vec::new(),
            };
            return if partial.expected == 0 {
                Ok(Decoded::Complete(finish_binary(partial)))
            } else {
                Ok(Decoded::Partial(partial))
            };
        }
        _ => return Err(ParseError::InvalidPacketType),
    };
    Ok(Decoded::Complete(Packet { inner, ns }))
}

/// Assemble a binary packet once every attachment has arrived, substituting
/// the placeholders in the JSON body by attachment index.
pub(super) fn finish_binary(partial: PartialPacket) -> Packet {
    let value = parse_body(&partial.json, &partial.bins);
    let inner = match (partial.kind, partial.ack) {
        (b'5', ack) => PacketData::BinaryEvent(value, ack),
        (b'6', Some(ack)) => PacketData::BinaryAck(value, ack),
        _ => PacketData::Event(Value::Null, None),
    };
    Packet {
        inner,
        ns: partial.ns,
    }
}

fn read_attachments(reader: &mut Cursor<&str>) -> Option<usize> {
    let data = *reader.get_ref();
    let start_index = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(c) if c.is_ascii_digit() => (),
            Some(b'-') if reader.position() as usize > start_index => {
                break data[start_index..reader.position() as usize - 1]
                    .parse()
                    .ok();
            }
            _ => break None,
        }
    }
}

fn read_nsp(reader: &mut Cursor<&str>, data: &str) -> String {
    let start_index = reader.position() as usize;
    loop {
        match reader.has_remaining().then(|| reader.get_u8()) {
            Some(b',') => {
                break data[start_index..reader.position() as usize - 1].to_string();
            }
            // Some clients do not end the namespace with a comma when it is
            // the end of the packet, e.g `1/custom`
            None => {
                break data[start_index..reader.position() as usize].to_string();
            }
            Some(_) => (),
        }
    }
}

fn read_ack(reader: &mut Cursor<&str>) -> Option<i64> {
    let start_index = reader.position() as usize;
    let data = *reader.get_ref();
    loop {
        match reader.has_remaining().then(|| reader.chunk()[0]) {
            Some(c) if c.is_ascii_digit() => reader.advance(1),
            Some(b'[' | b'{') if reader.position() as usize > start_index => {
                break data[start_index..reader.position() as usize].parse().ok();
            }
            _ => break None,
        }
    }
}

/// Parse a JSON body into a value tree. An empty or unparsable body becomes
/// [`Value::Null`]; a session never dies on a bad payload.
fn parse_body(body: &str, bins: &[Bytes]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => from_json(json, bins),
        Err(_) => Value::Null,
    }
}

fn from_json(json: serde_json::Value, bins: &[Bytes]) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Int(u as i64)
            } else {
                Value::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| from_json(v, bins)).collect())
        }
        serde_json::Value::Object(map) => {
            if map.get("_placeholder").and_then(|v| v.as_bool()) == Some(true) {
                // Out-of-range indices degrade to null rather than failing.
                return match map.get("num").and_then(|v| v.as_u64()) {
                    Some(num) => bins
                        .get(num as usize)
                        .map(|data| Value::Binary(data.clone()))
                        .unwrap_or(Value::Null),
                    None => Value::Null,
                };
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, from_json(v, bins)))
                    .collect(),
            )
        }
    }
}

use bytes::Bytes;

use crate::packet::{Packet, PacketData};
use crate::value::Value;

/// Serialize a packet into its text frame plus the binary attachment frames,
/// in wire order.
///
/// The resulting string is in the format of:
/// ```text
/// <packet type>[<# of binary attachments>-][<namespace>,][<acknowledgment id>][JSON payload without binary]
/// ```
/// Binary buffers encountered while walking the payload are replaced by
/// `{"_placeholder":true,"num":<k>}` objects and returned separately; a
/// non-empty attachment list upgrades EVENT to BINARY_EVENT and ACK to
/// BINARY_ACK.
pub fn serialize_packet(packet: &Packet) -> (String, Vec<Bytes>) {
    use PacketData::*;
    let mut bins: Vec<Bytes> = Vec::new();

    let (body, ack) = match &packet.inner {
        Connect(Some(value)) => (Some(to_json_string(value, &mut bins)), None),
        Connect(None) | Disconnect => (None, None),
        Event(value, ack) | BinaryEvent(value, ack) => {
            (Some(to_json_string(value, &mut bins)), *ack)
        }
        EventAck(value, ack) | BinaryAck(value, ack) => {
            (Some(to_json_string(value, &mut bins)), Some(*ack))
        }
        ConnectError(value) => (Some(to_json_string(value, &mut bins)), None),
    };

    // Only events and acks may carry attachments on the wire.
    if !matches!(
        packet.inner,
        Event(..) | BinaryEvent(..) | EventAck(..) | BinaryAck(..)
    ) {
        bins.clear();
    }

    // The attachment walk decides the final type digit.
    let index = match &packet.inner {
        Connect(_) => 0,
        Disconnect => 1,
        Event(..) | BinaryEvent(..) => {
            if bins.is_empty() {
                2
            } else {
                5
            }
        }
        EventAck(..) | BinaryAck(..) => {
            if bins.is_empty() {
                3
            } else {
                6
            }
        }
        ConnectError(_) => 4,
    };

    let body_len = body.as_ref().map(String::len).unwrap_or(0);
    let mut buffer = String::with_capacity(body_len + packet.ns.len() + 16);
    let mut itoa_buf = itoa::Buffer::new();

    buffer.push((b'0' + index) as char);
    if !bins.is_empty() {
        buffer.push_str(itoa_buf.format(bins.len()));
        buffer.push('-');
    }
    serialize_nsp(&mut buffer, &packet.ns);
    if let Some(ack) = ack {
        buffer.push_str(itoa_buf.format(ack));
    }
    if let Some(body) = body {
        buffer.push_str(&body);
    }

    (buffer, bins)
}

fn serialize_nsp(buffer: &mut String, nsp: &str) {
    if !nsp.is_empty() && nsp != "/" {
        if !nsp.starts_with('/') {
            buffer.push('/');
        }
        buffer.push_str(nsp);
        buffer.push(',');
    }
}

/// Render the payload tree as JSON, swapping every binary node for a
/// placeholder and collecting the buffers in traversal order.
fn to_json_string(value: &Value, bins: &mut Vec<Bytes>) -> String {
    serde_json::to_string(&to_json(value, bins)).unwrap()
}

fn to_json(value: &Value, bins: &mut Vec<Bytes>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Binary(data) => {
            let num = bins.len();
            bins.push(data.clone());
            serde_json::json!({ "_placeholder": true, "num": num })
        }
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| to_json(v, bins)).collect())
        }
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v, bins)))
                .collect(),
        ),
    }
}

//! Parse and serialize from and into the socket.io common packet format.
//!
//! The text form of a packet is:
//! ```text
//! <packet type>[<# of binary attachments>-][<namespace>,][<acknowledgment id>][JSON payload without binary]
//! + binary attachments extracted
//! ```
//!
//! Decoding is stateful: a packet that declares binary attachments is held as
//! a partial packet until the adjacent binary frames have all arrived, then
//! the placeholders inside the JSON payload are substituted by attachment
//! index and the packet is delivered in one piece. Parse failures never
//! escape: malformed input degrades to a delivered packet with a null
//! payload, which the engine treats as a no-op.

use bytes::Bytes;

use crate::packet::Packet;
use crate::value::Value;

mod de;
mod ser;

pub use ser::serialize_packet;

/// The stateful packet decoder, one per connection.
#[derive(Debug, Default)]
pub struct Decoder {
    partial: Option<de::PartialPacket>,
}

impl Decoder {
    /// Feed one inbound text frame.
    ///
    /// Returns the decoded packet, or `None` when the frame opened a binary
    /// packet that still awaits attachments.
    pub fn decode_str(&mut self, data: &str) -> Option<Packet> {
        // A new text frame always supersedes a half-assembled binary packet.
        self.partial = None;
        match de::deserialize_packet(data) {
            Ok(de::Decoded::Complete(packet)) => Some(packet),
            Ok(de::Decoded::Partial(partial)) => {
                self.partial = Some(partial);
                None
            }
            Err(_e) => {
                tracing::debug!("malformed packet header: {_e}");
                Some(null_packet())
            }
        }
    }

    /// Feed one inbound binary frame.
    ///
    /// Returns the reassembled packet once the last expected attachment has
    /// arrived.
    pub fn decode_bin(&mut self, data: Bytes) -> Option<Packet> {
        match &mut self.partial {
            Some(partial) => {
                partial.bins.push(data);
                if partial.bins.len() >= partial.expected {
                    self.partial.take().map(de::finish_binary)
                } else {
                    None
                }
            }
            None => {
                tracing::debug!("unexpected binary frame");
                Some(null_packet())
            }
        }
    }

    /// Drop any partial packet, e.g. when the transport reconnects.
    pub fn reset(&mut self) {
        self.partial = None;
    }
}

fn null_packet() -> Packet {
    Packet::event("/", Value::Null)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::packet::PacketData;

    fn decode(data: &str) -> Packet {
        Decoder::default()
            .decode_str(data)
            .expect("expected a complete packet")
    }
    fn encode(packet: &Packet) -> String {
        let (data, bins) = serialize_packet(packet);
        assert!(bins.is_empty(), "expected no binary payloads");
        data
    }
    fn object(entries: Vec<(&str, Value)>) -> Value {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }
    fn event_value(event: &str, args: Vec<Value>) -> Value {
        Value::event_payload(event, args)
    }

    #[test]
    fn packet_decode_connect() {
        let payload = r#"0{"sid":"abcd"}"#;
        let packet = decode(payload);
        assert_eq!(
            packet,
            Packet::connect("/", Some(object(vec![("sid", Value::from("abcd"))])))
        );

        let payload = r#"0/admin™,{"sid":"abcd"}"#;
        let packet = decode(payload);
        assert_eq!(
            packet,
            Packet::connect("/admin™", Some(object(vec![("sid", Value::from("abcd"))])))
        );
    }

    #[test]
    fn packet_encode_connect() {
        let value = object(vec![("token", Value::from("secret"))]);
        let packet = encode(&Packet::connect("/", Some(value.clone())));
        assert_eq!(packet, r#"0{"token":"secret"}"#);

        let packet = encode(&Packet::connect("/admin™", Some(value)));
        assert_eq!(packet, r#"0/admin™,{"token":"secret"}"#);

        let packet = encode(&Packet::connect("/", None));
        assert_eq!(packet, "0");
    }

    // Disconnect

    #[test]
    fn packet_decode_disconnect() {
        assert_eq!(decode("1"), Packet::disconnect("/"));
        assert_eq!(decode("1/admin™,"), Packet::disconnect("/admin™"));
    }

    #[test]
    fn packet_encode_disconnect() {
        assert_eq!(encode(&Packet::disconnect("/")), "1");
        assert_eq!(encode(&Packet::disconnect("/admin™")), "1/admin™,");
    }

    // Event

    #[test]
    fn packet_decode_event() {
        let payload = r#"2["event",{"data":"value"}]"#;
        let expected = Packet::event(
            "/",
            event_value("event", vec![object(vec![("data", Value::from("value"))])]),
        );
        assert_eq!(decode(payload), expected);

        // Check with ack ID
        let payload = r#"21["event",{"data":"value"}]"#;
        let mut expected = Packet::event(
            "/",
            event_value("event", vec![object(vec![("data", Value::from("value"))])]),
        );
        expected.inner.set_ack_id(1);
        assert_eq!(decode(payload), expected);

        // Check with NS
        let payload = r#"2/admin™,["event",{"data":"value™"}]"#;
        let expected = Packet::event(
            "/admin™",
            event_value("event", vec![object(vec![("data", Value::from("value™"))])]),
        );
        assert_eq!(decode(payload), expected);

        // Check with ack ID and NS
        let payload = r#"2/admin™,1["event",{"data":"value™"}]"#;
        let mut expected = Packet::event(
            "/admin™",
            event_value("event", vec![object(vec![("data", Value::from("value™"))])]),
        );
        expected.inner.set_ack_id(1);
        assert_eq!(decode(payload), expected);
    }

    #[test]
    fn packet_encode_event() {
        let payload = event_value("event", vec![object(vec![("data", Value::from("value™"))])]);
        let packet = encode(&Packet::event("/", payload.clone()));
        assert_eq!(packet, r#"2["event",{"data":"value™"}]"#);

        // Encode empty data
        let packet = encode(&Packet::event("/", event_value("event", vec![])));
        assert_eq!(packet, r#"2["event"]"#);

        // Encode with ack ID
        let mut with_ack = Packet::event("/", payload.clone());
        with_ack.inner.set_ack_id(1);
        assert_eq!(encode(&with_ack), r#"21["event",{"data":"value™"}]"#);

        // Encode with NS
        let packet = encode(&Packet::event("/admin™", payload.clone()));
        assert_eq!(packet, r#"2/admin™,["event",{"data":"value™"}]"#);

        // Encode with NS and ack ID
        let mut with_both = Packet::event("/admin™", payload);
        with_both.inner.set_ack_id(1);
        assert_eq!(encode(&with_both), r#"2/admin™,1["event",{"data":"value™"}]"#);
    }

    // EventAck

    #[test]
    fn packet_decode_event_ack() {
        let packet = decode(r#"354["data"]"#);
        assert_eq!(
            packet,
            Packet::ack("/", Value::Array(vec![Value::from("data")]), 54)
        );

        let packet = decode(r#"3/admin™,54["data"]"#);
        assert_eq!(
            packet,
            Packet::ack("/admin™", Value::Array(vec![Value::from("data")]), 54)
        );
    }

    #[test]
    fn packet_encode_event_ack() {
        let packet = encode(&Packet::ack("/", Value::Array(vec![Value::from("data")]), 54));
        assert_eq!(packet, r#"354["data"]"#);

        let packet = encode(&Packet::ack(
            "/admin™",
            Value::Array(vec![Value::from("data")]),
            54,
        ));
        assert_eq!(packet, r#"3/admin™,54["data"]"#);
    }

    // BinaryEvent

    #[test]
    fn packet_encode_binary_event() {
        let payload = event_value(
            "event",
            vec![
                object(vec![("data", Value::from("value™"))]),
                Value::Binary(Bytes::from_static(&[1])),
            ],
        );
        let expected_json = r#"["event",{"data":"value™"},{"_placeholder":true,"num":0}]"#;

        let (data, bins) = serialize_packet(&Packet::event("/", payload.clone()));
        assert_eq!(data, format!("51-{expected_json}"));
        assert_eq!(bins, vec![Bytes::from_static(&[1])]);

        // Encode with ack ID
        let mut packet = Packet::event("/", payload.clone());
        packet.inner.set_ack_id(254);
        let (data, bins) = serialize_packet(&packet);
        assert_eq!(data, format!("51-254{expected_json}"));
        assert_eq!(bins.len(), 1);

        // Encode with NS
        let (data, _) = serialize_packet(&Packet::event("/admin™", payload.clone()));
        assert_eq!(data, format!("51-/admin™,{expected_json}"));

        // Encode with NS and ack ID
        let mut packet = Packet::event("/admin™", payload);
        packet.inner.set_ack_id(254);
        let (data, _) = serialize_packet(&packet);
        assert_eq!(data, format!("51-/admin™,254{expected_json}"));
    }

    #[test]
    fn packet_decode_binary_event() {
        let json = r#"["event",{"data":"value™"},{"_placeholder":true,"num":0}]"#;
        let comparison_packet = |ack, ns: &str| Packet {
            inner: PacketData::BinaryEvent(
                event_value(
                    "event",
                    vec![
                        object(vec![("data", Value::from("value™"))]),
                        Value::Binary(Bytes::from_static(&[1])),
                    ],
                ),
                ack,
            ),
            ns: ns.into(),
        };

        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("51-{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(None, "/"));

        // Check with ack ID
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("51-254{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(Some(254), "/"));

        // Check with NS
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("51-/admin™,{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(None, "/admin™"));

        // Check with ack ID and NS
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("51-/admin™,254{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(Some(254), "/admin™"));
    }

    #[test]
    fn packet_decode_binary_event_multiple_attachments() {
        let json = r#"["event",{"_placeholder":true,"num":0},{"_placeholder":true,"num":1}]"#;
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("52-{json}")).is_none());
        assert!(decoder.decode_bin(Bytes::from_static(&[1, 2])).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[3, 4])).unwrap();

        let PacketData::BinaryEvent(value, None) = packet.inner else {
            panic!("expected a binary event");
        };
        assert_eq!(value.as_array()[1].as_binary(), &[1, 2]);
        assert_eq!(value.as_array()[2].as_binary(), &[3, 4]);
    }

    // BinaryAck

    #[test]
    fn packet_encode_binary_ack() {
        let payload = Value::Array(vec![
            object(vec![("data", Value::from("value™"))]),
            Value::Binary(Bytes::from_static(&[1])),
        ]);
        let json = r#"[{"data":"value™"},{"_placeholder":true,"num":0}]"#;

        let (data, bins) = serialize_packet(&Packet::ack("/", payload.clone(), 54));
        assert_eq!(data, format!("61-54{json}"));
        assert_eq!(bins, vec![Bytes::from_static(&[1])]);

        // Encode with NS
        let (data, _) = serialize_packet(&Packet::ack("/admin™", payload, 54));
        assert_eq!(data, format!("61-/admin™,54{json}"));
    }

    #[test]
    fn packet_decode_binary_ack() {
        let json = r#"[{"data":"value™"},{"_placeholder":true,"num":0}]"#;
        let comparison_packet = |ack, ns: &str| Packet {
            inner: PacketData::BinaryAck(
                Value::Array(vec![
                    object(vec![("data", Value::from("value™"))]),
                    Value::Binary(Bytes::from_static(&[1])),
                ]),
                ack,
            ),
            ns: ns.into(),
        };

        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("61-54{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(54, "/"));

        // Check with NS
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&format!("61-/admin™,54{json}")).is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, comparison_packet(54, "/admin™"));
    }

    // Degraded input

    #[test]
    fn malformed_header_degrades_to_null_packet() {
        let packet = decode("7azdaz");
        assert_eq!(packet, Packet::event("/", Value::Null));

        let packet = decode("5invalid");
        assert_eq!(packet, Packet::event("/", Value::Null));
    }

    #[test]
    fn malformed_json_degrades_to_null_payload() {
        let packet = decode(r#"2["event",{"#);
        assert_eq!(packet, Packet::event("/", Value::Null));

        // The namespace and ack id survive even when the body does not parse
        let packet = decode(r#"2/admin,13{"#);
        assert_eq!(packet.ns, "/admin");
        assert_eq!(packet.inner, PacketData::Event(Value::Null, Some(13)));
    }

    #[test]
    fn unexpected_binary_degrades_to_null_packet() {
        let mut decoder = Decoder::default();
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, Packet::event("/", Value::Null));
    }

    #[test]
    fn out_of_range_placeholder_becomes_null() {
        let mut decoder = Decoder::default();
        assert!(decoder
            .decode_str(r#"51-["event",{"_placeholder":true,"num":7}]"#)
            .is_none());
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        let PacketData::BinaryEvent(value, _) = packet.inner else {
            panic!("expected a binary event");
        };
        assert!(value.as_array()[1].is_null());
    }

    // Round trips

    #[test]
    fn message_round_trip() {
        let payload = event_value(
            "event",
            vec![
                Value::from(42),
                Value::from(-1),
                Value::from(true),
                Value::Null,
                Value::from("text ™ \"quoted\"\n"),
                Value::Array(vec![Value::from(1.5)]),
                object(vec![("nested", object(vec![("k", Value::from("v"))]))]),
            ],
        );
        let packet = Packet::event("/", payload);
        let (data, bins) = serialize_packet(&packet);
        assert!(bins.is_empty());
        assert_eq!(decode(&data), packet);
    }

    #[test]
    fn binary_round_trip() {
        let payload = event_value(
            "event",
            vec![
                Value::Binary(Bytes::from_static(&[0, 1, 2, 3])),
                object(vec![("blob", Value::Binary(Bytes::from_static(&[9, 8])))]),
            ],
        );
        let mut packet = Packet::event("/nsp", payload);
        packet.inner.set_ack_id(7);

        let (data, bins) = serialize_packet(&packet);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0], Bytes::from_static(&[0, 1, 2, 3]));
        assert_eq!(bins[1], Bytes::from_static(&[9, 8]));

        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(&data).is_none());
        assert!(decoder.decode_bin(bins[0].clone()).is_none());
        let decoded = decoder.decode_bin(bins[1].clone()).unwrap();

        assert_eq!(decoded.ns, packet.ns);
        let PacketData::BinaryEvent(value, Some(7)) = decoded.inner else {
            panic!("expected a binary event with ack id 7");
        };
        let PacketData::Event(original, _) = packet.inner else {
            unreachable!();
        };
        assert_eq!(value, original);
    }

    #[test]
    fn packet_round_trip_with_ns_and_ack() {
        let mut packet = Packet::event("/chat", event_value("m", vec![Value::from("hello")]));
        packet.inner.set_ack_id(4242);
        let (data, _) = serialize_packet(&packet);
        assert_eq!(decode(&data), packet);
    }

    #[test]
    fn double_precision_round_trip() {
        let payload = Value::Array(vec![Value::from(0.123456789012345_f64)]);
        let packet = Packet::event("/", payload.clone());
        let (data, _) = serialize_packet(&packet);
        let decoded = decode(&data);
        let PacketData::Event(value, _) = decoded.inner else {
            panic!("expected an event");
        };
        assert_eq!(value.as_array()[0].as_double(), 0.123456789012345_f64);
    }

    #[test]
    fn text_frame_supersedes_partial_packet() {
        let mut decoder = Decoder::default();
        assert!(decoder.decode_str(r#"51-["e",{"_placeholder":true,"num":0}]"#).is_none());
        // A new text frame drops the half-assembled packet
        let packet = decoder.decode_str(r#"2["fresh"]"#).unwrap();
        assert_eq!(packet, Packet::event("/", event_value("fresh", vec![])));
        // and the stray binary that follows is surfaced as a null packet
        let packet = decoder.decode_bin(Bytes::from_static(&[1])).unwrap();
        assert_eq!(packet, Packet::event("/", Value::Null));
    }
}

//! NDN-TLV packet codec.
//!
//! Implements the NDN Packet Format 0.2 subset used on the wire plus the
//! NDNLPv2 link-protocol wrapping for Nacks, extended with the
//! computation-related Nack reasons. Packets that carry their original
//! wire encoding are passed through byte-exact; decoding never fails but
//! yields [`Packet::Unknown`] for anything it cannot parse.

use crate::error::Error;
use crate::name::Name;
use crate::packet::{Content, Interest, Nack, NackReason, Packet};
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;

/// Packet encoder/decoder for NDN-TLV.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdnTlvCodec;

impl NdnTlvCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encodes a packet, reusing its cached wire encoding when present.
    pub fn encode(&self, packet: &Packet) -> Bytes {
        match packet {
            Packet::Interest(interest) => match &interest.wire {
                Some(wire) => wire.clone(),
                None => self.encode_interest(&interest.name),
            },
            Packet::Content(content) => match &content.wire {
                Some(wire) => wire.clone(),
                None => self.encode_data(&content.name, &content.payload),
            },
            Packet::Nack(nack) => match &nack.wire {
                Some(wire) => wire.clone(),
                None => self.encode_nack(nack),
            },
            Packet::Unknown(wire) => wire.clone(),
        }
    }

    /// Decodes wire bytes into a typed packet.
    ///
    /// The first byte selects the packet type; input that fails to parse
    /// is returned as [`Packet::Unknown`] for the ICN layer to drop.
    pub fn decode(&self, wire: &[u8]) -> Packet {
        let result = match wire.first() {
            Some(&first) if first as u64 == tlv::TLV_DATA => self.decode_data(wire),
            Some(&first) if first as u64 == tlv::TLV_INTEREST => self.decode_interest_packet(wire),
            Some(&first) if first as u64 == tlv::TLV_LP_PACKET => self.decode_nack(wire),
            _ => Err(Error::Packet("unrecognized packet type".into())),
        };
        match result {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("failed to decode {} bytes: {}", wire.len(), e);
                Packet::Unknown(Bytes::copy_from_slice(wire))
            }
        }
    }

    /// Assembles an Interest TLV: Name followed by a 4-byte random Nonce.
    pub fn encode_interest(&self, name: &Name) -> Bytes {
        let mut inner = BytesMut::new();
        name.to_tlv().encode(&mut inner);

        let mut nonce = [0u8; 4];
        OsRng.fill_bytes(&mut nonce);
        TlvElement::new(tlv::TLV_NONCE, nonce.to_vec()).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Assembles a Data TLV: Name, empty MetaInfo, Content payload.
    pub fn encode_data(&self, name: &Name, payload: &Bytes) -> Bytes {
        let mut inner = BytesMut::new();
        name.to_tlv().encode(&mut inner);
        TlvElement::new(tlv::TLV_META_INFO, Bytes::new()).encode(&mut inner);
        TlvElement::new(tlv::TLV_CONTENT, payload.clone()).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Wraps a Nack into an LpPacket carrying the original Interest as
    /// its fragment.
    pub fn encode_nack(&self, nack: &Nack) -> Bytes {
        let mut reason = BytesMut::new();
        tlv::encode_var_number(nack.reason.wire_code(), &mut reason);

        let mut nack_header = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_NACK_REASON, reason.freeze()).encode(&mut nack_header);

        let interest_wire = match &nack.interest.wire {
            Some(wire) => wire.clone(),
            None => self.encode_interest(&nack.interest.name),
        };

        let mut inner = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_NACK, nack_header.freeze()).encode(&mut inner);
        TlvElement::new(tlv::TLV_LP_FRAGMENT, interest_wire).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_PACKET, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    fn decode_interest_packet(&self, wire: &[u8]) -> Result<Packet, Error> {
        let name = self.decode_interest_name(wire)?;
        Ok(Packet::Interest(Interest::with_wire(
            name,
            Bytes::copy_from_slice(wire),
        )))
    }

    fn decode_interest_name(&self, wire: &[u8]) -> Result<Name, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "expected Interest TLV, got type {}",
                outer.tlv_type
            )));
        }
        let mut inner = outer.value;
        let name_element = TlvElement::decode(&mut inner)?;
        // The Nonce and any selectors after the Name are not needed here.
        Name::from_tlv(&name_element)
    }

    fn decode_data(&self, wire: &[u8]) -> Result<Packet, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "expected Data TLV, got type {}",
                outer.tlv_type
            )));
        }

        let mut inner = outer.value;
        let name_element = TlvElement::decode(&mut inner)?;
        let name = Name::from_tlv(&name_element)?;

        let mut payload = None;
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_META_INFO => {}
                tlv::TLV_CONTENT => payload = Some(element.value),
                _ => {}
            }
        }
        let payload = payload.ok_or_else(|| Error::Packet("Data without Content TLV".into()))?;

        Ok(Packet::Content(Content::with_wire(
            name,
            payload,
            Bytes::copy_from_slice(wire),
        )))
    }

    fn decode_nack(&self, wire: &[u8]) -> Result<Packet, Error> {
        let mut buf = Bytes::copy_from_slice(wire);
        let outer = TlvElement::decode(&mut buf)?;
        if outer.tlv_type != tlv::TLV_LP_PACKET {
            return Err(Error::Packet(format!(
                "expected LpPacket TLV, got type {}",
                outer.tlv_type
            )));
        }

        let mut reason = None;
        let mut fragment = None;
        let mut inner = outer.value;
        while inner.has_remaining() {
            let element = TlvElement::decode(&mut inner)?;
            match element.tlv_type {
                tlv::TLV_LP_NACK => {
                    let mut header = element.value;
                    while header.has_remaining() {
                        let field = TlvElement::decode(&mut header)?;
                        if field.tlv_type == tlv::TLV_LP_NACK_REASON {
                            let code = tlv::decode_var_number(&mut field.value.clone())?;
                            reason = NackReason::from_wire_code(code);
                        }
                    }
                }
                tlv::TLV_LP_FRAGMENT => fragment = Some(element.value),
                _ => {}
            }
        }

        let reason =
            reason.ok_or_else(|| Error::Packet("LpPacket without Nack reason".into()))?;
        let fragment =
            fragment.ok_or_else(|| Error::Packet("LpPacket without Interest fragment".into()))?;

        let name = self.decode_interest_name(&fragment)?;
        let interest = Interest::with_wire(name.clone(), fragment);
        Ok(Packet::Nack(Nack {
            name,
            reason,
            interest,
            wire: Some(Bytes::copy_from_slice(wire)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_round_trip() {
        let codec = NdnTlvCodec::new();
        let name = Name::from_string("/test/interest/1");
        let wire = codec.encode_interest(&name);

        match codec.decode(&wire) {
            Packet::Interest(decoded) => {
                assert_eq!(decoded.name, name);
                assert_eq!(decoded.wire.as_deref(), Some(wire.as_ref()));
            }
            other => panic!("expected Interest, got {}", other.kind()),
        }
    }

    #[test]
    fn data_round_trip() {
        let codec = NdnTlvCodec::new();
        let name = Name::from_string("/test/data");
        let payload = Bytes::from_static(b"hello ndn");
        let wire = codec.encode_data(&name, &payload);
        assert_eq!(wire[0] as u64, tlv::TLV_DATA);

        match codec.decode(&wire) {
            Packet::Content(decoded) => {
                assert_eq!(decoded.name, name);
                assert_eq!(decoded.payload, payload);
            }
            other => panic!("expected Content, got {}", other.kind()),
        }
    }

    #[test]
    fn data_encoding_is_deterministic() {
        let codec = NdnTlvCodec::new();
        let name = Name::from_string("/test/data");
        let payload = Bytes::from_static(b"payload");
        assert_eq!(
            codec.encode_data(&name, &payload),
            codec.encode_data(&name, &payload)
        );
    }

    #[test]
    fn interest_differs_only_in_nonce() {
        let codec = NdnTlvCodec::new();
        let name = Name::from_string("/test/nonce");
        let a = codec.encode_interest(&name);
        let b = codec.encode_interest(&name);
        assert_eq!(a.len(), b.len());
        // All bytes up to the 4-byte nonce value at the tail are equal.
        assert_eq!(a[..a.len() - 4], b[..b.len() - 4]);
    }

    #[test]
    fn nack_round_trip() {
        let codec = NdnTlvCodec::new();
        let interest = Interest::new(Name::from_string("/unreachable/name"));
        let nack = Nack::new(NackReason::NoRoute, interest);
        let wire = codec.encode_nack(&nack);
        assert_eq!(wire[0] as u64, tlv::TLV_LP_PACKET);

        match codec.decode(&wire) {
            Packet::Nack(decoded) => {
                assert_eq!(decoded.reason, NackReason::NoRoute);
                assert_eq!(decoded.name, nack.name);
                assert_eq!(decoded.interest.name, nack.name);
            }
            other => panic!("expected Nack, got {}", other.kind()),
        }
    }

    #[test]
    fn computation_nack_reasons_survive_the_wire() {
        let codec = NdnTlvCodec::new();
        for reason in [
            NackReason::NoContent,
            NackReason::CompQueueFull,
            NackReason::CompParamUnavailable,
            NackReason::CompException,
            NackReason::CompTerminated,
        ] {
            let nack = Nack::new(reason, Interest::new(Name::from_string("/call/f/NFN")));
            let wire = codec.encode_nack(&nack);
            match codec.decode(&wire) {
                Packet::Nack(decoded) => assert_eq!(decoded.reason, reason),
                other => panic!("expected Nack, got {}", other.kind()),
            }
        }
    }

    #[test]
    fn garbage_decodes_to_unknown() {
        let codec = NdnTlvCodec::new();
        match codec.decode(&[0xff, 0x00, 0x01]) {
            Packet::Unknown(bytes) => assert_eq!(bytes.as_ref(), &[0xff, 0x00, 0x01]),
            other => panic!("expected Unknown, got {}", other.kind()),
        }
        // A truncated Interest header is equally unparseable.
        match codec.decode(&[0x05, 0x20, 0x07]) {
            Packet::Unknown(_) => {}
            other => panic!("expected Unknown, got {}", other.kind()),
        }
    }

    #[test]
    fn cached_wire_is_reused() {
        let codec = NdnTlvCodec::new();
        let wire = Bytes::from_static(&[0x06, 0x00]);
        let content = Content::with_wire(Name::from_string("/x"), Bytes::new(), wire.clone());
        assert_eq!(codec.encode(&Packet::Content(content)), wire);
    }
}

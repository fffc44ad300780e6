//! Packet types exchanged between layers and on the wire.
//!
//! A [`Packet`] is a tagged value: Interest, Content, Nack, or Unknown.
//! Interests and Contents may carry their original wire encoding so that
//! forwarding does not re-encode a packet it merely relays.

use crate::name::Name;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request for content by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    /// Original wire encoding, if the Interest arrived from the network.
    pub wire: Option<Bytes>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self { name, wire: None }
    }

    pub fn with_wire(name: Name, wire: impl Into<Bytes>) -> Self {
        Self {
            name,
            wire: Some(wire.into()),
        }
    }
}

/// Interests are compared by name; the cached encoding is incidental.
impl PartialEq for Interest {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Interest {}

/// A response carrying the requested name plus a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub name: Name,
    pub payload: Bytes,
    /// Original wire encoding, if the Content arrived from the network.
    pub wire: Option<Bytes>,
}

impl Content {
    pub fn new(name: Name, payload: impl Into<Bytes>) -> Self {
        Self {
            name,
            payload: payload.into(),
            wire: None,
        }
    }

    pub fn with_wire(name: Name, payload: impl Into<Bytes>, wire: impl Into<Bytes>) -> Self {
        Self {
            name,
            payload: payload.into(),
            wire: Some(wire.into()),
        }
    }

    /// Payload interpreted as UTF-8 text, with invalid bytes replaced.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.payload == other.payload
    }
}

impl Eq for Content {}

/// Why an Interest could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NackReason {
    Congestion,
    Duplicate,
    NoRoute,
    NoContent,
    CompQueueFull,
    CompParamUnavailable,
    CompException,
    CompTerminated,
}

impl NackReason {
    /// NDNLPv2 wire value; values above 150 are computation extensions.
    pub fn wire_code(&self) -> u64 {
        match self {
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
            NackReason::NoContent => 160,
            NackReason::CompQueueFull => 161,
            NackReason::CompParamUnavailable => 162,
            NackReason::CompException => 163,
            NackReason::CompTerminated => 164,
        }
    }

    pub fn from_wire_code(code: u64) -> Option<Self> {
        match code {
            50 => Some(NackReason::Congestion),
            100 => Some(NackReason::Duplicate),
            150 => Some(NackReason::NoRoute),
            160 => Some(NackReason::NoContent),
            161 => Some(NackReason::CompQueueFull),
            162 => Some(NackReason::CompParamUnavailable),
            163 => Some(NackReason::CompException),
            164 => Some(NackReason::CompTerminated),
            _ => None,
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NackReason::Congestion => "CONGESTION",
            NackReason::Duplicate => "DUPLICATE",
            NackReason::NoRoute => "NO_ROUTE",
            NackReason::NoContent => "NO_CONTENT",
            NackReason::CompQueueFull => "COMP_QUEUE_FULL",
            NackReason::CompParamUnavailable => "COMP_PARAM_UNAVAILABLE",
            NackReason::CompException => "COMP_EXCEPTION",
            NackReason::CompTerminated => "COMP_TERMINATED",
        };
        write!(f, "{}", s)
    }
}

/// A negative acknowledgement, carrying the Interest it rejects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nack {
    pub name: Name,
    pub reason: NackReason,
    pub interest: Interest,
    pub wire: Option<Bytes>,
}

impl Nack {
    pub fn new(reason: NackReason, interest: Interest) -> Self {
        Self {
            name: interest.name.clone(),
            reason,
            interest,
            wire: None,
        }
    }
}

/// A tagged packet as it travels through the layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Content(Content),
    Nack(Nack),
    /// Wire bytes that did not parse as any known packet type.
    Unknown(Bytes),
}

impl Packet {
    pub fn name(&self) -> Option<&Name> {
        match self {
            Packet::Interest(i) => Some(&i.name),
            Packet::Content(c) => Some(&c.name),
            Packet::Nack(n) => Some(&n.name),
            Packet::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Interest(_) => "Interest",
            Packet::Content(_) => "Content",
            Packet::Nack(_) => "Nack",
            Packet::Unknown(_) => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_equality_ignores_wire() {
        let a = Interest::new(Name::from_string("/a/b"));
        let b = Interest::with_wire(Name::from_string("/a/b"), &[5u8, 0][..]);
        assert_eq!(a, b);
    }

    #[test]
    fn nack_reason_codes_round_trip() {
        let reasons = [
            NackReason::Congestion,
            NackReason::Duplicate,
            NackReason::NoRoute,
            NackReason::NoContent,
            NackReason::CompQueueFull,
            NackReason::CompParamUnavailable,
            NackReason::CompException,
            NackReason::CompTerminated,
        ];
        for reason in reasons {
            assert_eq!(NackReason::from_wire_code(reason.wire_code()), Some(reason));
        }
        assert_eq!(NackReason::from_wire_code(42), None);
    }

    #[test]
    fn nack_carries_interest_name() {
        let interest = Interest::new(Name::from_string("/no/such/route"));
        let nack = Nack::new(NackReason::NoRoute, interest.clone());
        assert_eq!(nack.name, interest.name);
        assert_eq!(nack.reason.wire_code(), 150);
    }
}

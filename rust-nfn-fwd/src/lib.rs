//! The rust-nfn forwarding node.
//!
//! This crate contains the forwarding plane (Content Store, Pending
//! Interest Table, Forwarding Information Base), the routing plane (a
//! tree-structured RIB collapsed into the FIB on a timer), the layered
//! runtime that wires link, packet-encoding, routing, ICN, and
//! autoconfiguration layers together, the repository interface, and the
//! management TCP protocol.

pub mod config;
pub mod layers;
pub mod mgmt;
pub mod repo;
pub mod rib;
pub mod stack;
pub mod tables;

pub use stack::{Envelope, Layer, LayerCtx, LayerStack, Message};

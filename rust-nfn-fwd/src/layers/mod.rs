//! The protocol layers composing a node.
//!
//! A forwarder stacks, top to bottom: NFN (optional, from the compute
//! crate), ICN, autoconfig server (optional), routing (optional),
//! packet encoding, link. A repository node stacks: repository,
//! autoconfig repo, packet encoding, link.

mod autoconfig;
mod encoding;
mod icn;
mod link;
mod repo;
mod routing;

pub use autoconfig::{
    AutoconfigClientLayer, AutoconfigRepoLayer, AutoconfigServerLayer, ServerAdvertisement,
};
pub use encoding::PacketEncodingLayer;
pub use icn::IcnLayer;
pub use link::{FaceTable, UdpLinkLayer};
pub use repo::RepositoryLayer;
pub use routing::RoutingLayer;

use rust_nfn_common::name::Name;

/// Prefix reserved for the autoconfiguration handshake.
pub fn autoconfig_prefix() -> Name {
    Name::from_string("/autoconfig")
}

/// Name on which forwarders are solicited.
pub fn forwarders_name() -> Name {
    Name::from_string("/autoconfig/forwarders")
}

/// Prefix under which services register themselves.
pub fn service_registration_prefix() -> Name {
    Name::from_string("/autoconfig/service")
}

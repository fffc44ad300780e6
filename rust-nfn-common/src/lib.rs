//! Common types and utilities for the rust-nfn forwarder.
//!
//! This crate provides the data model (names and packets), the NDN-TLV
//! wire codec, and the error and metrics types shared by the forwarding,
//! computation, and CLI crates.

pub mod codec;
pub mod error;
pub mod metrics;
pub mod name;
pub mod packet;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

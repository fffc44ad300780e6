//! Error types for the rust-nfn implementation.

use thiserror::Error;

/// All possible errors that can occur within the rust-nfn implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to packet processing.
    #[error("packet error: {0}")]
    Packet(String),

    /// Error related to the forwarding tables (CS, PIT, FIB, RIB).
    #[error("table error: {0}")]
    Table(String),

    /// Error related to the management protocol.
    #[error("management error: {0}")]
    Mgmt(String),

    /// Error related to the autoconfiguration handshake.
    #[error("autoconfig error: {0}")]
    Autoconfig(String),

    /// Error related to an NFN computation.
    #[error("computation error: {0}")]
    Computation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

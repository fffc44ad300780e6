//! Identifiers and protocol constants shared across the layer stack.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum size of an NDN packet on the wire.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Name component marking an Interest as a computation request.
pub const NFN_MARKER: &[u8] = b"NFN";

/// Default Interest/PIT lifetime in milliseconds.
pub const DEFAULT_PIT_LIFETIME_MS: u64 = 4000;

/// Default bound on Content Store entries.
pub const DEFAULT_CS_CAPACITY: usize = 4096;

/// Unique identifier for a face.
///
/// A face stands for a remote endpoint bound to a transport; the link
/// layer maps `(address, port)` pairs onto these ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

//! Forwarding-plane tables: Content Store, Pending Interest Table, and
//! Forwarding Information Base.
//!
//! Every operation on a table is individually atomic; composite
//! decisions (lookup-then-insert) are serialized by running inside the
//! ICN layer's single task.

mod cs;
mod fib;
mod pit;

pub use cs::ContentStore;
pub use fib::{FibEntry, ForwardingInformationBase};
pub use pit::{PendingInterestTable, PitEntry, PitInsert};

//! Pending Interest Table with exact-name matching.

use super::fib::FibEntry;
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::Interest;
use rust_nfn_common::types::FaceId;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// An outstanding Interest with the faces waiting for its Content.
#[derive(Debug, Clone)]
pub struct PitEntry {
    pub name: Name,
    pub interest: Interest,
    pub incoming_faces: BTreeSet<FaceId>,
    pub expiry: Instant,
    /// Content must also be delivered to the application layer above.
    pub local_app: bool,
    /// Content must also be delivered to the NFN layer above.
    pub nfn: bool,
    /// FIB entries already tried for this Interest; the Nack handler
    /// skips them when looking for an alternative face.
    pub used_fib_entries: Vec<FibEntry>,
}

/// Outcome of [`PendingInterestTable::add_or_merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitInsert {
    New,
    Merged,
}

/// One entry per outstanding Interest name; duplicates merge their
/// incoming faces without resetting the expiry.
#[derive(Debug, Default)]
pub struct PendingInterestTable {
    entries: HashMap<Name, PitEntry>,
}

impl PendingInterestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new entry, or merges `face` and the flags into an existing
    /// one. Merging does not extend the original expiry.
    pub fn add_or_merge(
        &mut self,
        interest: &Interest,
        face: Option<FaceId>,
        local_app: bool,
        nfn: bool,
        expiry: Instant,
    ) -> PitInsert {
        match self.entries.get_mut(&interest.name) {
            Some(entry) => {
                if let Some(face) = face {
                    entry.incoming_faces.insert(face);
                }
                entry.local_app |= local_app;
                entry.nfn |= nfn;
                PitInsert::Merged
            }
            None => {
                let mut incoming_faces = BTreeSet::new();
                if let Some(face) = face {
                    incoming_faces.insert(face);
                }
                self.entries.insert(
                    interest.name.clone(),
                    PitEntry {
                        name: interest.name.clone(),
                        interest: interest.clone(),
                        incoming_faces,
                        expiry,
                        local_app,
                        nfn,
                        used_fib_entries: Vec::new(),
                    },
                );
                PitInsert::New
            }
        }
    }

    pub fn find(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    /// Removes and returns the entry so Content can be fanned out to its
    /// incoming faces.
    pub fn remove(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    /// Records a FIB entry as tried for `name`.
    pub fn mark_used(&mut self, name: &Name, fib_entry: FibEntry) {
        if let Some(entry) = self.entries.get_mut(name) {
            if !entry.used_fib_entries.contains(&fib_entry) {
                entry.used_fib_entries.push(fib_entry);
            }
        }
    }

    /// Reaps entries whose expiry has passed and returns them.
    pub fn ageing(&mut self, now: Instant) -> Vec<PitEntry> {
        let expired: Vec<Name> = self
            .entries
            .values()
            .filter(|entry| entry.expiry <= now)
            .map(|entry| entry.name.clone())
            .collect();
        expired
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

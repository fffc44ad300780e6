//! In-memory Forwarding Information Base with longest-prefix matching.

use rust_nfn_common::name::Name;
use rust_nfn_common::types::FaceId;

/// An entry in the Forwarding Information Base.
///
/// Equality is structural on `(name, face)`; the static flag and the
/// advertised distance do not participate.
#[derive(Debug, Clone)]
pub struct FibEntry {
    pub name: Name,
    pub face: FaceId,
    pub static_entry: bool,
    pub distance: Option<u32>,
}

impl FibEntry {
    pub fn new(name: Name, face: FaceId, static_entry: bool) -> Self {
        Self {
            name,
            face,
            static_entry,
            distance: None,
        }
    }
}

impl PartialEq for FibEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.face == other.face
    }
}

impl Eq for FibEntry {}

/// Longest-prefix FIB backed by an ordered list.
///
/// New entries are inserted at the head, so the most recent addition
/// wins among entries with an equally long matching prefix.
#[derive(Debug, Default)]
pub struct ForwardingInformationBase {
    entries: Vec<FibEntry>,
}

impl ForwardingInformationBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry at the head unless `(name, face)` is already present.
    pub fn add(&mut self, name: Name, face: FaceId, static_entry: bool) {
        let entry = FibEntry::new(name, face, static_entry);
        if !self.entries.contains(&entry) {
            self.entries.insert(0, entry);
        }
    }

    /// Removes every entry carrying `name`.
    pub fn remove(&mut self, name: &Name) {
        self.entries.retain(|entry| &entry.name != name);
    }

    /// Longest-prefix match for `name`.
    ///
    /// Starting from the full component list, each prefix is compared
    /// against all entries in order; entries listed in `already_used` or
    /// whose face appears in `incoming_faces` are skipped, which lets the
    /// Nack handler retry with the next-best face. The empty prefix
    /// matches a default route.
    pub fn find(
        &self,
        name: &Name,
        already_used: &[FibEntry],
        incoming_faces: &[FaceId],
    ) -> Option<FibEntry> {
        for prefix_len in (0..=name.len()).rev() {
            let prefix = name.prefix(prefix_len);
            for entry in &self.entries {
                if already_used.contains(entry) {
                    continue;
                }
                if incoming_faces.contains(&entry.face) {
                    continue;
                }
                if entry.name == prefix {
                    return Some(entry.clone());
                }
            }
        }
        None
    }

    /// Removes all non-static entries.
    pub fn clear(&mut self) {
        self.entries.retain(|entry| entry.static_entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/ndn"), FaceId(1), false);
        fib.add(Name::from_string("/ndn/ch/unibas"), FaceId(2), false);

        let deep = Name::from_string("/ndn/ch/unibas/cs/data");
        assert_eq!(fib.find(&deep, &[], &[]).unwrap().face, FaceId(2));

        let shallow = Name::from_string("/ndn/edu/ucla");
        assert_eq!(fib.find(&shallow, &[], &[]).unwrap().face, FaceId(1));

        assert!(fib.find(&Name::from_string("/other"), &[], &[]).is_none());
    }

    #[test]
    fn head_insertion_wins_on_equal_prefix() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/a"), FaceId(1), false);
        fib.add(Name::from_string("/a"), FaceId(2), false);

        let name = Name::from_string("/a/b");
        assert_eq!(fib.find(&name, &[], &[]).unwrap().face, FaceId(2));
    }

    #[test]
    fn already_used_selects_next_best() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/a"), FaceId(1), false);
        fib.add(Name::from_string("/a"), FaceId(2), false);

        let name = Name::from_string("/a/b");
        let first = fib.find(&name, &[], &[]).unwrap();
        assert_eq!(first.face, FaceId(2));
        let second = fib.find(&name, &[first.clone()], &[]).unwrap();
        assert_eq!(second.face, FaceId(1));
        assert!(fib.find(&name, &[first, second], &[]).is_none());
    }

    #[test]
    fn incoming_face_is_skipped() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/a"), FaceId(7), false);

        let name = Name::from_string("/a/b");
        assert!(fib.find(&name, &[], &[FaceId(7)]).is_none());
        assert_eq!(fib.find(&name, &[], &[FaceId(8)]).unwrap().face, FaceId(7));
    }

    #[test]
    fn default_route_matches_everything() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::new(), FaceId(3), false);
        assert_eq!(
            fib.find(&Name::from_string("/any/name"), &[], &[])
                .unwrap()
                .face,
            FaceId(3)
        );
    }

    #[test]
    fn clear_keeps_static_entries() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/static"), FaceId(1), true);
        fib.add(Name::from_string("/dynamic"), FaceId(2), false);
        fib.clear();
        assert_eq!(fib.len(), 1);
        assert_eq!(fib.iter().next().unwrap().name, Name::from_string("/static"));
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/a"), FaceId(1), false);
        fib.add(Name::from_string("/a"), FaceId(1), false);
        assert_eq!(fib.len(), 1);
    }
}

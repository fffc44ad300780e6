//! Tree-structured Routing Information Base.
//!
//! A radix tree keyed by name components; each node holds a distance
//! vector mapping face ids to `(distance, expiry)`. The tree is the
//! source of truth for advertised routes and is collapsed into the FIB
//! periodically. Insertion is only possible through [`RibTree`], the
//! dedicated root type, so a subtree can never be mutated out of
//! context.

use crate::tables::ForwardingInformationBase;
use bytes::Bytes;
use rust_nfn_common::name::{Name, NameComponent};
use rust_nfn_common::types::FaceId;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

#[derive(Debug, Default)]
struct RibNode {
    distance_vector: HashMap<FaceId, (u32, Option<Instant>)>,
    children: BTreeMap<Bytes, RibNode>,
}

impl RibNode {
    fn insert(
        &mut self,
        components: &[NameComponent],
        face: FaceId,
        distance: u32,
        expiry: Option<Instant>,
    ) {
        match components.split_first() {
            None => {
                // Keep the minimum distance per face; an equal or better
                // advertisement refreshes the expiry.
                match self.distance_vector.get(&face) {
                    Some(&(existing, _)) if existing < distance => {}
                    _ => {
                        self.distance_vector.insert(face, (distance, expiry));
                    }
                }
            }
            Some((head, rest)) => {
                self.children
                    .entry(head.as_bytes().clone())
                    .or_default()
                    .insert(rest, face, distance, expiry);
            }
        }
    }

    fn ageing(&mut self, now: Instant) {
        self.distance_vector
            .retain(|_, &mut (_, expiry)| expiry.map_or(true, |e| e >= now));
        for child in self.children.values_mut() {
            child.ageing(now);
        }
        self.children
            .retain(|_, child| !child.distance_vector.is_empty() || !child.children.is_empty());
    }

    /// Best face of this node's own distance vector: minimum distance,
    /// ties broken by smallest face id.
    fn best_face(&self) -> Option<FaceId> {
        self.distance_vector
            .iter()
            .map(|(&face, &(distance, _))| (distance, face))
            .min()
            .map(|(_, face)| face)
    }

    /// Collapses this subtree, carrying the face inherited from the
    /// nearest emitting ancestor.
    ///
    /// A node with its own routes emits `(path, local_best)` when the
    /// local best differs from the inherited face. A node without routes
    /// is transparent, except that two or more child subtrees which all
    /// collapse onto one common face are lifted into a single entry at
    /// this node.
    fn collapse(
        &self,
        path: &mut Vec<Bytes>,
        inherited: Option<FaceId>,
        out: &mut Vec<(Vec<Bytes>, FaceId)>,
    ) {
        if let Some(local_best) = self.best_face() {
            if inherited != Some(local_best) {
                out.push((path.clone(), local_best));
            }
            self.collapse_children(path, Some(local_best), out);
            return;
        }

        if path.is_empty() {
            // The root with no routes emits nothing for the empty path.
            self.collapse_children(path, inherited, out);
            return;
        }

        let mut child_results = Vec::new();
        let mut liftable = self.children.len() >= 2;
        for (component, child) in &self.children {
            path.push(component.clone());
            let mut results = Vec::new();
            child.collapse(path, inherited, &mut results);
            path.pop();
            liftable &= !results.is_empty();
            child_results.push(results);
        }

        if liftable {
            let mut faces = child_results
                .iter()
                .flatten()
                .map(|&(_, face)| face);
            if let Some(first) = faces.next() {
                if faces.all(|face| face == first) {
                    out.push((path.clone(), first));
                    return;
                }
            }
        }
        out.extend(child_results.into_iter().flatten());
    }

    fn collapse_children(
        &self,
        path: &mut Vec<Bytes>,
        inherited: Option<FaceId>,
        out: &mut Vec<(Vec<Bytes>, FaceId)>,
    ) {
        for (component, child) in &self.children {
            path.push(component.clone());
            child.collapse(path, inherited, out);
            path.pop();
        }
    }
}

/// Root of the Routing Information Base.
#[derive(Debug, Default)]
pub struct RibTree {
    root: RibNode,
}

impl RibTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a route for `name` via `face`.
    pub fn insert(&mut self, name: &Name, face: FaceId, distance: u32, expiry: Option<Instant>) {
        self.root.insert(name.components(), face, distance, expiry);
    }

    /// Removes routes whose expiry has passed and prunes empty subtrees.
    pub fn ageing(&mut self, now: Instant) {
        self.root.ageing(now);
    }

    /// Best face for the zero-component default route, if any.
    pub fn best_face(&self) -> Option<FaceId> {
        self.root.best_face()
    }

    /// Collapses the tree into `(prefix components, face)` pairs.
    pub fn collapse(&self) -> Vec<(Vec<Bytes>, FaceId)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.root.collapse(&mut path, None, &mut out);
        out
    }

    /// Replaces the FIB's non-static contents with the collapsed routes.
    pub fn build_fib(&self, fib: &mut ForwardingInformationBase) {
        fib.clear();
        for (components, face) in self.collapse() {
            let name = Name::from_components(
                components.into_iter().map(NameComponent::new).collect(),
            );
            fib.add(name, face, false);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.distance_vector.is_empty() && self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn components(strs: &[&str]) -> Vec<Bytes> {
        strs.iter()
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect()
    }

    #[test]
    fn insert_single_route() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/foo/bar"), FaceId(42), 1337, None);
        assert_eq!(rib.collapse(), vec![(components(&["foo", "bar"]), FaceId(42))]);
    }

    #[test]
    fn best_face_prefers_min_distance_then_min_face() {
        let mut rib = RibTree::new();
        rib.insert(&Name::new(), FaceId(1337), 20, None);
        rib.insert(&Name::new(), FaceId(42), 10, None);
        rib.insert(&Name::new(), FaceId(2), 15, None);
        assert_eq!(rib.best_face(), Some(FaceId(42)));

        let mut tie = RibTree::new();
        tie.insert(&Name::new(), FaceId(9), 5, None);
        tie.insert(&Name::new(), FaceId(4), 5, None);
        assert_eq!(tie.best_face(), Some(FaceId(4)));
    }

    #[test]
    fn insert_keeps_minimum_distance() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/foo"), FaceId(1), 10, None);
        rib.insert(&Name::from_string("/foo"), FaceId(1), 20, None);
        rib.insert(&Name::from_string("/foo"), FaceId(2), 5, None);
        assert_eq!(rib.collapse(), vec![(components(&["foo"]), FaceId(2))]);
    }

    #[test]
    fn collapse_two_routes_same_name() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/foo/bar"), FaceId(42), 1337, None);
        rib.insert(&Name::from_string("/foo/bar"), FaceId(23), 10, None);
        assert_eq!(rib.collapse(), vec![(components(&["foo", "bar"]), FaceId(23))]);
    }

    #[test]
    fn collapse_subtree_entries() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/ndn"), FaceId(0), 5, None);
        rib.insert(&Name::from_string("/ndn/ch/unibas"), FaceId(1), 10, None);
        let collapsed = rib.collapse();
        assert!(collapsed.contains(&(components(&["ndn"]), FaceId(0))));
        assert!(collapsed.contains(&(components(&["ndn", "ch", "unibas"]), FaceId(1))));
    }

    #[test]
    fn subtree_route_equal_to_ancestor_is_not_emitted() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/ndn"), FaceId(0), 5, None);
        rib.insert(&Name::from_string("/ndn/ch"), FaceId(0), 7, None);
        assert_eq!(rib.collapse(), vec![(components(&["ndn"]), FaceId(0))]);
    }

    #[test]
    fn collapse_mixed() {
        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/local"), FaceId(0), 1, None);
        rib.insert(&Name::from_string("/ndn/edu/ucla/ping"), FaceId(1), 42, None);
        rib.insert(&Name::from_string("/ndn/ch/unibas/cs"), FaceId(2), 10, None);
        rib.insert(&Name::from_string("/ndn/ch/unibas/dmi/cn"), FaceId(2), 11, None);
        rib.insert(&Name::from_string("/ndn/ch/unibas/dmi/cn"), FaceId(3), 20, None);
        rib.insert(&Name::from_string("/ndn/ch/unibe"), FaceId(3), 12, None);

        let collapsed = rib.collapse();
        assert!(collapsed.contains(&(components(&["local"]), FaceId(0))));
        assert!(collapsed.contains(&(components(&["ndn", "edu", "ucla", "ping"]), FaceId(1))));
        assert!(collapsed.contains(&(components(&["ndn", "ch", "unibas"]), FaceId(2))));
        assert!(collapsed.contains(&(components(&["ndn", "ch", "unibe"]), FaceId(3))));
        assert_eq!(collapsed.len(), 4);
    }

    #[test]
    fn ageing_removes_expired_routes() {
        let now = Instant::now();
        let mut rib = RibTree::new();
        rib.insert(&Name::new(), FaceId(0), 1, Some(now + Duration::from_secs(86400)));
        rib.insert(&Name::new(), FaceId(1), 2, Some(now - Duration::from_secs(10)));

        rib.ageing(now);
        assert_eq!(rib.best_face(), Some(FaceId(0)));
    }

    #[test]
    fn ageing_prunes_empty_subtrees() {
        let now = Instant::now();
        let mut rib = RibTree::new();
        rib.insert(
            &Name::from_string("/gone/route"),
            FaceId(5),
            1,
            Some(now - Duration::from_secs(1)),
        );
        rib.ageing(now);
        assert!(rib.is_empty());
    }

    #[test]
    fn build_fib_replaces_dynamic_entries() {
        let mut fib = ForwardingInformationBase::new();
        fib.add(Name::from_string("/stale"), FaceId(9), false);
        fib.add(Name::from_string("/pinned"), FaceId(8), true);

        let mut rib = RibTree::new();
        rib.insert(&Name::from_string("/foo/bar"), FaceId(0), 42, None);
        rib.insert(&Name::from_string("/ndn/ch/unibas/dmi/cn"), FaceId(1), 10, None);
        rib.build_fib(&mut fib);

        assert!(fib
            .find(&Name::from_string("/foo/bar/baz"), &[], &[])
            .map(|e| e.face == FaceId(0))
            .unwrap_or(false));
        assert!(fib
            .find(&Name::from_string("/ndn/ch/unibas/dmi/cn"), &[], &[])
            .map(|e| e.face == FaceId(1))
            .unwrap_or(false));
        assert!(fib.find(&Name::from_string("/stale"), &[], &[]).is_none());
        assert!(fib.find(&Name::from_string("/pinned"), &[], &[]).is_some());
    }

    #[test]
    fn root_routes_become_default_route() {
        let mut rib = RibTree::new();
        rib.insert(&Name::new(), FaceId(7), 3, None);
        rib.insert(&Name::from_string("/special"), FaceId(8), 1, None);

        let collapsed = rib.collapse();
        assert!(collapsed.contains(&(vec![], FaceId(7))));
        assert!(collapsed.contains(&(components(&["special"]), FaceId(8))));
        assert_eq!(collapsed.len(), 2);
    }
}

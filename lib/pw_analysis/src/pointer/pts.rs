//! Points-to sets and their differential bookkeeping.

use crate::graph::NodeId;
use fixedbitset::FixedBitSet;
use std::collections::HashMap;
use std::fmt;

/// Set of PAG node ids, backed by a growable bitset.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PtsSet {
    bits: FixedBitSet,
}

impl fmt::Debug for PtsSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.bits.ones()).finish()
    }
}

impl FromIterator<NodeId> for PtsSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl PtsSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the element was not already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        let idx = id.index();
        if idx >= self.bits.len() {
            self.bits.grow(idx + 1);
        }
        !self.bits.put(idx)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.bits.contains(id.index())
    }

    /// Adds every element of `other`, returns `true` if something was added.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.len();
        if other.bits.len() > self.bits.len() {
            self.bits.grow(other.bits.len());
        }
        self.bits.union_with(&other.bits);
        self.len() != before
    }

    /// Elements of `self` missing from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            bits: self.bits.difference(&other.bits).collect(),
        }
    }

    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.ones().next().is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.bits.ones().map(NodeId::new)
    }
}

/// Points-to facts of every node: `propa` holds the facts already
/// propagated, `diff` the facts still to propagate.
#[derive(Debug, Default)]
pub struct DiffPtData {
    diff: HashMap<NodeId, PtsSet>,
    propa: HashMap<NodeId, PtsSet>,
}

impl DiffPtData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `elem` to the pending facts of `node`, unless already propagated.
    pub fn add_pts(&mut self, node: NodeId, elem: NodeId) -> bool {
        if self
            .propa
            .get(&node)
            .map_or(false, |propa| propa.contains(elem))
        {
            return false;
        }
        self.diff.entry(node).or_default().insert(elem)
    }

    /// Schedules every propagated fact of `node` to be propagated again,
    /// along with its pending ones. Returns `false` if the node has no
    /// propagated fact.
    pub fn reset_elem(&mut self, node: NodeId) -> bool {
        match self.propa.get(&node) {
            Some(propa) => {
                self.diff.entry(node).or_default().union_with(propa);
                true
            }
            None => false,
        }
    }

    pub fn union_pts_to(&mut self, dst: NodeId, set: &PtsSet) -> bool {
        let mut changed = false;
        for elem in set.iter() {
            changed |= self.add_pts(dst, elem);
        }
        changed
    }

    /// Pending facts of `src` not yet propagated to `dst`.
    #[must_use]
    pub fn calculate_diff(&self, src: NodeId, dst: NodeId) -> PtsSet {
        let Some(src_diff) = self.diff.get(&src) else {
            return PtsSet::new();
        };
        match self.propa.get(&dst) {
            Some(dst_propa) => src_diff.difference(dst_propa),
            None => src_diff.clone(),
        }
    }

    /// Moves the pending facts of `node` to its propagated facts.
    pub fn flush(&mut self, node: NodeId) {
        if let Some(diff) = self.diff.remove(&node) {
            self.propa.entry(node).or_default().union_with(&diff);
        }
    }

    #[must_use]
    pub fn diff_pts(&self, node: NodeId) -> Option<&PtsSet> {
        self.diff.get(&node)
    }

    #[must_use]
    pub fn propa_pts(&self, node: NodeId) -> Option<&PtsSet> {
        self.propa.get(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeId {
        NodeId::new(i)
    }

    #[test]
    fn pts_set_operations() {
        let mut set = PtsSet::new();
        assert!(set.insert(n(70)));
        assert!(!set.insert(n(70)));
        assert!(set.insert(n(3)));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![n(3), n(70)]);

        let other: PtsSet = [n(3), n(5)].into_iter().collect();
        assert!(!set.is_disjoint(&other));
        assert_eq!(other.difference(&set).iter().collect::<Vec<_>>(), vec![n(5)]);
        assert!(set.union_with(&other));
        assert!(!set.union_with(&other));
        assert_eq!(set.len(), 3);
        assert!(set.contains(n(70)));
        assert!(!set.contains(n(71)));
    }

    #[test]
    fn diff_is_flushed_once() {
        let mut ptd = DiffPtData::new();
        assert!(ptd.add_pts(n(1), n(10)));
        assert!(!ptd.add_pts(n(1), n(10)));
        assert_eq!(ptd.calculate_diff(n(1), n(2)).len(), 1);
        ptd.flush(n(1));
        assert!(ptd.diff_pts(n(1)).is_none());
        assert!(ptd.propa_pts(n(1)).unwrap().contains(n(10)));
        // already propagated facts are not pending again
        assert!(!ptd.add_pts(n(1), n(10)));
        assert!(ptd.calculate_diff(n(1), n(1)).is_empty());

        assert!(ptd.reset_elem(n(1)));
        assert!(!ptd.reset_elem(n(2)));
        assert_eq!(ptd.diff_pts(n(1)).unwrap().len(), 1);
        // reset facts are not new with respect to the node itself
        assert!(ptd.calculate_diff(n(1), n(1)).is_empty());

        // pending facts survive a reset
        assert!(ptd.add_pts(n(1), n(11)));
        assert!(ptd.reset_elem(n(1)));
        assert_eq!(ptd.diff_pts(n(1)).unwrap().len(), 2);
        assert_eq!(ptd.calculate_diff(n(1), n(1)).len(), 1);
    }

    #[test]
    fn facts_flow_to_other_nodes() {
        let mut ptd = DiffPtData::new();
        ptd.add_pts(n(1), n(10));
        ptd.add_pts(n(2), n(10));
        ptd.flush(n(2));
        ptd.add_pts(n(1), n(11));

        // only what `dst` has not propagated yet is pending on the way
        let diff = ptd.calculate_diff(n(1), n(2));
        assert_eq!(diff.iter().collect::<Vec<_>>(), vec![n(11)]);
        assert!(ptd.union_pts_to(n(2), &diff));
        assert!(!ptd.union_pts_to(n(2), &diff));
        assert_eq!(ptd.diff_pts(n(2)).unwrap().len(), 1);
        assert_eq!(ptd.propa_pts(n(2)).unwrap().len(), 1);
    }
}

//! Disjoint-set union over indices `0..n`.
//!
//! Used to merge policy addition sets that transitively overlap the same
//! existing owner. The smaller root always wins a union, so the earliest
//! list index ends up as the representative of its group.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct UnionFind {
    representatives: Vec<usize>,
}

impl UnionFind {
    pub fn new(num_sets: usize) -> Self {
        Self {
            representatives: (0..num_sets).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }

    /// Merge the groups containing `a` and `b`.
    pub fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        if root_a < root_b {
            self.representatives[root_b] = root_a;
        } else {
            self.representatives[root_a] = root_b;
        }
    }

    /// Representative of `x`'s group, compressing the path on the way.
    pub fn find(&mut self, x: usize) -> usize {
        assert!(x < self.representatives.len(), "index {x} out of range");

        let mut root = x;
        while self.representatives[root] != root {
            root = self.representatives[root];
        }

        let mut current = x;
        while self.representatives[current] != root {
            let next = self.representatives[current];
            self.representatives[current] = root;
            current = next;
        }
        root
    }

    /// Every representative mapped to the indices merged into it (itself excluded).
    pub fn sets_mapping(&mut self) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut mapping: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for index in 0..self.representatives.len() {
            let root = self.find(index);
            let children = mapping.entry(root).or_default();
            if root != index {
                children.insert(index);
            }
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_as_singletons() {
        let mut uf = UnionFind::new(3);
        let mapping = uf.sets_mapping();
        assert_eq!(mapping.len(), 3);
        assert!(mapping.values().all(BTreeSet::is_empty));
    }

    #[test]
    fn lowest_index_becomes_representative() {
        let mut uf = UnionFind::new(5);
        uf.union(3, 4);
        uf.union(4, 1);
        uf.union(2, 3);

        assert_eq!(uf.find(4), 1);
        let mapping = uf.sets_mapping();
        assert_eq!(mapping.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(mapping[&1], BTreeSet::from([2, 3, 4]));
    }

    #[test]
    fn union_is_idempotent() {
        let mut uf = UnionFind::new(2);
        uf.union(0, 1);
        uf.union(1, 0);
        uf.union(0, 1);
        assert_eq!(uf.sets_mapping(), BTreeMap::from([(0, BTreeSet::from([1]))]));
    }

    #[test]
    #[should_panic]
    fn find_out_of_range_panics() {
        let mut uf = UnionFind::new(1);
        uf.find(1);
    }
}

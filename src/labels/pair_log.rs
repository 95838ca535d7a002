// src/labels/pair_log.rs

//! Append-only log of object-pair equivalences.
//!
//! Every `(a, b)` pair recorded by the stitcher lands here and is unioned
//! into a lazily maintained [`DisjointSet`]. The log itself is kept so that
//! a full stitching map can be materialised at any point, and so that
//! `clear` can discard the derived state wholesale.

use bitvec::prelude::*;

use crate::labels::disjoint_set::DisjointSet;
use crate::utils::error::Result;

/// Object-pair equivalence log plus the disjoint set derived from it.
#[derive(Debug, Clone, Default)]
pub struct ObjectPairLog {
    pairs: Vec<(i32, i32)>,
    set: DisjointSet,
}

impl ObjectPairLog {
    pub fn new() -> Self {
        ObjectPairLog::default()
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[(i32, i32)] {
        &self.pairs
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.set.clear();
    }

    /// Appends a pair and unions the two labels.
    pub fn add_pair(&mut self, a: i32, b: i32) -> Result<()> {
        self.set.union(a, b)?;
        self.pairs.push((a, b));
        Ok(())
    }

    /// Current base of `x` (fast path: `parent_or_this`).
    pub fn reindex(&self, x: i32) -> i32 {
        self.set.parent_or_this(x)
    }

    /// Flattens the derived set so [`ObjectPairLog::reindex`] is a
    /// single-level lookup.
    pub fn resolve_all_bases(&mut self) {
        self.set.resolve_all_bases();
    }

    /// Full stitching map for labels `[0, n)`.
    pub fn reindex_table(&mut self, n: usize) -> Result<Vec<i32>> {
        self.set.reindex_table(n)
    }

    pub fn disjoint_set(&self) -> &DisjointSet {
        &self.set
    }

    /// Funnels a bit-set over raw labels into a bit-set over base labels:
    /// the base bit is set iff **every** raw label mapped to that base had
    /// its bit set. An AND, not an OR: one cleared constituent clears the
    /// whole object.
    pub fn reindex_by_and(&mut self, bits: &BitSlice) -> Result<BitVec> {
        let n = bits.len();
        let mut out = bitvec![1; n];
        for raw in 0..n {
            // Smallest-base-wins unions keep every base <= its raw labels.
            let base = self.set.find_base(raw as i32)? as usize;
            if !bits[raw] && base < n {
                out.set(base, false);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stitching_is_transitive() {
        let mut log = ObjectPairLog::new();
        log.add_pair(4, 7).unwrap();
        log.add_pair(7, 9).unwrap();
        log.resolve_all_bases();
        assert_eq!(log.reindex(4), log.reindex(9));
        assert_eq!(log.reindex(9), 4);
        assert_eq!(log.num_pairs(), 2);
    }

    #[test]
    fn reindex_table_materialises_stitching_map() {
        let mut log = ObjectPairLog::new();
        log.add_pair(1, 2).unwrap();
        log.add_pair(4, 3).unwrap();
        let table = log.reindex_table(5).unwrap();
        assert_eq!(table, vec![0, 1, 1, 3, 3]);
    }

    #[test]
    fn reindex_by_and_requires_all_constituents() {
        let mut log = ObjectPairLog::new();
        log.add_pair(1, 2).unwrap();
        log.add_pair(3, 4).unwrap();
        // Raw labels 1 and 2 form one object, 3 and 4 another.
        let mut complete = bitvec![1; 5];
        complete.set(2, false); // one piece of the first object incomplete
        let by_base = log.reindex_by_and(&complete).unwrap();
        assert!(!by_base[1], "object 1 has an incomplete piece");
        assert!(by_base[3], "object 3 is complete in every piece");
        assert!(by_base[0], "untouched label keeps its bit");
    }

    #[test]
    fn clear_discards_pairs_and_bases() {
        let mut log = ObjectPairLog::new();
        log.add_pair(1, 2).unwrap();
        log.clear();
        assert_eq!(log.num_pairs(), 0);
        assert_eq!(log.reindex(2), 2);
    }
}

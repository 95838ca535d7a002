// src/labels/disjoint_set.rs

//! Dynamic union-find over 31-bit integer labels.
//!
//! The parent array grows on demand: a label outside the array is its own
//! base. Union keeps the numerically smallest representative, so a base is
//! never larger than any label merged into it and reindex tables stay
//! monotone in input order.

use crate::utils::error::{MapError, Result};

/// Largest legal label value: `2^31 - 2`.
pub const MAX_LABEL: i32 = i32::MAX - 1;

/// Union-find with path compression over non-negative integer labels.
///
/// Single-writer: reads through [`DisjointSet::parent_or_this`] are safe to
/// run in parallel passes only while no union is in progress.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    // parent[x] <= x always; parent[x] == x for a root.
    parent: Vec<i32>,
}

impl DisjointSet {
    pub fn new() -> Self {
        DisjointSet { parent: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn clear(&mut self) {
        self.parent.clear();
    }

    fn check_label(label: i32) -> Result<usize> {
        if !(0..=MAX_LABEL).contains(&label) {
            return Err(MapError::BadInput(format!(
                "label {} outside [0, {}]",
                label, MAX_LABEL
            )));
        }
        Ok(label as usize)
    }

    fn grow_to(&mut self, label: usize) {
        if label >= self.parent.len() {
            let old = self.parent.len();
            self.parent.reserve(label + 1 - old);
            for x in old..=label {
                self.parent.push(x as i32);
            }
        }
    }

    /// Base representative of `x`, with full path compression.
    pub fn find_base(&mut self, x: i32) -> Result<i32> {
        let index = Self::check_label(x)?;
        if index >= self.parent.len() {
            return Ok(x);
        }
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Compress the walked path.
        let mut cursor = x;
        while cursor != root {
            let next = self.parent[cursor as usize];
            self.parent[cursor as usize] = root;
            cursor = next;
        }
        Ok(root)
    }

    /// Declares `a` and `b` equivalent; the numerically smallest base
    /// survives. Returns the surviving base.
    pub fn union(&mut self, a: i32, b: i32) -> Result<i32> {
        let ra = self.find_base(a)?;
        let rb = self.find_base(b)?;
        if ra == rb {
            return Ok(ra);
        }
        let (winner, loser) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.grow_to(loser as usize);
        self.parent[loser as usize] = winner;
        Ok(winner)
    }

    /// Fast non-mutating read: `x` itself when unknown, otherwise its
    /// (possibly not fully compressed) representative. Single-level after
    /// [`DisjointSet::resolve_all_bases`].
    pub fn parent_or_this(&self, x: i32) -> i32 {
        let index = x as usize;
        if x < 0 || index >= self.parent.len() {
            return x;
        }
        self.parent[index]
    }

    /// Flattens every chain so that `parent_or_this` becomes a single-level
    /// lookup. Called before parallel read passes.
    pub fn resolve_all_bases(&mut self) {
        // parent[x] <= x, so a single ascending sweep flattens everything.
        for x in 0..self.parent.len() {
            let p = self.parent[x] as usize;
            self.parent[x] = self.parent[p];
        }
    }

    /// Base of every label in `[0, n)`, produced in one pass. Idempotent:
    /// repeated calls yield the same table.
    pub fn reindex_table(&mut self, n: usize) -> Result<Vec<i32>> {
        if n > MAX_LABEL as usize + 1 {
            return Err(MapError::BadInput(format!(
                "reindex table size {} exceeds label range",
                n
            )));
        }
        self.resolve_all_bases();
        let mut table = Vec::with_capacity(n);
        for x in 0..n {
            table.push(self.parent_or_this(x as i32));
        }
        Ok(table)
    }
}

// src/graph/linking.rs

//! Minimum-cost linking of two sorted coordinate sets on a line.
//!
//! Given sorted ascending coordinates `S[0..m)` and `T[0..n)`, the linker
//! pairs elements so that pairs never cross and the total `|S[i] - T[j]|`
//! over the returned links is minimal; elements of the longer tail may be
//! left dangling.
//!
//! The problem is solved on an implicit DAG of `m*n + 1` vertices. Vertex 0
//! is the source; vertex `v = 1 + i + j*m` means "linked through `S[i]` and
//! `T[j]`". Outgoing edges advance i, j, or both, each weighted by the
//! `|delta|` of the pair being entered; the source emits a single edge into
//! `(0, 0)`. All edges lead to larger vertex indices, so the sorted-acyclic
//! finder solves the graph in `O(m*n)`; the dense Dijkstra twin exists to
//! cross-check and must produce identical links.
//!
//! Decoding the shortest path: the source edge and every diagonal step
//! enter a fresh `(i, j)` pair and yield a link; a single-axis step leaves
//! the advanced element dangling.

use crate::graph::shortest_path::{dijkstra, sorted_acyclic, ShortestPaths, WeightedDigraph};
use crate::utils::error::{MapError, Result};

/// One accepted pairing between `S[source_index]` and `T[target_index]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub source_index: usize,
    pub target_index: usize,
    /// `|S[source_index] - T[target_index]|`.
    pub cost: f64,
}

/// Implicit linking DAG over two coordinate arrays.
struct LinkingGraph<'a> {
    s: &'a [f64],
    t: &'a [f64],
}

impl<'a> LinkingGraph<'a> {
    fn m(&self) -> usize {
        self.s.len()
    }

    fn pair_of(&self, v: usize) -> (usize, usize) {
        ((v - 1) % self.m(), (v - 1) / self.m())
    }

    fn pair_cost(&self, i: usize, j: usize) -> f64 {
        (self.s[i] - self.t[j]).abs()
    }

    /// Outgoing edges of `v` in a fixed order: advance-S, advance-T,
    /// diagonal. The order is part of the tie-breaking contract.
    fn edges_of(&self, v: usize) -> ([(usize, f64); 3], usize) {
        let mut edges = [(0usize, 0.0f64); 3];
        let mut count = 0;
        if v == 0 {
            edges[0] = (1, self.pair_cost(0, 0));
            return (edges, 1);
        }
        let m = self.m();
        let n = self.t.len();
        let (i, j) = self.pair_of(v);
        if i + 1 < m {
            edges[count] = (v + 1, self.pair_cost(i + 1, j));
            count += 1;
        }
        if j + 1 < n {
            edges[count] = (v + m, self.pair_cost(i, j + 1));
            count += 1;
        }
        if i + 1 < m && j + 1 < n {
            edges[count] = (v + m + 1, self.pair_cost(i + 1, j + 1));
            count += 1;
        }
        (edges, count)
    }
}

impl<'a> WeightedDigraph for LinkingGraph<'a> {
    fn num_vertices(&self) -> usize {
        self.s.len() * self.t.len() + 1
    }

    fn out_degree(&self, v: usize) -> usize {
        self.edges_of(v).1
    }

    fn neighbor(&self, v: usize, k: usize) -> usize {
        self.edges_of(v).0[k].0
    }

    fn edge_weight(&self, v: usize, k: usize) -> f64 {
        self.edges_of(v).0[k].1
    }
}

fn validate_coordinates(name: &str, coords: &[f64]) -> Result<()> {
    if coords.is_empty() {
        return Err(MapError::BadInput(format!(
            "{} coordinates must not be empty",
            name
        )));
    }
    if coords.windows(2).any(|w| w[0] > w[1]) {
        return Err(MapError::BadInput(format!(
            "{} coordinates must be sorted ascending",
            name
        )));
    }
    Ok(())
}

fn decode_links(graph: &LinkingGraph<'_>, paths: &ShortestPaths) -> Result<Vec<Link>> {
    let target = graph.num_vertices() - 1;
    let path = paths.path_to(target)?;
    let mut links = Vec::new();
    for step in path.windows(2) {
        let (from, to) = (step[0], step[1]);
        let (ti, tj) = graph.pair_of(to);
        let is_link = if from == 0 {
            true
        } else {
            let (fi, fj) = graph.pair_of(from);
            ti == fi + 1 && tj == fj + 1
        };
        if is_link {
            links.push(Link {
                source_index: ti,
                target_index: tj,
                cost: graph.pair_cost(ti, tj),
            });
        }
    }
    Ok(links)
}

/// Minimum-cost non-crossing linking via the sorted-acyclic finder.
pub fn min_cost_linking(s: &[f64], t: &[f64]) -> Result<Vec<Link>> {
    validate_coordinates("source", s)?;
    validate_coordinates("target", t)?;
    let graph = LinkingGraph { s, t };
    let paths = sorted_acyclic(&graph, 0)?;
    decode_links(&graph, &paths)
}

/// Same linking through dense Dijkstra; produces identical links (ties are
/// broken by vertex index in both finders).
pub fn min_cost_linking_dijkstra(s: &[f64], t: &[f64]) -> Result<Vec<Link>> {
    validate_coordinates("source", s)?;
    validate_coordinates("target", t)?;
    let graph = LinkingGraph { s, t };
    let paths = dijkstra(&graph, 0)?;
    decode_links(&graph, &paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_cost(links: &[Link]) -> f64 {
        links.iter().map(|l| l.cost).sum()
    }

    #[test]
    fn three_to_two_leaves_far_source_dangling() {
        let s = [0.0, 10.0, 30.0];
        let t = [5.0, 12.0];
        let links = min_cost_linking(&s, &t).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].source_index, 0);
        assert_eq!(links[0].target_index, 0);
        assert_eq!(links[0].cost, 5.0);
        assert_eq!(links[1].source_index, 1);
        assert_eq!(links[1].target_index, 1);
        assert_eq!(links[1].cost, 2.0);
        assert_eq!(total_cost(&links), 7.0);
        // S[2] = 30 dangles.
        assert!(links.iter().all(|l| l.source_index != 2));
    }

    #[test]
    fn dijkstra_and_sorted_acyclic_agree() {
        let cases: [(&[f64], &[f64]); 4] = [
            (&[0.0, 10.0, 30.0], &[5.0, 12.0]),
            (&[1.0], &[4.0]),
            (&[0.0, 1.0, 2.0, 3.0], &[0.5, 2.5]),
            (&[5.0, 6.0], &[0.0, 5.5, 6.5, 20.0]),
        ];
        for (s, t) in cases {
            let a = min_cost_linking(s, t).unwrap();
            let b = min_cost_linking_dijkstra(s, t).unwrap();
            assert_eq!(a, b, "link sets differ for S={:?}, T={:?}", s, t);
        }
    }

    #[test]
    fn single_pair() {
        let links = min_cost_linking(&[2.0], &[7.5]).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].cost, 5.5);
    }

    #[test]
    fn links_never_cross() {
        let s = [0.0, 4.0, 8.0, 12.0];
        let t = [3.0, 5.0, 11.0];
        let links = min_cost_linking(&s, &t).unwrap();
        for pair in links.windows(2) {
            assert!(pair[0].source_index < pair[1].source_index);
            assert!(pair[0].target_index < pair[1].target_index);
        }
    }

    #[test]
    fn unsorted_input_rejected() {
        assert!(matches!(
            min_cost_linking(&[3.0, 1.0], &[0.0]),
            Err(MapError::BadInput(_))
        ));
        assert!(matches!(
            min_cost_linking(&[], &[0.0]),
            Err(MapError::BadInput(_))
        ));
    }
}

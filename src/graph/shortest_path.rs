// src/graph/shortest_path.rs

//! Single-source shortest paths over an implicit weighted digraph.
//!
//! The graph is a pure capability — vertex count, out-degree, k-th
//! neighbour, k-th edge weight — so callers can expose large implicit
//! graphs (the linker's `m*n + 1` vertices) without materialising node or
//! edge objects. Two finders are provided:
//!
//! - [`dijkstra`]: dense Dijkstra without a priority queue, scanning for
//!   the unvisited vertex of minimum tentative distance;
//! - [`sorted_acyclic`]: for graphs where every edge `v1 -> v2` satisfies
//!   `v2 > v1`, a single relaxation sweep in vertex-index order.
//!
//! Both finders break distance ties toward the smallest predecessor index,
//! so they produce identical predecessor trees on the same graph.

use crate::utils::error::{MapError, Result};

/// Capability view of a weighted directed graph.
pub trait WeightedDigraph {
    fn num_vertices(&self) -> usize;

    /// Number of outgoing edges of `v`.
    fn out_degree(&self, v: usize) -> usize;

    /// Target of the `k`-th outgoing edge of `v`, `k < out_degree(v)`.
    fn neighbor(&self, v: usize, k: usize) -> usize;

    /// Weight of the `k`-th outgoing edge of `v`; must be non-negative.
    fn edge_weight(&self, v: usize, k: usize) -> f64;
}

/// Tentative distances and predecessor tree for one start vertex.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    start: usize,
    distances: Vec<f64>,
    // previous[start] == start; < 0 means unreachable.
    previous: Vec<i64>,
}

impl ShortestPaths {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn num_vertices(&self) -> usize {
        self.distances.len()
    }

    /// Distance from the start vertex; infinite when unreachable.
    pub fn distance(&self, v: usize) -> f64 {
        self.distances[v]
    }

    pub fn is_reachable(&self, v: usize) -> bool {
        self.previous[v] >= 0
    }

    /// Predecessor of `v` on its shortest path; the start vertex is its own
    /// predecessor.
    pub fn previous_in_path(&self, v: usize) -> i64 {
        self.previous[v]
    }

    /// Vertices from the start to `target`, inclusive.
    ///
    /// A predecessor chain longer than the vertex count means the result
    /// arrays were mutated concurrently; that is reported as `Internal`
    /// rather than looping forever.
    pub fn path_to(&self, target: usize) -> Result<Vec<usize>> {
        let n = self.distances.len();
        if target >= n {
            return Err(MapError::BadInput(format!(
                "path target {} out of range, graph has {} vertices",
                target, n
            )));
        }
        if self.previous[target] < 0 {
            return Err(MapError::NotFound(format!(
                "vertex {} is not reachable from {}",
                target, self.start
            )));
        }
        let mut path = Vec::new();
        let mut cursor = target;
        loop {
            path.push(cursor);
            if cursor == self.start {
                break;
            }
            if path.len() > n {
                return Err(MapError::Internal(format!(
                    "predecessor cycle while walking back from {}",
                    target
                )));
            }
            cursor = self.previous[cursor] as usize;
        }
        path.reverse();
        Ok(path)
    }
}

fn relax_edges(
    graph: &impl WeightedDigraph,
    v: usize,
    distances: &mut [f64],
    previous: &mut [i64],
) -> Result<()> {
    let n = distances.len();
    for k in 0..graph.out_degree(v) {
        let w = graph.neighbor(v, k);
        if w >= n {
            return Err(MapError::Internal(format!(
                "graph reports neighbor {} of vertex {} outside {} vertices",
                w, v, n
            )));
        }
        let d = distances[v] + graph.edge_weight(v, k);
        // Ties go to the smallest predecessor index so both finders agree.
        if d < distances[w] || (d == distances[w] && (v as i64) < previous[w]) {
            distances[w] = d;
            previous[w] = v as i64;
        }
    }
    Ok(())
}

/// Dense Dijkstra without a priority queue.
pub fn dijkstra(graph: &impl WeightedDigraph, start: usize) -> Result<ShortestPaths> {
    let n = graph.num_vertices();
    if start >= n {
        return Err(MapError::BadInput(format!(
            "start vertex {} out of range, graph has {} vertices",
            start, n
        )));
    }
    let mut distances = vec![f64::INFINITY; n];
    let mut previous = vec![-1i64; n];
    let mut visited = vec![false; n];
    distances[start] = 0.0;
    previous[start] = start as i64;

    loop {
        // Strict comparison keeps the lowest index among equal minima.
        let mut v = usize::MAX;
        let mut best = f64::INFINITY;
        for (u, d) in distances.iter().enumerate() {
            if !visited[u] && *d < best {
                best = *d;
                v = u;
            }
        }
        if v == usize::MAX {
            break;
        }
        visited[v] = true;
        relax_edges(graph, v, &mut distances, &mut previous)?;
    }

    Ok(ShortestPaths {
        start,
        distances,
        previous,
    })
}

/// Shortest paths for a topologically sorted acyclic graph: every edge must
/// lead to a strictly larger vertex index. The precondition is validated up
/// front; violation is `BadInput`.
pub fn sorted_acyclic(graph: &impl WeightedDigraph, start: usize) -> Result<ShortestPaths> {
    let n = graph.num_vertices();
    if start >= n {
        return Err(MapError::BadInput(format!(
            "start vertex {} out of range, graph has {} vertices",
            start, n
        )));
    }
    for v in 0..n {
        for k in 0..graph.out_degree(v) {
            let w = graph.neighbor(v, k);
            if w <= v {
                return Err(MapError::BadInput(format!(
                    "edge {} -> {} violates sorted-acyclic ordering",
                    v, w
                )));
            }
        }
    }
    let mut distances = vec![f64::INFINITY; n];
    let mut previous = vec![-1i64; n];
    distances[start] = 0.0;
    previous[start] = start as i64;

    for v in start..n {
        if distances[v].is_finite() {
            relax_edges(graph, v, &mut distances, &mut previous)?;
        }
    }

    Ok(ShortestPaths {
        start,
        distances,
        previous,
    })
}

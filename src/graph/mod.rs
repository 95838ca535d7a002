//! Graph algorithms backing the stitcher: shortest paths over implicit
//! digraphs and minimum-cost linking on a line.

pub mod linking;
pub mod shortest_path;

// Re-export commonly used items
pub use linking::{min_cost_linking, min_cost_linking_dijkstra, Link};
pub use shortest_path::{dijkstra, sorted_acyclic, ShortestPaths, WeightedDigraph};

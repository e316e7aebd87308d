//! Global-sort strategy (Kruskal)
//!
//! Sorts every edge once by `(weight, u, v)` and greedily keeps the edges
//! that join two different components.
//!
//! Time: O(E log E) for sorting + O(E α(V)) for union-find.

use crate::graph::{Edge, UnionFind, WeightedGraph};

/// Select minimum spanning forest edges by global edge sort.
///
/// Deterministic: equal weights are ordered by lower then higher endpoint.
pub fn kruskal(graph: &WeightedGraph) -> Vec<Edge> {
    let n = graph.vertex_count();

    let mut edges: Vec<Edge> = graph.edges().collect();
    edges.sort_unstable();

    let mut uf = UnionFind::unranked(n);
    let mut selected = Vec::with_capacity(n.saturating_sub(1));

    for edge in edges {
        if uf.union(edge.u, edge.v) {
            selected.push(edge);

            // A spanning tree is complete at n-1 edges
            if selected.len() + 1 == n {
                break;
            }
        }
    }

    selected
}

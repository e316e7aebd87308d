//! Round-based strategy (Borůvka)
//!
//! Each round every component picks its cheapest edge to another
//! component; all picks are merged at once. Rounds repeat until one adds
//! nothing. At most O(log V) rounds, each a full O(V²) pass over the
//! adjacency matrix.

use crate::graph::{Edge, UnionFind, WeightedGraph};
use tracing::trace;

/// Select minimum spanning forest edges by repeated component merging.
///
/// Candidates compare by `(weight, u, v)`, so every component agrees on the
/// order of tied edges and a round can never close a cycle.
pub fn boruvka(graph: &WeightedGraph) -> Vec<Edge> {
    let n = graph.vertex_count();
    let mut uf = UnionFind::ranked(n);
    let mut selected = Vec::with_capacity(n.saturating_sub(1));
    let mut rounds = 0usize;

    loop {
        rounds += 1;

        // Cheapest crossing edge per component root
        let mut cheapest: Vec<Option<Edge>> = vec![None; n];

        for u in 0..n {
            let root_u = uf.find(u);
            for (v, weight) in graph.neighbors(u) {
                if uf.find(v) == root_u {
                    continue;
                }
                let candidate = Edge::new(u, v, weight);
                let slot = &mut cheapest[root_u];
                if slot.map_or(true, |best| candidate < best) {
                    *slot = Some(candidate);
                }
            }
        }

        let mut merged = 0usize;
        for edge in cheapest.into_iter().flatten() {
            // Two components may have picked the same edge
            if uf.union(edge.u, edge.v) {
                selected.push(edge);
                merged += 1;
            }
        }

        trace!(round = rounds, merged, components = uf.component_count(), "Boruvka round");

        if merged == 0 {
            break;
        }
    }

    selected
}

//! Path and weight queries over a spanning tree
//!
//! Every pair of vertices in the same tree component has exactly one simple
//! path, so both path queries return that path; they differ in how they
//! find it. Out-of-range endpoints and unreachable targets give an empty
//! path.

use crate::graph::Weight;
use crate::mst::SpanningTree;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Returned by [`SpanningTree::average_distance`] when the tree has no edges
pub const NO_EDGES: i64 = -1;

impl SpanningTree {
    /// Minimum-weight path from `source` to `target`.
    ///
    /// Dijkstra over the tree edges; correct on a forest as well.
    pub fn shortest_path(&self, source: usize, target: usize) -> Vec<usize> {
        let n = self.vertex_count();
        if source >= n || target >= n {
            return Vec::new();
        }

        let mut distances = vec![Weight::MAX; n];
        let mut predecessors: Vec<Option<usize>> = vec![None; n];
        let mut settled = vec![false; n];

        distances[source] = 0;
        let mut heap: BinaryHeap<Reverse<(Weight, usize)>> = BinaryHeap::new();
        heap.push(Reverse((0, source)));

        while let Some(Reverse((dist, u))) = heap.pop() {
            if settled[u] {
                continue;
            }
            settled[u] = true;

            if u == target {
                break;
            }

            for (v, weight) in self.matrix().neighbors(u) {
                let candidate = dist.saturating_add(weight);
                if !settled[v] && candidate < distances[v] {
                    distances[v] = candidate;
                    predecessors[v] = Some(u);
                    heap.push(Reverse((candidate, v)));
                }
            }
        }

        if !settled[target] {
            return Vec::new();
        }
        walk_back(&predecessors, source, target)
    }

    /// Longest simple path (by edge count) from `source` to `target`.
    ///
    /// `source == target` gives `[source]`. The traversal is an explicit
    /// stack walk from `source`, linear in the tree size.
    pub fn longest_path(&self, source: usize, target: usize) -> Vec<usize> {
        let n = self.vertex_count();
        if source >= n || target >= n {
            return Vec::new();
        }
        if source == target {
            return vec![source];
        }

        let mut predecessors: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut stack = vec![source];
        visited[source] = true;

        while let Some(u) = stack.pop() {
            if u == target {
                break;
            }
            for (v, _) in self.matrix().neighbors(u) {
                if !visited[v] {
                    visited[v] = true;
                    predecessors[v] = Some(u);
                    stack.push(v);
                }
            }
        }

        if !visited[target] {
            return Vec::new();
        }
        walk_back(&predecessors, source, target)
    }

    /// Mean tree edge weight, rounded as `(sum + count) / count`.
    ///
    /// Returns [`NO_EDGES`] for a tree without edges.
    pub fn average_distance(&self) -> i64 {
        let count = self.edge_count() as u64;
        if count == 0 {
            return NO_EDGES;
        }
        let sum = self.total_weight();
        ((sum + count) / count) as i64
    }

    /// Matrix rows for display, one `Vec` per vertex
    pub fn rows(&self) -> Vec<Vec<Weight>> {
        self.matrix().to_rows()
    }
}

/// Follow predecessors from `target` back to `source` and reverse
fn walk_back(predecessors: &[Option<usize>], source: usize, target: usize) -> Vec<usize> {
    let mut path = vec![target];
    let mut node = target;
    while node != source {
        match predecessors[node] {
            Some(prev) => {
                path.push(prev);
                node = prev;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

//! Disjoint-set forest used by both MST strategies
//!
//! `find` compresses paths iteratively so deep chains never recurse.
//! The rank array is optional: the global-sort strategy links roots
//! arbitrarily, the round-based strategy links by rank.

/// Union-Find data structure with path compression and optional union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Option<Vec<u8>>,
    components: usize,
}

impl UnionFind {
    /// Create a union-find that links by rank
    pub fn ranked(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: Some(vec![0; n]),
            components: n,
        }
    }

    /// Create a union-find that attaches the second root under the first
    pub fn unranked(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: None,
            components: n,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns true if there are no elements
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint components
    pub fn component_count(&self) -> usize {
        self.components
    }

    /// Representative of `x`'s component.
    ///
    /// Every node visited on the way up is repointed directly at the root.
    /// `x` must be a valid index.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the components of `x` and `y`.
    ///
    /// Returns false if they were already in the same component.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let mut root_x = self.find(x);
        let mut root_y = self.find(y);

        if root_x == root_y {
            return false;
        }

        if let Some(rank) = self.rank.as_mut() {
            if rank[root_x] < rank[root_y] {
                std::mem::swap(&mut root_x, &mut root_y);
            }
            if rank[root_x] == rank[root_y] {
                rank[root_x] = rank[root_x].saturating_add(1);
            }
        }

        self.parent[root_y] = root_x;
        self.components -= 1;
        true
    }

    /// Returns true if `x` and `y` share a component
    pub fn connected(&mut self, x: usize, y: usize) -> bool {
        self.find(x) == self.find(y)
    }
}

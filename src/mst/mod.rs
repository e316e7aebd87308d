//! Minimum spanning tree construction
//!
//! Two interchangeable strategies produce a [`SpanningTree`] from a graph
//! snapshot:
//!
//! ```text
//!   Strategy::Kruskal  ── sort all edges once, scan, union
//!   Strategy::Boruvka  ── rounds of "cheapest edge per component", union
//!                              │
//!                              ▼
//!                  SpanningTree (n × n matrix, n-1 edges
//!                  per connected component of the input)
//! ```
//!
//! On inputs with tied weights the two strategies may pick different edge
//! sets; the total weight is always the same.

pub mod boruvka;
pub mod kruskal;
pub mod query;

pub use boruvka::boruvka;
pub use kruskal::kruskal;

use crate::error::MstError;
use crate::graph::{Edge, UnionFind, Weight, WeightedGraph};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// MST construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Global edge sort
    #[default]
    Kruskal,
    /// Round-based cheapest-outgoing-edge merging
    Boruvka,
}

impl Strategy {
    /// All supported strategies
    pub const ALL: [Strategy; 2] = [Strategy::Kruskal, Strategy::Boruvka];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Kruskal => "kruskal",
            Strategy::Boruvka => "boruvka",
        }
    }

    /// Run this strategy and return the selected edges
    pub fn select_edges(&self, graph: &WeightedGraph) -> Vec<Edge> {
        match self {
            Strategy::Kruskal => kruskal(graph),
            Strategy::Boruvka => boruvka(graph),
        }
    }
}

impl FromStr for Strategy {
    type Err = MstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kruskal" | "global-sort" => Ok(Strategy::Kruskal),
            "boruvka" | "round-based" => Ok(Strategy::Boruvka),
            _ => Err(MstError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A minimum spanning tree (or forest) over the vertices of its source graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    matrix: WeightedGraph,
    edges: Vec<Edge>,
    strategy: Option<Strategy>,
}

impl SpanningTree {
    /// Build the minimum spanning forest of `graph`
    pub fn build(graph: &WeightedGraph, strategy: Strategy) -> Self {
        let edges = strategy.select_edges(graph);

        let mut matrix = WeightedGraph::with_vertices(graph.vertex_count());
        for edge in &edges {
            matrix.set(edge.u, edge.v, edge.weight);
        }

        let tree = Self {
            matrix,
            edges,
            strategy: Some(strategy),
        };

        debug!(
            strategy = %strategy,
            vertices = tree.vertex_count(),
            edges = tree.edge_count(),
            weight = tree.total_weight(),
            "Spanning tree built"
        );

        tree
    }

    /// Build with a strategy chosen by name.
    ///
    /// An unknown name is reported and yields an edgeless tree of the
    /// source dimension.
    pub fn build_named(graph: &WeightedGraph, name: &str) -> Self {
        match Self::try_build_named(graph, name) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "Falling back to an empty spanning tree");
                Self::empty(graph.vertex_count())
            }
        }
    }

    /// Build with a strategy chosen by name, failing on unknown names
    pub fn try_build_named(graph: &WeightedGraph, name: &str) -> Result<Self, MstError> {
        let strategy = name.parse::<Strategy>()?;
        Ok(Self::build(graph, strategy))
    }

    /// Edgeless tree over `n` vertices
    pub fn empty(n: usize) -> Self {
        Self {
            matrix: WeightedGraph::with_vertices(n),
            edges: Vec::new(),
            strategy: None,
        }
    }

    /// Strategy that produced this tree (None for an empty fallback)
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    /// Number of vertices (same as the source graph)
    pub fn vertex_count(&self) -> usize {
        self.matrix.vertex_count()
    }

    /// Number of tree edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Tree edges in the order they were selected
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Weight of the tree edge `u`–`v` (0 if not a tree edge)
    pub fn weight(&self, u: usize, v: usize) -> Weight {
        self.matrix.weight(u, v)
    }

    /// Tree as a symmetric weight matrix
    pub fn matrix(&self) -> &WeightedGraph {
        &self.matrix
    }

    /// Sum of all tree edge weights
    pub fn total_weight(&self) -> Weight {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Number of connected components spanned by the tree
    pub fn component_count(&self) -> usize {
        let mut uf = UnionFind::unranked(self.vertex_count());
        for edge in &self.edges {
            uf.union(edge.u, edge.v);
        }
        uf.component_count()
    }

    /// Returns true if the tree connects every vertex
    pub fn is_spanning(&self) -> bool {
        self.component_count() <= 1
    }
}

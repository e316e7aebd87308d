//! Symmetric weighted adjacency matrix
//!
//! Vertices are `0..n`. A weight of `0` means "no edge". The diagonal is
//! always zero and `weight(u, v) == weight(v, u)` holds after every
//! successful operation.

use crate::error::{GraphError, GraphResult};
use std::fmt;

/// Edge weight. Zero means "no edge".
pub type Weight = u64;

/// An undirected weighted edge with `u < v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    /// Edge weight (ordered first so edges sort by weight)
    pub weight: Weight,
    /// Lower endpoint
    pub u: usize,
    /// Higher endpoint
    pub v: usize,
}

impl Edge {
    /// Create an edge, normalizing endpoint order
    pub fn new(a: usize, b: usize, weight: Weight) -> Self {
        Self {
            weight,
            u: a.min(b),
            v: a.max(b),
        }
    }
}

/// Dense symmetric weighted graph
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeightedGraph {
    n: usize,
    weights: Vec<Weight>,
}

impl WeightedGraph {
    /// Create a graph with `n` vertices and no edges
    pub fn with_vertices(n: usize) -> Self {
        Self {
            n,
            weights: vec![0; n * n],
        }
    }

    /// Build a graph from a client-supplied adjacency matrix.
    ///
    /// Rejects ragged rows, non-zero diagonal entries, negative weights and
    /// asymmetric matrices.
    pub fn from_matrix(rows: &[Vec<i64>]) -> GraphResult<Self> {
        let n = rows.len();

        for (row, values) in rows.iter().enumerate() {
            if values.len() != n {
                return Err(GraphError::RaggedMatrix {
                    row,
                    len: values.len(),
                    expected: n,
                });
            }
            if values[row] != 0 {
                return Err(GraphError::MalformedDiagonal {
                    row,
                    weight: values[row],
                });
            }
        }

        let mut graph = Self::with_vertices(n);
        for (row, values) in rows.iter().enumerate() {
            for (col, &weight) in values.iter().enumerate() {
                if weight < 0 {
                    return Err(GraphError::NegativeWeight { weight });
                }
                let backward = rows[col][row];
                if weight != backward {
                    return Err(GraphError::AsymmetricMatrix {
                        row,
                        col,
                        forward: weight,
                        backward,
                    });
                }
                graph.weights[row * n + col] = weight as Weight;
            }
        }

        Ok(graph)
    }

    /// Build a graph from an edge list. Later duplicates overwrite earlier ones.
    pub fn from_edges(n: usize, edges: &[(usize, usize, Weight)]) -> GraphResult<Self> {
        let mut graph = Self::with_vertices(n);
        for &(u, v, weight) in edges {
            let u = graph.vertex(u as i64)?;
            let v = graph.vertex(v as i64)?;
            if u == v {
                return Err(GraphError::SelfLoop { vertex: u });
            }
            graph.set(u, v, weight);
        }
        Ok(graph)
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.n
    }

    /// Returns true if the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Validate a (possibly negative) client vertex index
    pub fn vertex(&self, vertex: i64) -> GraphResult<usize> {
        usize::try_from(vertex)
            .ok()
            .filter(|&v| v < self.n)
            .ok_or(GraphError::OutOfRangeVertex {
                vertex,
                vertex_count: self.n,
            })
    }

    /// Weight of the edge between `u` and `v` (0 if none)
    pub fn weight(&self, u: usize, v: usize) -> Weight {
        self.weights[u * self.n + v]
    }

    /// Adjacency row of `u`
    pub fn row(&self, u: usize) -> &[Weight] {
        &self.weights[u * self.n..(u + 1) * self.n]
    }

    /// Vertices adjacent to `u` with their edge weights
    pub fn neighbors(&self, u: usize) -> impl Iterator<Item = (usize, Weight)> + '_ {
        self.row(u)
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w > 0)
            .map(|(v, &w)| (v, w))
    }

    /// Every edge once, with `u < v`, in row-major order
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.n).flat_map(move |u| {
            ((u + 1)..self.n).filter_map(move |v| {
                let weight = self.weight(u, v);
                (weight > 0).then_some(Edge { weight, u, v })
            })
        })
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Sum of all edge weights
    pub fn total_weight(&self) -> Weight {
        self.edges().map(|e| e.weight).sum()
    }

    /// Insert or overwrite the edge `source`–`destination`
    pub fn add_edge(&mut self, source: i64, destination: i64, weight: i64) -> GraphResult<()> {
        let u = self.vertex(source)?;
        let v = self.vertex(destination)?;
        if weight < 0 {
            return Err(GraphError::NegativeWeight { weight });
        }
        if u == v {
            return Err(GraphError::SelfLoop { vertex: u });
        }
        self.set(u, v, weight as Weight);
        Ok(())
    }

    /// Remove the edge `source`–`destination` (no-op if absent)
    pub fn remove_edge(&mut self, source: i64, destination: i64) -> GraphResult<()> {
        let u = self.vertex(source)?;
        let v = self.vertex(destination)?;
        if u == v {
            return Err(GraphError::SelfLoop { vertex: u });
        }
        self.set(u, v, 0);
        Ok(())
    }

    /// Write both halves of a symmetric entry
    pub(crate) fn set(&mut self, u: usize, v: usize, weight: Weight) {
        self.weights[u * self.n + v] = weight;
        self.weights[v * self.n + u] = weight;
    }

    /// Matrix rows as owned vectors
    pub fn to_rows(&self) -> Vec<Vec<Weight>> {
        (0..self.n).map(|u| self.row(u).to_vec()).collect()
    }
}

impl fmt::Display for WeightedGraph {
    /// One row per line, entries separated by single spaces
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for u in 0..self.n {
            let mut first = true;
            for w in self.row(u) {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{w}")?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeightedGraph {
        WeightedGraph::from_matrix(&[
            vec![0, 2, 0, 6, 0],
            vec![2, 0, 3, 8, 5],
            vec![0, 3, 0, 0, 7],
            vec![6, 8, 0, 0, 9],
            vec![0, 5, 7, 9, 0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_matrix() {
        let g = sample();
        assert_eq!(g.vertex_count(), 5);
        assert_eq!(g.edge_count(), 7);
        assert_eq!(g.weight(1, 4), 5);
        assert_eq!(g.weight(4, 1), 5);
        assert_eq!(g.total_weight(), 2 + 6 + 3 + 8 + 5 + 7 + 9);
    }

    #[test]
    fn test_rejects_self_loops() {
        let err = WeightedGraph::from_matrix(&[
            vec![1, 2, 3],
            vec![2, 2, 4],
            vec![3, 4, 3],
        ])
        .unwrap_err();
        assert_eq!(err, GraphError::MalformedDiagonal { row: 0, weight: 1 });
    }

    #[test]
    fn test_rejects_ragged_and_asymmetric() {
        let ragged = WeightedGraph::from_matrix(&[vec![0, 1], vec![1]]);
        assert!(matches!(ragged, Err(GraphError::RaggedMatrix { row: 1, .. })));

        let asym = WeightedGraph::from_matrix(&[vec![0, 1], vec![2, 0]]);
        assert!(matches!(asym, Err(GraphError::AsymmetricMatrix { .. })));

        let negative = WeightedGraph::from_matrix(&[vec![0, -1], vec![-1, 0]]);
        assert_eq!(negative, Err(GraphError::NegativeWeight { weight: -1 }));
    }

    #[test]
    fn test_empty_matrix() {
        let g = WeightedGraph::from_matrix(&[]).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.edges().count(), 0);
        assert_eq!(g.to_string(), "");
    }

    #[test]
    fn test_add_and_remove_edge_symmetric() {
        let mut g = WeightedGraph::with_vertices(3);
        g.add_edge(0, 2, 4).unwrap();
        assert_eq!(g.weight(0, 2), 4);
        assert_eq!(g.weight(2, 0), 4);

        g.remove_edge(2, 0).unwrap();
        assert_eq!(g.weight(0, 2), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_bounds_checks() {
        let mut g = WeightedGraph::with_vertices(3);
        assert_eq!(
            g.add_edge(-1, 2, 1),
            Err(GraphError::OutOfRangeVertex {
                vertex: -1,
                vertex_count: 3
            })
        );
        assert!(g.add_edge(0, 3, 1).is_err());
        assert!(g.remove_edge(5, 0).is_err());
        assert_eq!(g.add_edge(1, 1, 3), Err(GraphError::SelfLoop { vertex: 1 }));
        assert_eq!(g.add_edge(0, 1, -3), Err(GraphError::NegativeWeight { weight: -3 }));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_edges_are_normalized() {
        let g = WeightedGraph::from_edges(3, &[(2, 0, 5), (1, 0, 1)]).unwrap();
        let edges: Vec<Edge> = g.edges().collect();
        assert_eq!(edges, vec![Edge::new(0, 1, 1), Edge::new(0, 2, 5)]);
    }

    #[test]
    fn test_display() {
        let g = WeightedGraph::from_edges(2, &[(0, 1, 7)]).unwrap();
        assert_eq!(g.to_string(), "0 7\n7 0\n");
    }
}

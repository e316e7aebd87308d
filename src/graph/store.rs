//! The single shared graph served to every client session
//!
//! All access goes through [`GraphStore`]:
//! - install/add/remove take the exclusive write lock, so at most one
//!   mutation is applied at a time and no reader sees half of one
//! - [`GraphStore::snapshot`] clones an `Arc` under the read lock, so an
//!   MST build works on a consistent graph without holding any lock
//! - mutations are copy-on-write: if a snapshot is still alive the matrix
//!   is cloned before it is modified
//!
//! Every successful mutation bumps the store generation. Cached trees are
//! tagged with the generation they were built from.

use crate::error::{GraphError, GraphResult};
use crate::graph::matrix::WeightedGraph;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Consistent view of the graph at one generation
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Store generation this snapshot was taken at
    pub generation: u64,

    /// The graph itself
    pub graph: Arc<WeightedGraph>,
}

/// Statistics for store mutations
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Graphs installed
    pub installs: AtomicU64,

    /// Edges added or overwritten
    pub edges_added: AtomicU64,

    /// Edges removed
    pub edges_removed: AtomicU64,

    /// Mutations rejected with an error
    pub rejected: AtomicU64,
}

impl StoreStats {
    /// Total successful mutations
    pub fn mutations(&self) -> u64 {
        self.installs.load(Ordering::Relaxed)
            + self.edges_added.load(Ordering::Relaxed)
            + self.edges_removed.load(Ordering::Relaxed)
    }

    /// Mutations rejected with an error
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Slot {
    graph: Option<Arc<WeightedGraph>>,
    generation: u64,
}

/// Owner of the one live graph
#[derive(Debug, Default)]
pub struct GraphStore {
    slot: RwLock<Slot>,
    stats: StoreStats,
}

impl GraphStore {
    /// Create a store with no graph installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `graph` already installed
    pub fn with_graph(graph: WeightedGraph) -> Self {
        let store = Self::new();
        store.write().graph = Some(Arc::new(graph));
        store
    }

    // A panic while holding the lock cannot leave the slot half-written
    // (every write is a single assignment or a validated matrix edit), so a
    // poisoned lock is recovered rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the graph wholesale from an adjacency matrix.
    ///
    /// On error the previous graph, if any, stays in effect.
    /// Returns the new vertex count.
    pub fn install(&self, rows: &[Vec<i64>]) -> GraphResult<usize> {
        let graph = match WeightedGraph::from_matrix(rows) {
            Ok(graph) => graph,
            Err(e) => {
                self.record_rejected();
                return Err(e);
            }
        };
        let vertices = graph.vertex_count();

        let mut slot = self.write();
        slot.graph = Some(Arc::new(graph));
        slot.generation += 1;
        self.stats.installs.fetch_add(1, Ordering::Relaxed);

        info!(vertices, generation = slot.generation, "New graph installed");
        Ok(vertices)
    }

    /// Add or overwrite an edge
    pub fn add_edge(&self, source: i64, destination: i64, weight: i64) -> GraphResult<()> {
        self.mutate(|graph| graph.add_edge(source, destination, weight))?;
        self.stats.edges_added.fetch_add(1, Ordering::Relaxed);
        debug!(source, destination, weight, "Edge added");
        Ok(())
    }

    /// Remove an edge
    pub fn remove_edge(&self, source: i64, destination: i64) -> GraphResult<()> {
        self.mutate(|graph| graph.remove_edge(source, destination))?;
        self.stats.edges_removed.fetch_add(1, Ordering::Relaxed);
        debug!(source, destination, "Edge removed");
        Ok(())
    }

    fn mutate<F>(&self, apply: F) -> GraphResult<()>
    where
        F: FnOnce(&mut WeightedGraph) -> GraphResult<()>,
    {
        let mut slot = self.write();
        let Some(graph) = slot.graph.as_mut() else {
            self.record_rejected();
            return Err(GraphError::NoGraph);
        };

        let result = apply(Arc::make_mut(graph));
        match result {
            Ok(()) => {
                slot.generation += 1;
                Ok(())
            }
            Err(e) => {
                self.record_rejected();
                Err(e)
            }
        }
    }

    fn record_rejected(&self) {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent snapshot of the current graph
    pub fn snapshot(&self) -> Option<Snapshot> {
        let slot = self.read();
        slot.graph.as_ref().map(|graph| Snapshot {
            generation: slot.generation,
            graph: Arc::clone(graph),
        })
    }

    /// Current generation (bumped by every successful mutation)
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// Returns true once a graph has been installed
    pub fn has_graph(&self) -> bool {
        self.read().graph.is_some()
    }

    /// Vertex count of the current graph
    pub fn vertex_count(&self) -> Option<usize> {
        self.read().graph.as_ref().map(|g| g.vertex_count())
    }

    /// Edge count of the current graph
    pub fn edge_count(&self) -> Option<usize> {
        self.read().graph.as_ref().map(|g| g.edge_count())
    }

    /// Validate a client vertex index against the current graph
    pub fn vertex(&self, vertex: i64) -> GraphResult<usize> {
        match self.read().graph.as_ref() {
            Some(graph) => graph.vertex(vertex),
            None => Err(GraphError::NoGraph),
        }
    }

    /// Mutation statistics
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Vec<i64>> {
        vec![vec![0, 1, 3], vec![1, 0, 2], vec![3, 2, 0]]
    }

    #[test]
    fn test_empty_store() {
        let store = GraphStore::new();
        assert!(!store.has_graph());
        assert!(store.snapshot().is_none());
        assert_eq!(store.add_edge(0, 1, 1), Err(GraphError::NoGraph));
        assert_eq!(store.vertex(0), Err(GraphError::NoGraph));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_install_and_mutate() {
        let store = GraphStore::new();
        assert_eq!(store.install(&triangle()).unwrap(), 3);
        assert_eq!(store.generation(), 1);
        assert_eq!(store.edge_count(), Some(3));

        store.remove_edge(0, 2).unwrap();
        assert_eq!(store.edge_count(), Some(2));
        assert_eq!(store.generation(), 2);

        store.add_edge(2, 0, 9).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(snap.graph.weight(0, 2), 9);
        assert_eq!(snap.generation, 3);
        assert_eq!(store.stats().mutations(), 3);
    }

    #[test]
    fn test_rejected_install_keeps_previous_graph() {
        let store = GraphStore::new();
        store.install(&triangle()).unwrap();

        let err = store
            .install(&[vec![1, 2, 3], vec![2, 2, 4], vec![3, 4, 3]])
            .unwrap_err();
        assert!(matches!(err, GraphError::MalformedDiagonal { .. }));
        assert_eq!(store.edge_count(), Some(3));
        assert_eq!(store.generation(), 1);
        assert_eq!(store.stats().rejected(), 1);
    }

    #[test]
    fn test_rejected_mutation_has_no_effect() {
        let store = GraphStore::new();
        store.install(&triangle()).unwrap();

        assert!(store.add_edge(0, 7, 1).is_err());
        assert!(store.remove_edge(-1, 0).is_err());
        assert_eq!(store.generation(), 1);
        assert_eq!(store.edge_count(), Some(3));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutations() {
        let store = GraphStore::new();
        store.install(&triangle()).unwrap();

        let before = store.snapshot().unwrap();
        store.remove_edge(0, 1).unwrap();
        let after = store.snapshot().unwrap();

        assert_eq!(before.graph.weight(0, 1), 1);
        assert_eq!(after.graph.weight(0, 1), 0);
        assert!(after.generation > before.generation);
    }

    #[test]
    fn test_concurrent_mutations_are_not_lost() {
        let n = 40;
        let store = Arc::new(GraphStore::with_graph(WeightedGraph::with_vertices(n)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for v in 0..n as i64 {
                        if v != t {
                            store.add_edge(t, v, 1).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Threads 0..8 each connect their vertex to all others; pairs among
        // 0..8 are written twice but count once.
        let expected = 8 * (n - 1) - (8 * 7) / 2;
        assert_eq!(store.edge_count(), Some(expected));
    }
}

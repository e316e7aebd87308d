//! Graph data model
//!
//! - [`WeightedGraph`]: dense symmetric weight matrix with validated mutation
//! - [`GraphStore`]: the single shared, lock-protected graph instance
//! - [`UnionFind`]: disjoint-set substrate for the MST strategies

pub mod matrix;
pub mod store;
pub mod union_find;

pub use matrix::{Edge, Weight, WeightedGraph};
pub use store::{GraphStore, Snapshot, StoreStats};
pub use union_find::UnionFind;

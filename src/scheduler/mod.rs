//! Concurrency architectures
//!
//! Two interchangeable ways to run client sessions against the shared
//! graph:
//!
//! - [`WorkerPool`] (leader-follower): N long-lived workers take whole
//!   sessions from one shared FIFO queue
//! - [`Pipeline`]: each session gets three single-threaded [`Stage`]s
//!   (mutate, build, query) and waits on a [`Completion`] per request

pub mod pipeline;
pub mod pool;
pub mod stage;

pub use pipeline::Pipeline;
pub use pool::{PoolStats, WorkerPool};
pub use stage::{Completion, Stage, StageStats};

//! mst-server - Multi-client minimum spanning tree server
//!
//! A TCP server that holds one shared weighted graph and answers minimum
//! spanning tree queries about it. Clients speak a line-oriented integer
//! protocol (see [`protocol`]).
//!
//! # Features
//!
//! - **Two MST strategies**: global edge sort (Kruskal) and round-based
//!   component merging (Borůvka), both on a shared union-find.
//!
//! - **Tree queries**: total weight, shortest and longest path between two
//!   vertices, average edge weight, matrix dump.
//!
//! - **Two concurrency architectures**: a leader-follower worker pool that
//!   runs whole sessions, or a per-session pipeline of mutate / build /
//!   query stages.
//!
//! - **Consistent shared state**: one lock-protected graph; MST builds work
//!   on an `Arc` snapshot, and each session's cached tree is tagged with the
//!   graph generation it was built from.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Clients                                │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ TCP, one line per request
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Server: accept loop + connection registry + shutdown flag      │
//! └─────────────┬───────────────────────────────────┬───────────────┘
//!               │ leader-follower                   │ pipeline
//!               ▼                                   ▼
//! ┌───────────────────────────┐   ┌───────────────────────────────────┐
//! │  WorkerPool               │   │  session thread                   │
//! │  ┌────────┐   ┌────────┐  │   │  ┌────────┐ ┌───────┐ ┌────────┐  │
//! │  │Worker 1│...│Worker N│  │   │  │ mutate │ │ build │ │ query  │  │
//! │  └───┬────┘   └───┬────┘  │   │  └───┬────┘ └───┬───┘ └───┬────┘  │
//! │      └─ session ──┘       │   │      └──── completions ───┘       │
//! └─────────────┬─────────────┘   └─────────────────┬─────────────────┘
//!               └──────────────┬────────────────────┘
//!                              ▼
//!        ┌────────────────────────────────────────────┐
//!        │  GraphStore (RwLock, generation counter)   │
//!        └─────────────────────┬──────────────────────┘
//!                              │ Arc snapshot
//!                              ▼
//!        ┌────────────────────────────────────────────┐
//!        │  SpanningTree: Kruskal | Borůvka + queries  │
//!        └────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Leader-follower pool with 8 workers
//! mst-server -P 9034 -w 8
//!
//! # Pipeline scheduler, Borůvka strategy
//! mst-server --scheduler pipeline --strategy boruvka
//!
//! # Talk to it
//! printf '1 3\n0 1 4\n1 0 2\n4 2 0\n4\n9\n' | nc localhost 9034
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod mst;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod session;

pub use config::{CliArgs, SchedulerKind, ServerConfig};
pub use error::{Result, ServerError, SessionOutcome};
pub use graph::{GraphStore, WeightedGraph};
pub use mst::{SpanningTree, Strategy};
pub use server::{Server, ServerSummary};

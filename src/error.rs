//! Error types for mst-server
//!
//! This module defines the error hierarchy that covers:
//! - Graph construction and mutation errors
//! - MST strategy selection errors
//! - Client protocol errors (malformed input, disconnects)
//! - Scheduler errors (worker pool and pipeline stages)
//! - Configuration and CLI errors
//!
//! Recoverable errors (everything except bootstrap I/O) are rendered into a
//! response line for the client; the session keeps running.

use thiserror::Error;

/// Top-level error type for the server
#[derive(Error, Debug)]
pub enum ServerError {
    /// Graph errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// MST errors
    #[error("MST error: {0}")]
    Mst(#[from] MstError),

    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (socket bind, accept, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Graph construction and mutation errors
///
/// None of these leave the store modified: the mutation is rejected as a
/// whole and the previous graph stays in effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Vertex index outside `0..vertex_count`
    #[error("Vertex index {vertex} is invalid: graph has {vertex_count} vertices")]
    OutOfRangeVertex { vertex: i64, vertex_count: usize },

    /// Non-zero self weight in a new adjacency matrix
    #[error("The numbers on the diagonal must be zero (row {row} has {weight})")]
    MalformedDiagonal { row: usize, weight: i64 },

    /// Adjacency matrix is not square
    #[error("Row {row} has {len} entries, expected {expected}")]
    RaggedMatrix { row: usize, len: usize, expected: usize },

    /// Adjacency matrix is not symmetric
    #[error("Matrix is not symmetric at ({row}, {col}): {forward} != {backward}")]
    AsymmetricMatrix {
        row: usize,
        col: usize,
        forward: i64,
        backward: i64,
    },

    /// Negative edge weight
    #[error("Edge weight {weight} is negative")]
    NegativeWeight { weight: i64 },

    /// Edge from a vertex to itself
    #[error("Self-loop on vertex {vertex} is not allowed")]
    SelfLoop { vertex: usize },

    /// Operation issued before any graph was installed
    #[error("No graph exists yet")]
    NoGraph,
}

/// MST construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MstError {
    /// Strategy name not recognized
    #[error("Unknown MST strategy '{0}': expected 'kruskal' or 'boruvka'")]
    UnknownStrategy(String),
}

/// Client protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Token is not an integer or payload is incomplete
    #[error("Invalid input: {reason}")]
    MalformedInput { reason: String },

    /// Client closed the connection
    #[error("Client disconnected")]
    Disconnected,

    /// Read or write on the socket failed
    #[error("Socket I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns true if the session can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::MalformedInput { .. })
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedInput {
            reason: reason.into(),
        }
    }
}

/// Worker pool and pipeline stage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Thread could not be spawned
    #[error("Failed to initialize {name}: {reason}")]
    InitFailed { name: String, reason: String },

    /// Pool no longer accepts work
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// Stage queue closed before the task could be posted
    #[error("Stage '{stage}' is shut down")]
    StageClosed { stage: &'static str },

    /// Task was dropped without producing a result
    #[error("Task on stage '{stage}' was dropped before completing")]
    TaskDropped { stage: &'static str },

    /// Thread panicked and could not be joined cleanly
    #[error("{name} panicked")]
    Panicked { name: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid vertex limit
    #[error("Invalid vertex limit {limit}: must be between 1 and {max}")]
    InvalidVertexLimit { limit: usize, max: usize },

    /// Bind address cannot be parsed
    #[error("Invalid bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    /// Strategy name not recognized
    #[error(transparent)]
    Strategy(#[from] MstError),
}

/// Result type alias for ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for GraphError
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type alias for ProtocolError
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Result type alias for SchedulerError
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// How a client session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Client asked to close its own session (op 9)
    Closed,

    /// Client asked for a server-wide shutdown (op 0)
    ShutdownRequested,

    /// Client went away (EOF)
    Disconnected,

    /// Session aborted on a socket or scheduler failure
    Failed { reason: String },
}

impl SessionOutcome {
    /// Returns true if the server should stop accepting connections
    pub fn stops_server(&self) -> bool {
        matches!(self, SessionOutcome::ShutdownRequested)
    }
}

//! Per-connection session handling
//!
//! A [`SessionController`] owns one client connection. It decodes requests
//! with a [`RequestReader`], hands each graph operation to a [`Dispatcher`]
//! and writes the reply before reading the next request.
//!
//! Dispatchers differ only in *where* an operation runs:
//! - [`InlineDispatcher`]: on the calling thread (the pool worker that owns
//!   the whole session)
//! - [`Pipeline`](crate::scheduler::Pipeline): on the mutate / build / query
//!   stage threads of the session
//!
//! Both execute through the same [`SessionContext`].

use crate::error::{GraphError, ProtocolError, SchedulerResult, SessionOutcome};
use crate::graph::GraphStore;
use crate::mst::{SpanningTree, Strategy};
use crate::protocol::{Command, GraphOp, Reply, RequestReader, MENU};
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Runs a graph operation and returns its reply
pub trait Dispatcher {
    /// Execute one operation to completion
    fn dispatch(&mut self, op: GraphOp) -> SchedulerResult<Reply>;

    /// Release any threads held by the dispatcher
    fn finish(&mut self) -> SchedulerResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct CachedTree {
    generation: u64,
    tree: Arc<SpanningTree>,
}

/// State shared by everything that executes a session's operations
#[derive(Debug)]
pub struct SessionContext {
    store: Arc<GraphStore>,
    strategy: Strategy,
    cache: Mutex<Option<CachedTree>>,
}

impl SessionContext {
    pub fn new(store: Arc<GraphStore>, strategy: Strategy) -> Self {
        Self {
            store,
            strategy,
            cache: Mutex::new(None),
        }
    }

    /// Shared graph store
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// MST strategy used for every build
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn cache(&self) -> MutexGuard<'_, Option<CachedTree>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a mutation to the shared graph.
    ///
    /// Non-mutation operations are answered with an error reply.
    pub fn apply_mutation(&self, op: &GraphOp) -> Reply {
        let result = match op {
            GraphOp::NewGraph { rows } => self.store.install(rows).map(Reply::GraphCreated),
            GraphOp::AddEdge {
                source,
                destination,
                weight,
            } => self
                .store
                .add_edge(*source, *destination, *weight)
                .map(|()| Reply::EdgeAdded),
            GraphOp::RemoveEdge {
                source,
                destination,
            } => self
                .store
                .remove_edge(*source, *destination)
                .map(|()| Reply::EdgeRemoved),
            other => {
                return Reply::Error(format!("operation {} is not a mutation", other.code()));
            }
        };

        result.unwrap_or_else(graph_error_reply)
    }

    /// Cached tree if it was built from the current graph generation
    pub fn fresh_tree(&self) -> Option<Arc<SpanningTree>> {
        let generation = self.store.generation();
        self.cache()
            .as_ref()
            .filter(|cached| cached.generation == generation)
            .map(|cached| Arc::clone(&cached.tree))
    }

    /// Return a spanning tree of the current graph, building it if the
    /// cached one is missing or stale. `None` if no graph exists.
    pub fn ensure_tree(&self) -> Option<Arc<SpanningTree>> {
        let snapshot = self.store.snapshot()?;

        let mut cache = self.cache();
        if let Some(cached) = cache.as_ref() {
            if cached.generation == snapshot.generation {
                return Some(Arc::clone(&cached.tree));
            }
        }

        let tree = Arc::new(SpanningTree::build(&snapshot.graph, self.strategy));
        debug!(
            generation = snapshot.generation,
            weight = tree.total_weight(),
            "Cached spanning tree rebuilt"
        );
        *cache = Some(CachedTree {
            generation: snapshot.generation,
            tree: Arc::clone(&tree),
        });
        Some(tree)
    }

    /// Execute any graph operation on the calling thread
    pub fn execute(&self, op: &GraphOp) -> Reply {
        match op {
            GraphOp::NewGraph { .. } | GraphOp::AddEdge { .. } | GraphOp::RemoveEdge { .. } => {
                self.apply_mutation(op)
            }
            _ => match self.ensure_tree() {
                Some(tree) => run_query(&tree, op),
                None => Reply::NoGraph,
            },
        }
    }
}

/// Answer a read-only operation from a built tree.
///
/// Vertex arguments are checked against the tree dimension first.
pub fn run_query(tree: &SpanningTree, op: &GraphOp) -> Reply {
    let endpoints = |source: i64, destination: i64| -> Result<(usize, usize), GraphError> {
        let graph = tree.matrix();
        Ok((graph.vertex(source)?, graph.vertex(destination)?))
    };

    match op {
        GraphOp::MstWeight => Reply::MstWeight(tree.total_weight()),
        GraphOp::LongestPath {
            source,
            destination,
        } => match endpoints(*source, *destination) {
            Ok((s, t)) => Reply::LongestPath {
                source: s,
                destination: t,
                path: tree.longest_path(s, t),
            },
            Err(e) => graph_error_reply(e),
        },
        GraphOp::ShortestPath {
            source,
            destination,
        } => match endpoints(*source, *destination) {
            Ok((s, t)) => Reply::ShortestPath {
                source: s,
                destination: t,
                path: tree.shortest_path(s, t),
            },
            Err(e) => graph_error_reply(e),
        },
        GraphOp::AverageDistance => Reply::AverageDistance(tree.average_distance()),
        GraphOp::PrintMst => Reply::Matrix(tree.rows()),
        other => Reply::Error(format!("operation {} is not a query", other.code())),
    }
}

fn graph_error_reply(error: GraphError) -> Reply {
    match error {
        GraphError::NoGraph => Reply::NoGraph,
        other => Reply::Error(other.to_string()),
    }
}

/// Runs every operation on the calling thread
pub struct InlineDispatcher {
    context: Arc<SessionContext>,
}

impl InlineDispatcher {
    pub fn new(context: Arc<SessionContext>) -> Self {
        Self { context }
    }
}

impl Dispatcher for InlineDispatcher {
    fn dispatch(&mut self, op: GraphOp) -> SchedulerResult<Reply> {
        Ok(self.context.execute(&op))
    }
}

/// Drives one client connection from menu to close
pub struct SessionController<D> {
    id: u64,
    dispatcher: D,
    max_vertices: usize,
}

impl<D: Dispatcher> SessionController<D> {
    pub fn new(id: u64, dispatcher: D, max_vertices: usize) -> Self {
        Self {
            id,
            dispatcher,
            max_vertices,
        }
    }

    /// Serve requests until the client leaves or asks to stop
    pub fn run<R: BufRead, W: Write>(mut self, reader: R, mut writer: W) -> SessionOutcome {
        let id = self.id;
        info!(session = id, "Session started");

        if let Err(e) = writer.write_all(MENU.as_bytes()).and_then(|()| writer.flush()) {
            warn!(session = id, error = %e, "Failed to send menu");
            self.finish();
            return SessionOutcome::Failed {
                reason: e.to_string(),
            };
        }

        let mut requests = RequestReader::new(reader, self.max_vertices);
        let mut handled = 0u64;

        let outcome = loop {
            let reply = match requests.next_command() {
                Ok(Command::Shutdown) => {
                    info!(session = id, "Client requested server shutdown");
                    if let Err(e) = send(&mut writer, &Reply::ShuttingDown) {
                        debug!(session = id, error = %e, "Shutdown reply not delivered");
                    }
                    break SessionOutcome::ShutdownRequested;
                }
                Ok(Command::Exit) => {
                    if let Err(e) = send(&mut writer, &Reply::Goodbye) {
                        debug!(session = id, error = %e, "Goodbye not delivered");
                    }
                    break SessionOutcome::Closed;
                }
                Ok(Command::Invalid(code)) => {
                    debug!(session = id, code, "Invalid option");
                    Reply::InvalidChoice
                }
                Ok(Command::Graph(op)) => {
                    let code = op.code();
                    let stage = op.kind();
                    debug!(session = id, op = code, %stage, "Dispatching request");
                    match self.dispatcher.dispatch(op) {
                        Ok(reply) => reply,
                        Err(e) => {
                            error!(session = id, op = code, error = %e, "Dispatch failed");
                            break SessionOutcome::Failed {
                                reason: e.to_string(),
                            };
                        }
                    }
                }
                Err(e) if e.is_recoverable() => {
                    debug!(session = id, error = %e, "Malformed request");
                    Reply::Malformed(e.to_string())
                }
                Err(ProtocolError::Disconnected) => {
                    break SessionOutcome::Disconnected;
                }
                Err(e) => {
                    warn!(session = id, error = %e, "Read failed");
                    break SessionOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            };

            handled += 1;
            if let Err(e) = send(&mut writer, &reply) {
                warn!(session = id, error = %e, "Write failed");
                break SessionOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        self.finish();
        info!(session = id, requests = handled, outcome = ?outcome, "Session ended");
        outcome
    }

    fn finish(&mut self) {
        if let Err(e) = self.dispatcher.finish() {
            warn!(session = self.id, error = %e, "Dispatcher did not shut down cleanly");
        }
    }
}

fn send<W: Write>(writer: &mut W, reply: &Reply) -> std::io::Result<()> {
    writer.write_all(reply.to_string().as_bytes())?;
    writer.flush()
}

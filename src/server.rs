//! TCP server - owns the listener and the shared graph
//!
//! The server is responsible for:
//! - Binding the listener and running the accept loop
//! - Handing each connection to the configured scheduler
//! - Tracking live connections so shutdown can unblock their sessions
//! - Final statistics
//!
//! Shutdown is cooperative: anything holding the shutdown flag (Ctrl-C
//! handler, a client sending op 0) sets it, the accept loop notices within
//! one poll interval, shuts down every registered socket and drains the
//! scheduler.

use crate::config::{SchedulerKind, ServerConfig};
use crate::error::{Result, SchedulerError, SessionOutcome};
use crate::graph::GraphStore;
use crate::mst::Strategy;
use crate::scheduler::{Pipeline, WorkerPool};
use crate::session::{InlineDispatcher, SessionContext, SessionController};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often the accept loop checks the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a completed server run
#[derive(Debug)]
pub struct ServerSummary {
    /// Wall-clock start time
    pub started_at: DateTime<Utc>,

    /// Time the server ran
    pub duration: Duration,

    /// Connections accepted
    pub connections: u64,

    /// Whether a client requested the shutdown (vs. a signal)
    pub shutdown_by_client: bool,

    /// Successful graph mutations
    pub graph_mutations: u64,

    /// Rejected graph mutations
    pub rejected_mutations: u64,

    /// Sessions still queued when the pool stopped
    pub abandoned_sessions: u64,
}

/// Live client sockets, keyed by session id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    streams: Mutex<HashMap<u64, TcpStream>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, TcpStream>> {
        self.streams.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track a handle to `stream` under `id`
    pub fn register(&self, id: u64, stream: &TcpStream) -> io::Result<()> {
        let handle = stream.try_clone()?;
        self.lock().insert(id, handle);
        Ok(())
    }

    /// Close and forget the connection `id`
    pub fn release(&self, id: u64) {
        if let Some(stream) = self.lock().remove(&id) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Shut down every tracked socket; blocked readers observe EOF.
    /// Returns the number of connections closed.
    pub fn shutdown_all(&self) -> usize {
        let streams: Vec<_> = self.lock().drain().collect();
        for (id, stream) in &streams {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(session = id, error = %e, "Socket already closed");
            }
        }
        streams.len()
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where accepted sessions run
enum Sessions {
    Pool(WorkerPool),
    Threads(Vec<JoinHandle<()>>),
}

/// Everything a session needs, moved onto the thread that serves it
struct SessionJob {
    id: u64,
    stream: TcpStream,
    store: Arc<GraphStore>,
    strategy: Strategy,
    scheduler: SchedulerKind,
    max_vertices: usize,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<AtomicBool>,
    client_shutdown: Arc<AtomicBool>,
}

impl SessionJob {
    fn run(self) {
        let outcome = self.serve().unwrap_or_else(|e| {
            warn!(session = self.id, error = %e, "Session could not start");
            SessionOutcome::Failed {
                reason: e.to_string(),
            }
        });

        self.registry.release(self.id);

        if outcome.stops_server() {
            self.client_shutdown.store(true, Ordering::SeqCst);
            self.shutdown.store(true, Ordering::SeqCst);
        }
    }

    fn serve(&self) -> Result<SessionOutcome> {
        let reader = BufReader::new(self.stream.try_clone()?);
        let writer = &self.stream;
        let context = Arc::new(SessionContext::new(Arc::clone(&self.store), self.strategy));

        let outcome = match self.scheduler {
            SchedulerKind::LeaderFollower => {
                SessionController::new(self.id, InlineDispatcher::new(context), self.max_vertices)
                    .run(reader, writer)
            }
            SchedulerKind::Pipeline => {
                let pipeline = Pipeline::spawn(self.id, context)?;
                SessionController::new(self.id, pipeline, self.max_vertices).run(reader, writer)
            }
        };
        Ok(outcome)
    }
}

/// The MST server
pub struct Server {
    /// Configuration
    config: ServerConfig,

    /// Bound listener
    listener: TcpListener,

    /// The one shared graph
    store: Arc<GraphStore>,

    /// Live connections
    registry: Arc<ConnectionRegistry>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,

    /// Set when a client (rather than a signal) stopped the server
    client_shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the listener. This is the only fatal failure point.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.address)?;

        Ok(Self {
            config,
            listener,
            store: Arc::new(GraphStore::new()),
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            client_shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The shared graph store
    pub fn store(&self) -> Arc<GraphStore> {
        Arc::clone(&self.store)
    }

    /// Accept and serve clients until shutdown
    pub fn run(self) -> Result<ServerSummary> {
        let start_time = Instant::now();
        let started_at: DateTime<Utc> = Utc::now();

        self.listener.set_nonblocking(true)?;
        let address = self.local_addr()?;

        info!(
            %address,
            scheduler = self.config.scheduler.name(),
            strategy = %self.config.strategy,
            workers = self.config.worker_count,
            "Server listening"
        );
        debug!(start_time = %started_at.to_rfc3339(), "Server started");

        let mut sessions = match self.config.scheduler {
            SchedulerKind::LeaderFollower => {
                let pool = WorkerPool::new(self.config.worker_count)?;
                debug!(workers = pool.size(), "Session pool ready");
                Sessions::Pool(pool)
            }
            SchedulerKind::Pipeline => Sessions::Threads(Vec::new()),
        };

        let mut connections = 0u64;

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    connections += 1;
                    if let Err(e) = self.start_session(connections, stream, peer, &mut sessions) {
                        warn!(session = connections, %peer, error = %e, "Failed to start session");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    thread::sleep(POLL_INTERVAL);
                }
            }

            if let Sessions::Threads(handles) = &mut sessions {
                handles.retain(|h| !h.is_finished());
            }
        }

        info!("Shutdown signal received");

        let closed = self.registry.shutdown_all();
        if closed > 0 {
            info!(connections = closed, "Closed open connections");
        }

        let abandoned_sessions = match sessions {
            Sessions::Pool(mut pool) => {
                if let Err(e) = pool.shutdown() {
                    warn!(error = %e, "Worker pool did not shut down cleanly");
                }
                pool.stats().abandoned()
            }
            Sessions::Threads(handles) => {
                for handle in handles {
                    if handle.join().is_err() {
                        warn!("Session thread panicked");
                    }
                }
                0
            }
        };

        let stats = self.store.stats();
        let summary = ServerSummary {
            started_at,
            duration: start_time.elapsed(),
            connections,
            shutdown_by_client: self.client_shutdown.load(Ordering::SeqCst),
            graph_mutations: stats.mutations(),
            rejected_mutations: stats.rejected(),
            abandoned_sessions,
        };

        info!(
            connections = summary.connections,
            mutations = summary.graph_mutations,
            rejected = summary.rejected_mutations,
            duration_secs = summary.duration.as_secs(),
            "Server stopped"
        );

        Ok(summary)
    }

    fn start_session(
        &self,
        id: u64,
        stream: TcpStream,
        peer: SocketAddr,
        sessions: &mut Sessions,
    ) -> Result<()> {
        // Some platforms hand out accepted sockets in the listener's mode
        stream.set_nonblocking(false)?;
        self.registry.register(id, &stream)?;
        info!(session = id, %peer, "Client connected");

        let job = SessionJob {
            id,
            stream,
            store: Arc::clone(&self.store),
            strategy: self.config.strategy,
            scheduler: self.config.scheduler,
            max_vertices: self.config.max_vertices,
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown),
            client_shutdown: Arc::clone(&self.client_shutdown),
        };

        let started = match sessions {
            Sessions::Pool(pool) => pool.submit(move || job.run()),
            Sessions::Threads(handles) => thread::Builder::new()
                .name(format!("session-{}", id))
                .spawn(move || job.run())
                .map(|handle| handles.push(handle))
                .map_err(|e| SchedulerError::InitFailed {
                    name: format!("session-{}", id),
                    reason: e.to_string(),
                }),
        };

        if started.is_err() {
            self.registry.release(id);
        }
        started?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_registry_shutdown_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let registry = ConnectionRegistry::new();
        registry.register(1, &server_side).unwrap();
        assert_eq!(registry.len(), 1);

        let reader = thread::spawn(move || {
            let mut line = String::new();
            BufReader::new(server_side).read_line(&mut line).unwrap_or(0)
        });

        assert_eq!(registry.shutdown_all(), 1);
        assert_eq!(reader.join().unwrap(), 0);
        assert!(registry.is_empty());
        drop(client);
    }

    #[test]
    fn test_release_closes_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let registry = ConnectionRegistry::new();
        registry.register(9, &server_side).unwrap();
        // The registry clone keeps the socket open
        drop(server_side);

        registry.release(9);
        let mut line = String::new();
        let read = BufReader::new(&client).read_line(&mut line).unwrap();
        assert_eq!(read, 0);
        registry.release(9);
    }

    #[test]
    fn test_bind_ephemeral_port() {
        let server = Server::bind(ServerConfig::local(SchedulerKind::LeaderFollower)).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(!server.shutdown_flag().load(Ordering::SeqCst));
        assert!(!server.store().has_graph());
    }
}

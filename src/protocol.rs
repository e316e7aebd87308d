//! Client text protocol
//!
//! Requests are ASCII integers separated by any whitespace. The first
//! integer selects the operation; its payload follows:
//!
//! ```text
//!   0                      shut down the server
//!   1 n  w00 .. w(n-1)(n-1) install a new n × n adjacency matrix
//!   2 s d w                add (or overwrite) edge s–d with weight w
//!   3 s d                  remove edge s–d
//!   4                      total MST weight
//!   5 s t                  longest path in the MST
//!   6 s t                  shortest path in the MST
//!   7                      average MST edge weight
//!   8                      MST adjacency matrix
//!   9                      close this session
//! ```
//!
//! Every response is one or more newline-terminated lines.

use crate::error::{ProtocolError, ProtocolResult};
use crate::graph::Weight;
use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Read};

/// Floor for the per-line byte limit
const MIN_LINE_BYTES: usize = 1024;

/// Room for one signed 64-bit weight and its separator
const BYTES_PER_WEIGHT: usize = 24;

/// Longest input line accepted when matrices may have `max_vertices` columns
pub fn line_limit(max_vertices: usize) -> usize {
    MIN_LINE_BYTES.max(max_vertices.saturating_mul(BYTES_PER_WEIGHT))
}

/// Banner sent once when a client connects
pub const MENU: &str = "Options:\n\
    0. Shut down the server\n\
    1. Initialize a new graph (input: n, then n rows of n weights)\n\
    2. Insert an edge (input: source, destination, weight)\n\
    3. Delete an edge (input: source, destination)\n\
    4. Calculate the total weight of the MST\n\
    5. Find the longest path in the MST (input: start, end)\n\
    6. Find the shortest path in the MST (input: start, end)\n\
    7. Compute the average edge weight in the MST\n\
    8. Display the MST (adjacency matrix format)\n\
    9. Disconnect from the server\n";

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Op 0
    Shutdown,

    /// Op 9
    Exit,

    /// Any unrecognized operation code
    Invalid(i64),

    /// Ops 1-8
    Graph(GraphOp),
}

/// Operations that touch the graph or its spanning tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOp {
    NewGraph {
        rows: Vec<Vec<i64>>,
    },
    AddEdge {
        source: i64,
        destination: i64,
        weight: i64,
    },
    RemoveEdge {
        source: i64,
        destination: i64,
    },
    MstWeight,
    LongestPath {
        source: i64,
        destination: i64,
    },
    ShortestPath {
        source: i64,
        destination: i64,
    },
    AverageDistance,
    PrintMst,
}

/// Which pipeline stage an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Graph mutation
    Mutate,
    /// Spanning tree construction
    Build,
    /// Read-only queries over a built tree
    Query,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Mutate => "mutate",
            StageKind::Build => "build",
            StageKind::Query => "query",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl GraphOp {
    /// Wire operation code
    pub fn code(&self) -> u8 {
        match self {
            GraphOp::NewGraph { .. } => 1,
            GraphOp::AddEdge { .. } => 2,
            GraphOp::RemoveEdge { .. } => 3,
            GraphOp::MstWeight => 4,
            GraphOp::LongestPath { .. } => 5,
            GraphOp::ShortestPath { .. } => 6,
            GraphOp::AverageDistance => 7,
            GraphOp::PrintMst => 8,
        }
    }

    /// Stage that executes this operation
    pub fn kind(&self) -> StageKind {
        match self {
            GraphOp::NewGraph { .. } | GraphOp::AddEdge { .. } | GraphOp::RemoveEdge { .. } => {
                StageKind::Mutate
            }
            GraphOp::MstWeight => StageKind::Build,
            GraphOp::LongestPath { .. }
            | GraphOp::ShortestPath { .. }
            | GraphOp::AverageDistance
            | GraphOp::PrintMst => StageKind::Query,
        }
    }
}

/// Decodes commands from a buffered byte stream.
///
/// Tokens are buffered one input line at a time, so a request and its
/// payload may span any number of lines. A line longer than
/// [`line_limit`] is skipped without being buffered.
pub struct RequestReader<R> {
    reader: R,
    tokens: VecDeque<String>,
    line: Vec<u8>,
    max_vertices: usize,
    line_limit: usize,
}

impl<R: BufRead> RequestReader<R> {
    pub fn new(reader: R, max_vertices: usize) -> Self {
        Self {
            reader,
            tokens: VecDeque::new(),
            line: Vec::new(),
            max_vertices,
            line_limit: line_limit(max_vertices),
        }
    }

    /// Read the next complete command.
    ///
    /// A `MalformedInput` error has already discarded the rest of the
    /// offending line, or the rest of the matrix for a bad weight; the
    /// caller may report it and keep reading.
    pub fn next_command(&mut self) -> ProtocolResult<Command> {
        let code = self.next_int("an option number")?;

        let command = match code {
            0 => Command::Shutdown,
            9 => Command::Exit,
            1 => {
                let n = self.next_int("the number of vertices")?;
                let n = self.vertex_count(n)?;
                Command::Graph(GraphOp::NewGraph {
                    rows: self.matrix(n)?,
                })
            }
            2 => Command::Graph(GraphOp::AddEdge {
                source: self.next_int("a source vertex")?,
                destination: self.next_int("a destination vertex")?,
                weight: self.next_int("an edge weight")?,
            }),
            3 => Command::Graph(GraphOp::RemoveEdge {
                source: self.next_int("a source vertex")?,
                destination: self.next_int("a destination vertex")?,
            }),
            4 => Command::Graph(GraphOp::MstWeight),
            5 => Command::Graph(GraphOp::LongestPath {
                source: self.next_int("a start vertex")?,
                destination: self.next_int("an end vertex")?,
            }),
            6 => Command::Graph(GraphOp::ShortestPath {
                source: self.next_int("a start vertex")?,
                destination: self.next_int("an end vertex")?,
            }),
            7 => Command::Graph(GraphOp::AverageDistance),
            8 => Command::Graph(GraphOp::PrintMst),
            other => Command::Invalid(other),
        };

        Ok(command)
    }

    fn vertex_count(&mut self, n: i64) -> ProtocolResult<usize> {
        match usize::try_from(n) {
            Ok(n) if n <= self.max_vertices => Ok(n),
            _ => {
                self.tokens.clear();
                Err(ProtocolError::malformed(format!(
                    "vertex count must be between 0 and {}, got {}",
                    self.max_vertices, n
                )))
            }
        }
    }

    /// Read all `n * n` weights, even past a bad one, so the next request
    /// starts after the matrix.
    fn matrix(&mut self, n: usize) -> ProtocolResult<Vec<Vec<i64>>> {
        let mut rows = Vec::with_capacity(n);
        let mut bad_weight = None;

        for i in 0..n {
            let mut row = Vec::with_capacity(n);
            for _ in 0..n {
                let token = self.next_token()?;
                match token.parse::<i64>() {
                    Ok(weight) => row.push(weight),
                    Err(_) if bad_weight.is_none() => {
                        bad_weight = Some(format!(
                            "expected a weight in row {}, got '{}'",
                            i + 1,
                            token
                        ));
                    }
                    Err(_) => {}
                }
            }
            rows.push(row);
        }

        match bad_weight {
            Some(reason) => Err(ProtocolError::malformed(reason)),
            None => Ok(rows),
        }
    }

    fn next_int(&mut self, what: &str) -> ProtocolResult<i64> {
        let token = self.next_token()?;
        self.parse_token(&token, || what.to_string())
    }

    fn parse_token<F>(&mut self, token: &str, expected: F) -> ProtocolResult<i64>
    where
        F: FnOnce() -> String,
    {
        match token.parse::<i64>() {
            Ok(value) => Ok(value),
            Err(_) => {
                self.tokens.clear();
                Err(ProtocolError::malformed(format!(
                    "expected {}, got '{}'",
                    expected(),
                    token
                )))
            }
        }
    }

    fn next_token(&mut self) -> ProtocolResult<String> {
        loop {
            if let Some(token) = self.tokens.pop_front() {
                return Ok(token);
            }

            self.line.clear();
            let limit = self.line_limit as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return Err(ProtocolError::Disconnected);
            }
            if read as u64 == limit && self.line.last() != Some(&b'\n') {
                self.line.clear();
                self.tokens.clear();
                self.skip_line()?;
                return Err(ProtocolError::malformed(format!(
                    "line longer than {} bytes",
                    limit
                )));
            }

            let text = String::from_utf8_lossy(&self.line);
            self.tokens
                .extend(text.split_whitespace().map(str::to_string));
        }
    }

    /// Drop input up to and including the next newline
    fn skip_line(&mut self) -> ProtocolResult<()> {
        loop {
            let (used, done) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    return Ok(());
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => (end + 1, true),
                    None => (available.len(), false),
                }
            };
            self.reader.consume(used);
            if done {
                return Ok(());
            }
        }
    }
}

/// A response line (or block) sent back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    GraphCreated(usize),
    EdgeAdded,
    EdgeRemoved,
    MstWeight(Weight),
    LongestPath {
        source: usize,
        destination: usize,
        path: Vec<usize>,
    },
    ShortestPath {
        source: usize,
        destination: usize,
        path: Vec<usize>,
    },
    AverageDistance(i64),
    Matrix(Vec<Vec<Weight>>),
    /// A rejected operation, rendered as `Error: ...`
    Error(String),
    /// Input that could not be decoded
    Malformed(String),
    NoGraph,
    InvalidChoice,
    ShuttingDown,
    Goodbye,
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &[usize]) -> fmt::Result {
    let mut first = true;
    for vertex in path {
        if !first {
            f.write_str(" ")?;
        }
        write!(f, "{}", vertex)?;
        first = false;
    }
    Ok(())
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::GraphCreated(n) => writeln!(f, "New graph created with {} vertices", n),
            Reply::EdgeAdded => writeln!(f, "Edge added successfully!"),
            Reply::EdgeRemoved => writeln!(f, "Edge removed successfully!"),
            Reply::MstWeight(w) => writeln!(f, "Total weight of MST: {}", w),
            Reply::LongestPath {
                source,
                destination,
                path,
            }
            | Reply::ShortestPath {
                source,
                destination,
                path,
            } if path.is_empty() => writeln!(f, "No path from {} to {}", source, destination),
            Reply::LongestPath { path, .. } => {
                f.write_str("Longest path in MST: ")?;
                write_path(f, path)?;
                writeln!(f)
            }
            Reply::ShortestPath {
                source,
                destination,
                path,
            } => {
                write!(f, "Shortest path from {} to {}: ", source, destination)?;
                write_path(f, path)?;
                writeln!(f)
            }
            Reply::AverageDistance(avg) => writeln!(f, "Average distance in MST: {}", avg),
            Reply::Matrix(rows) => {
                writeln!(f, "MST Matrix:")?;
                for row in rows {
                    let line: Vec<String> = row.iter().map(|w| w.to_string()).collect();
                    writeln!(f, "{}", line.join(" "))?;
                }
                Ok(())
            }
            Reply::Error(message) => writeln!(f, "Error: {}", message),
            Reply::Malformed(message) => writeln!(f, "{}", message),
            Reply::NoGraph => writeln!(f, "Please create a graph first using option 1."),
            Reply::InvalidChoice => writeln!(f, "Invalid choice. Please try again."),
            Reply::ShuttingDown => writeln!(f, "Server shutting down."),
            Reply::Goodbye => writeln!(f, "Goodbye."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str) -> RequestReader<Cursor<Vec<u8>>> {
        RequestReader::new(Cursor::new(input.as_bytes().to_vec()), 16)
    }

    #[test]
    fn test_decode_all_ops() {
        let mut r = reader("1 2\n0 4\n4 0\n2 0 1 7\n3 1 0\n4\n5 0 1\n6 1 0\n7\n8\n9\n0\n42\n");
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::NewGraph {
                rows: vec![vec![0, 4], vec![4, 0]]
            })
        );
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::AddEdge {
                source: 0,
                destination: 1,
                weight: 7
            })
        );
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::RemoveEdge {
                source: 1,
                destination: 0
            })
        );
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::MstWeight));
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::LongestPath {
                source: 0,
                destination: 1
            })
        );
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::ShortestPath {
                source: 1,
                destination: 0
            })
        );
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::AverageDistance));
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::PrintMst));
        assert_eq!(r.next_command().unwrap(), Command::Exit);
        assert_eq!(r.next_command().unwrap(), Command::Shutdown);
        assert_eq!(r.next_command().unwrap(), Command::Invalid(42));
        assert!(matches!(r.next_command(), Err(ProtocolError::Disconnected)));
    }

    #[test]
    fn test_payload_may_span_lines() {
        let mut r = reader("2\n0\n1 5\n");
        assert_eq!(
            r.next_command().unwrap(),
            Command::Graph(GraphOp::AddEdge {
                source: 0,
                destination: 1,
                weight: 5
            })
        );
    }

    #[test]
    fn test_malformed_token_discards_line() {
        let mut r = reader("2 0 x 9 9\n4\n");
        let err = r.next_command().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("'x'"));
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::MstWeight));
    }

    #[test]
    fn test_bad_weight_skips_whole_matrix() {
        let mut r = reader("1 3\n0 x 3\n0 0 4\n3 4 0\n4\n");
        let err = r.next_command().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "Invalid input: expected a weight in row 1, got 'x'"
        );
        // Rows after the bad one are payload, not requests
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::MstWeight));
    }

    #[test]
    fn test_overlong_line_is_skipped() {
        assert_eq!(line_limit(16), 1024);
        assert_eq!(line_limit(1000), 24_000);

        let input = format!("{}\n4\n", "7 ".repeat(2000));
        let mut r = reader(&input);
        let err = r.next_command().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("longer than 1024 bytes"));
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::MstWeight));
    }

    #[test]
    fn test_unterminated_stream_is_bounded() {
        let mut r = reader(&"9".repeat(100_000));
        assert!(r.next_command().unwrap_err().is_recoverable());
        assert!(r.line.capacity() <= 4096);
        assert!(matches!(r.next_command(), Err(ProtocolError::Disconnected)));
    }

    #[test]
    fn test_vertex_limit() {
        let mut r = reader("1 17\n1 -1\n7\n");
        assert!(r.next_command().unwrap_err().is_recoverable());
        assert!(r.next_command().unwrap_err().is_recoverable());
        assert_eq!(r.next_command().unwrap(), Command::Graph(GraphOp::AverageDistance));
    }

    #[test]
    fn test_truncated_payload_is_disconnect() {
        let mut r = reader("1 3\n0 1 2\n");
        assert!(matches!(r.next_command(), Err(ProtocolError::Disconnected)));
    }

    #[test]
    fn test_stage_kinds() {
        assert_eq!(GraphOp::MstWeight.kind(), StageKind::Build);
        assert_eq!(GraphOp::PrintMst.kind(), StageKind::Query);
        assert_eq!(
            GraphOp::RemoveEdge {
                source: 0,
                destination: 1
            }
            .kind(),
            StageKind::Mutate
        );
    }

    #[test]
    fn test_reply_text() {
        assert_eq!(Reply::MstWeight(16).to_string(), "Total weight of MST: 16\n");
        assert_eq!(
            Reply::ShortestPath {
                source: 0,
                destination: 4,
                path: vec![0, 1, 4]
            }
            .to_string(),
            "Shortest path from 0 to 4: 0 1 4\n"
        );
        assert_eq!(
            Reply::LongestPath {
                source: 2,
                destination: 3,
                path: vec![]
            }
            .to_string(),
            "No path from 2 to 3\n"
        );
        assert_eq!(
            Reply::Matrix(vec![vec![0, 2], vec![2, 0]]).to_string(),
            "MST Matrix:\n0 2\n2 0\n"
        );
        assert_eq!(Reply::AverageDistance(-1).to_string(), "Average distance in MST: -1\n");
    }
}

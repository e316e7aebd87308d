//! Staged pipeline dispatcher
//!
//! Every pipeline session gets three single-threaded stages:
//!
//! ```text
//!   request ──► mutate ─────────────────────────────► reply
//!          │                                          ▲
//!          ├──► build (if tree stale) ──► tree ──┐    │
//!          │                                     ▼    │
//!          └─────────────────────────────────► query ─┘
//! ```
//!
//! The session waits on each completion before posting the next task, so
//! cross-stage ordering comes from the completions alone. The built tree
//! is handed to the query stage by value (an `Arc`).

use crate::error::SchedulerResult;
use crate::mst::SpanningTree;
use crate::protocol::{GraphOp, Reply, StageKind};
use crate::scheduler::stage::Stage;
use crate::session::{run_query, Dispatcher, SessionContext};
use std::sync::Arc;
use tracing::trace;

/// Three-stage dispatcher for one session
pub struct Pipeline {
    session: u64,
    context: Arc<SessionContext>,
    mutate: Stage,
    build: Stage,
    query: Stage,
}

impl Pipeline {
    /// Spawn the stages for session `session`
    pub fn spawn(session: u64, context: Arc<SessionContext>) -> SchedulerResult<Self> {
        let stage = |kind: StageKind| Stage::spawn(kind.name(), format!("s{}-{}", session, kind));

        Ok(Self {
            session,
            context,
            mutate: stage(StageKind::Mutate)?,
            build: stage(StageKind::Build)?,
            query: stage(StageKind::Query)?,
        })
    }

    /// Stage handling operations of `kind`
    pub fn stage(&self, kind: StageKind) -> &Stage {
        match kind {
            StageKind::Mutate => &self.mutate,
            StageKind::Build => &self.build,
            StageKind::Query => &self.query,
        }
    }

    fn build_tree(&self) -> SchedulerResult<Option<Arc<SpanningTree>>> {
        if let Some(tree) = self.context.fresh_tree() {
            trace!(session = self.session, "Cached tree is fresh");
            return Ok(Some(tree));
        }

        let context = Arc::clone(&self.context);
        self.build.post(move || context.ensure_tree())?.wait()
    }
}

impl Dispatcher for Pipeline {
    fn dispatch(&mut self, op: GraphOp) -> SchedulerResult<Reply> {
        match op.kind() {
            StageKind::Mutate => {
                let context = Arc::clone(&self.context);
                self.mutate
                    .post(move || context.apply_mutation(&op))?
                    .wait()
            }
            StageKind::Build => {
                let context = Arc::clone(&self.context);
                self.build
                    .post(move || match context.ensure_tree() {
                        Some(tree) => run_query(&tree, &op),
                        None => Reply::NoGraph,
                    })?
                    .wait()
            }
            StageKind::Query => match self.build_tree()? {
                Some(tree) => self.query.post(move || run_query(&tree, &op))?.wait(),
                None => Ok(Reply::NoGraph),
            },
        }
    }

    fn finish(&mut self) -> SchedulerResult<()> {
        // Tear down in flow order; report the first failure
        let mutate = self.mutate.shutdown();
        let build = self.build.shutdown();
        let query = self.query.shutdown();
        trace!(session = self.session, "Pipeline stages joined");
        mutate.and(build).and(query)
    }
}

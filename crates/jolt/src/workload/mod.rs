//! The three workload clients and their shared contract.
//!
//! Every client exposes `setup` / `invoke` / `teardown` and is dispatched as a
//! trait object by the orchestrator. Clients own exactly one session each,
//! re-acquiring after a fault; they never share connections.

mod dirty_reads;
mod register;
mod set;

pub use dirty_reads::{DirtyReadsWorkload, SENTINEL};
pub use register::RegisterWorkload;
pub use set::SetWorkload;

use {
    crate::{
        runner::{OpKind, RunOutcome, RunnerConfig, TxnRunner},
        session::{Session, SessionError, SessionManager},
    },
    async_trait::async_trait,
    futures::future::BoxFuture,
    jolt_core::{DbError, Op, OpFn, OpValue, Process, Target},
    std::sync::Arc,
    thiserror::Error,
    tracing::{debug, warn},
};

/// Recorded when a session cannot be acquired at all. No connection means no
/// side effect, so Fail is sound even for writes.
pub const TAG_CONNECT: &str = "connect-failed";
/// Recorded when a client receives an invocation its workload does not define.
pub const TAG_UNSUPPORTED: &str = "unsupported";

/// A typed request from the operation generator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Invocation {
    /// Set: insert an element.
    Add { value: i64 },
    /// Set and dirty-reads: read current state.
    Read,
    /// Register: read one key.
    ReadRegister { key: i64 },
    /// Register: unconditional write.
    WriteRegister { key: i64, value: i64 },
    /// Register: compare-and-swap.
    Cas { key: i64, old: i64, new: i64 },
    /// Dirty-reads: overwrite every owned row.
    WriteAll { value: i64 },
}

impl Invocation {
    pub fn f(&self) -> OpFn {
        match self {
            Invocation::Add { .. } => OpFn::Add,
            Invocation::Read | Invocation::ReadRegister { .. } => OpFn::Read,
            Invocation::WriteRegister { .. } | Invocation::WriteAll { .. } => OpFn::Write,
            Invocation::Cas { .. } => OpFn::Cas,
        }
    }

    /// The value payload recorded on the invoke record.
    pub fn value(&self) -> OpValue {
        match self {
            Invocation::Add { value } | Invocation::WriteAll { value } => OpValue::Int(*value),
            Invocation::Read => OpValue::None,
            // The observed value and uid are unknown until completion.
            Invocation::ReadRegister { key } => OpValue::Register {
                key: *key,
                value: 0,
                uid: None,
            },
            Invocation::WriteRegister { key, value } => OpValue::Register {
                key: *key,
                value: *value,
                uid: None,
            },
            Invocation::Cas { key, old, new } => OpValue::Cas {
                key: *key,
                old: *old,
                new: *new,
                uid: None,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("setup statement failed: {0}")]
    Db(#[from] DbError),
    #[error("setup retries exhausted for row {row}")]
    RetriesExhausted { row: i64 },
}

/// One workload client. Implementations are strictly sequential with respect
/// to their own session; concurrency comes from running many clients.
#[async_trait]
pub trait Workload: Send {
    fn process(&self) -> Process;

    /// Creates schema and seed data. Runs once before any invocation.
    async fn setup(&mut self) -> Result<(), SetupError>;

    /// Runs one operation to completion, returning the record to append.
    /// Never panics; every failure mode maps to a Fail or Info record.
    async fn invoke(&mut self, invocation: Invocation) -> Op;

    /// Force-closes the client's session. Idempotent.
    async fn teardown(&mut self);
}

/// State shared by the concrete clients: one session, lazily (re)acquired,
/// and the runner that executes units of work against it.
pub(crate) struct ClientCore {
    pub(crate) process: Process,
    target: Target,
    manager: Arc<SessionManager>,
    runner: TxnRunner,
    session: Option<Session>,
}

impl ClientCore {
    pub(crate) fn new(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        runner_cfg: RunnerConfig,
    ) -> Self {
        let runner = TxnRunner::with_config(Arc::clone(&manager), runner_cfg);
        ClientCore {
            process: process.into(),
            target,
            manager,
            runner,
            session: None,
        }
    }

    /// Dials a fresh session if none is open. A faulted session is dropped,
    /// never repaired in place.
    async fn ensure_session(&mut self) -> Result<(), SessionError> {
        if self.session.as_ref().is_some_and(Session::is_open) {
            return Ok(());
        }
        if let Some(mut stale) = self.session.take() {
            stale.close().await;
        }
        debug!(process = %self.process, target = %self.target, "acquiring session");
        self.session = Some(self.manager.acquire(&self.target).await?);
        Ok(())
    }

    /// Direct session access for schema and seed statements, which run
    /// outside the retry loop.
    pub(crate) async fn setup_session(&mut self) -> Result<&mut Session, SessionError> {
        self.ensure_session().await?;
        self.session.as_mut().ok_or(SessionError::ConnFailure)
    }

    /// Runs one unit of work, acquiring a session if needed. Acquisition
    /// failures surface as Fail (nothing ran).
    pub(crate) async fn run<T>(
        &mut self,
        kind: OpKind,
        work: impl for<'a> Fn(&'a mut Session) -> BoxFuture<'a, Result<T, DbError>> + Send + Sync,
    ) -> RunOutcome<T>
    where
        T: Send,
    {
        if let Err(error) = self.ensure_session().await {
            warn!(%error, "session acquisition failed");
            return RunOutcome::Fail { tag: TAG_CONNECT };
        }
        match self.session.as_mut() {
            Some(session) => self.runner.run(session, kind, work).await,
            None => RunOutcome::Fail { tag: TAG_CONNECT },
        }
    }

    pub(crate) async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

/// A Fail completion with its classifier tag.
pub(crate) fn fail_op(process: Process, f: OpFn, value: OpValue, tag: &str) -> Op {
    Op::fail(process, f, value).with_error(tag)
}

/// An Info completion: commit status unknown, never downgraded to Fail.
pub(crate) fn info_op(process: Process, f: OpFn, value: OpValue, error: &DbError) -> Op {
    Op::info(process, f, value).with_error(error.to_string())
}

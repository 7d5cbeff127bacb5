//! Retry-on-abort transaction execution.
//!
//! The runner wraps a unit of work in explicit retry looping and converts
//! classified database errors into operation outcomes. The asymmetry between
//! reads and writes here is the crux of checker soundness: a read failure is
//! always safe to report as Fail (no side effects), but a write failure may
//! only become Fail when it is provably idempotent: a connect failure before
//! any statement ran, or a classified logical rejection. Everything else
//! surfaces as [`RunOutcome::Indeterminate`] and the caller records Info.

use {
    crate::session::{Session, SessionManager},
    futures::future::BoxFuture,
    jolt_core::{classify, classify_prep, DbError, DbErrorKind, ErrorClass},
    std::{sync::Arc, time::Duration},
    tracing::{debug, warn},
};

/// Session preparation statements, issued before every unit of work.
pub const SET_AUTO_RETRY: &str = "SET auto_retry = on";
pub const SET_SERIALIZABLE: &str = "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE";
pub const SET_DEBUG: &str = "SET client_debug = on";
pub const SET_RETRY_BUDGET: &str = "SET max_internal_retries = ?";
/// No-op probe to surface connection faults before the body runs.
pub const PROBE: &str = "SELECT 1";

/// Error tags recorded in the history for non-Ok completions.
pub const TAG_CONN_NOT_READY: &str = "conn-not-ready";
pub const TAG_CONN_PREP: &str = "connect-failure-prep";
pub const TAG_LOGICAL: &str = "logical-failure";
pub const TAG_TIMEOUT: &str = "timeout";
pub const TAG_RETRY_BUDGET: &str = "retry-budget-exhausted";
pub const TAG_FATAL: &str = "unclassified";

/// Whether the unit of work has side effects. Decides how unclassified
/// failures may be reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    Read,
    Write,
}

/// The outcome of a unit of work, ready to be recorded.
#[derive(Debug)]
pub enum RunOutcome<T> {
    /// Confirmed success.
    Ok(T),
    /// Confirmed failure with no durable side effect.
    Fail { tag: &'static str },
    /// Commit status unknown. The caller must record Info, never Fail.
    Indeterminate { error: DbError },
}

impl<T> RunOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Ok(_))
    }
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Hard cap on one unit of work, including in-process retries of the
    /// database's own internal retry machinery.
    pub txn_timeout: Duration,
    /// Bound on the retry-on-abort loop. `None` preserves the unbounded
    /// behavior of the original harness; a persistently conflicting workload
    /// can then spin until the transaction timeout cuts it off.
    pub max_attempts: Option<u32>,
    /// Server-side internal retry budget set during session preparation.
    pub retry_budget: i64,
    /// Externally toggled verbose statement mode.
    pub debug_statements: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            txn_timeout: Duration::from_secs(10),
            max_attempts: None,
            retry_budget: 3,
            debug_statements: false,
        }
    }
}

pub struct TxnRunner {
    manager: Arc<SessionManager>,
    cfg: RunnerConfig,
}

impl TxnRunner {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        TxnRunner {
            manager,
            cfg: RunnerConfig::default(),
        }
    }

    pub fn with_config(manager: Arc<SessionManager>, cfg: RunnerConfig) -> Self {
        TxnRunner { manager, cfg }
    }

    /// Runs one unit of work with session preparation, retry-on-abort looping,
    /// and outcome conversion. Never panics and never loses an outcome: every
    /// path ends in exactly one `RunOutcome`.
    pub async fn run<T>(
        &self,
        session: &mut Session,
        kind: OpKind,
        work: impl for<'a> Fn(&'a mut Session) -> BoxFuture<'a, Result<T, DbError>> + Send + Sync,
    ) -> RunOutcome<T>
    where
        T: Send,
    {
        if self.manager.ensure_ready(session).await.is_err() {
            // Not-ready is surfaced before anything ran, so Fail is safe for
            // writes too.
            return RunOutcome::Fail {
                tag: TAG_CONN_NOT_READY,
            };
        }
        self.attempts(session, kind, &work).await
    }

    async fn attempts<T>(
        &self,
        session: &mut Session,
        kind: OpKind,
        work: &(impl for<'a> Fn(&'a mut Session) -> BoxFuture<'a, Result<T, DbError>> + Send + Sync),
    ) -> RunOutcome<T> {
        if let Err(error) = self.prepare(session).await {
            return match classify_prep(&error) {
                // Guaranteed: no statement of the unit of work had side
                // effects yet.
                ErrorClass::ConnectFailureDuringPrep => RunOutcome::Fail { tag: TAG_CONN_PREP },
                _ => self.fatal(kind, error),
            };
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(self.cfg.txn_timeout, work(session)).await {
                Err(_elapsed) => {
                    // A half-finished transaction must not leak into the next
                    // invocation on a reused session.
                    session.fault();
                    session.close().await;
                    warn!(timeout = ?self.cfg.txn_timeout, "unit of work timed out, session force-closed");
                    return match kind {
                        OpKind::Read => RunOutcome::Fail { tag: TAG_TIMEOUT },
                        OpKind::Write => RunOutcome::Indeterminate {
                            error: DbError::new(DbErrorKind::Timeout, "transaction timed out"),
                        },
                    };
                }
                Ok(Ok(value)) => return RunOutcome::Ok(value),
                Ok(Err(error)) => match classify(&error) {
                    ErrorClass::Retryable => {
                        if let Some(max) = self.cfg.max_attempts {
                            if attempt >= max {
                                warn!(attempt, %error, "retry bound exhausted");
                                // A retryable abort rolled the transaction
                                // back, so Fail is safe even for writes.
                                return RunOutcome::Fail {
                                    tag: TAG_RETRY_BUDGET,
                                };
                            }
                        }
                        debug!(attempt, %error, "retryable abort, retrying unit of work");
                        continue;
                    }
                    ErrorClass::LogicalFailure => return RunOutcome::Fail { tag: TAG_LOGICAL },
                    ErrorClass::ConnectFailureDuringPrep | ErrorClass::Fatal => {
                        return self.fatal(kind, error)
                    }
                },
            }
        }
    }

    fn fatal<T>(&self, kind: OpKind, error: DbError) -> RunOutcome<T> {
        match kind {
            OpKind::Read => RunOutcome::Fail { tag: TAG_FATAL },
            OpKind::Write => RunOutcome::Indeterminate { error },
        }
    }

    async fn prepare(&self, session: &mut Session) -> Result<(), DbError> {
        session.execute(SET_AUTO_RETRY, &[]).await?;
        session.execute(SET_SERIALIZABLE, &[]).await?;
        if self.cfg.debug_statements {
            session.execute(SET_DEBUG, &[]).await?;
        }
        session.execute(SET_RETRY_BUDGET, &[self.cfg.retry_budget]).await?;
        session.query(PROBE, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::testing::{ScriptStep, ScriptedConn, ScriptedConnector},
        jolt_core::Target,
    };

    fn target() -> Target {
        Target::new("n1", "jolt")
    }

    async fn open(conn: ScriptedConn) -> (Arc<SessionManager>, Session) {
        let connector = Arc::new(ScriptedConnector::new_with(vec![conn]));
        let manager = Arc::new(
            SessionManager::new(connector).not_ready_wait(Duration::ZERO),
        );
        let session = manager.acquire(&target()).await.unwrap();
        (manager, session)
    }

    #[tokio::test]
    async fn retries_retryable_aborts_until_success() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::abort("restart transaction")))
            .step(ScriptStep::Fail(DbError::abort("restart transaction")))
            .step(ScriptStep::Affected(1));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::new(manager);

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Ok(rows) => assert_eq!(rows, 1),
            other => panic!("expected success after retries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unclassified_write_error_is_indeterminate() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::connection("connection reset")));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::new(manager);

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Indeterminate { error } => {
                assert_eq!(error.message, "connection reset");
            }
            other => panic!("expected Indeterminate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unclassified_read_error_is_fail() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::connection("connection reset")));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::new(manager);

        let outcome = runner
            .run(&mut session, OpKind::Read, |s| {
                Box::pin(async move { s.query("SELECT v FROM t", &[]).await })
            })
            .await;
        match outcome {
            RunOutcome::Fail { tag } => assert_eq!(tag, TAG_FATAL),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn logical_failure_is_fail_for_writes() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::integrity("duplicate key value")));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::new(manager);

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Fail { tag } => assert_eq!(tag, TAG_LOGICAL),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn prep_connect_failure_is_fail_even_for_writes() {
        let conn =
            ScriptedConn::default().prep_failure(DbError::connection("cannot connect to n1"));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::new(manager);

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Fail { tag } => assert_eq!(tag, TAG_CONN_PREP),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_forces_session_closed() {
        let conn = ScriptedConn::default().step(ScriptStep::Hang);
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::with_config(
            manager,
            RunnerConfig {
                txn_timeout: Duration::from_millis(10),
                ..RunnerConfig::default()
            },
        );

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Indeterminate { error } => {
                assert_eq!(error.kind, DbErrorKind::Timeout);
            }
            other => panic!("expected Indeterminate, got {other:?}"),
        }
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn bounded_retries_give_up_with_fail() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::abort("restart transaction")))
            .step(ScriptStep::Fail(DbError::abort("restart transaction")))
            .step(ScriptStep::Fail(DbError::abort("restart transaction")));
        let (manager, mut session) = open(conn).await;
        let runner = TxnRunner::with_config(
            manager,
            RunnerConfig {
                max_attempts: Some(3),
                ..RunnerConfig::default()
            },
        );

        let outcome = runner
            .run(&mut session, OpKind::Write, |s| {
                Box::pin(async move { s.execute("INSERT INTO t VALUES (?)", &[1]).await })
            })
            .await;
        match outcome {
            RunOutcome::Fail { tag } => assert_eq!(tag, TAG_RETRY_BUDGET),
            other => panic!("expected Fail, got {other:?}"),
        }
    }
}

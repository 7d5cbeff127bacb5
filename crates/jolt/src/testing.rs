//! Scripted connection doubles for exercising the engine without a database.
//!
//! Session-preparation statements (`SET ...` and the `SELECT 1` probe) and
//! schema statements are acknowledged automatically so scripts only describe
//! the unit of work; a queued prep failure overrides that for fault tests.

use {
    crate::conn::{Conn, Connector, Row},
    async_trait::async_trait,
    jolt_core::{DbError, Target},
    std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    },
};

/// The reply for one scripted (non-preparation) statement.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Reply to a query with these rows.
    Rows(Vec<Row>),
    /// Reply to an execute with this rows-affected count.
    Affected(u64),
    /// Fail the statement.
    Fail(DbError),
    /// Never complete; lets timeout paths fire.
    Hang,
}

/// Every statement issued through a scripted connection, in order.
pub type StatementLog = Arc<Mutex<Vec<(String, Vec<i64>)>>>;

#[derive(Debug, Default)]
pub struct ScriptedConn {
    steps: VecDeque<ScriptStep>,
    prep_failures: VecDeque<DbError>,
    log: StatementLog,
    closed: bool,
}

impl ScriptedConn {
    #[must_use]
    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Queues a failure for the next session-preparation statement.
    #[must_use]
    pub fn prep_failure(mut self, error: DbError) -> Self {
        self.prep_failures.push_back(error);
        self
    }

    /// Handle onto the statement log, usable after the connection is boxed.
    pub fn log_handle(&self) -> StatementLog {
        Arc::clone(&self.log)
    }

    fn is_prep_statement(sql: &str) -> bool {
        sql.starts_with("SET ") || sql == "SELECT 1" || sql.starts_with("CREATE TABLE")
    }

    fn record(&self, sql: &str, params: &[i64]) {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }

    async fn next_step(&mut self, sql: &str) -> Result<ScriptStep, DbError> {
        if self.closed {
            return Err(DbError::connection("connection is closed"));
        }
        if Self::is_prep_statement(sql) {
            return match self.prep_failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(ScriptStep::Affected(0)),
            };
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(step) => Ok(step),
            // An unscripted statement succeeds trivially; tests that care
            // about replies script them explicitly.
            None => Ok(ScriptStep::Affected(1)),
        }
    }
}

#[async_trait]
impl Conn for ScriptedConn {
    async fn execute(&mut self, sql: &str, params: &[i64]) -> Result<u64, DbError> {
        self.record(sql, params);
        match self.next_step(sql).await? {
            ScriptStep::Affected(n) => Ok(n),
            ScriptStep::Rows(_) => panic!("scripted rows reply for execute: {sql}"),
            ScriptStep::Fail(error) => Err(error),
            ScriptStep::Hang => unreachable!(),
        }
    }

    async fn query(&mut self, sql: &str, params: &[i64]) -> Result<Vec<Row>, DbError> {
        self.record(sql, params);
        match self.next_step(sql).await? {
            ScriptStep::Rows(rows) => Ok(rows),
            ScriptStep::Affected(_) => Ok(Vec::new()),
            ScriptStep::Fail(error) => Err(error),
            ScriptStep::Hang => unreachable!(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Hands out scripted connections in order, then unscripted defaults.
#[derive(Default)]
pub struct ScriptedConnector {
    conns: Mutex<VecDeque<ScriptedConn>>,
    dial_delay: Option<Duration>,
    dial_failures: Mutex<VecDeque<DbError>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with(conns: Vec<ScriptedConn>) -> Self {
        ScriptedConnector {
            conns: Mutex::new(conns.into()),
            dial_delay: None,
            dial_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Delays every dial, e.g. past the connect timeout.
    #[must_use]
    pub fn dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = Some(delay);
        self
    }

    /// Queues a failure for the next dial.
    #[must_use]
    pub fn dial_failure(self, error: DbError) -> Self {
        self.dial_failures.lock().unwrap().push_back(error);
        self
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn dial(&self, _target: &Target) -> Result<Box<dyn Conn>, DbError> {
        if let Some(delay) = self.dial_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.dial_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let conn = self
            .conns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(conn))
    }
}

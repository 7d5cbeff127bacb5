//! Session lifecycle: one recoverable connection per logical client slot.
//!
//! A session is exclusively owned by its process. It is never pooled, never
//! shared, and never silently repaired: once it faults, the next use must go
//! through a fresh [`SessionManager::acquire`].

use {
    crate::conn::{Conn, Connector, Row},
    futures::future::BoxFuture,
    jolt_core::{DbError, Target},
    std::{sync::Arc, time::Duration},
    thiserror::Error,
    tracing::{debug, info, warn},
};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to back off before surfacing a not-ready connection, to avoid
/// hammering a recovering node.
pub const NOT_READY_WAIT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    /// The session hit a hard fault (timeout, forced close). It must not be
    /// reused; the next use dials fresh.
    Faulted,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out opening connection to {target}")]
    ConnectTimeout { target: Target },
    #[error("failed to open connection to {target}: {error}")]
    Dial { target: Target, error: DbError },
    /// The underlying connection was closed or faulted when the scoped body
    /// was about to run. The caller's own retry loop decides what to do next.
    #[error("connection not ready")]
    ConnFailure,
}

pub struct Session {
    target: Target,
    state: SessionState,
    conn: Option<Box<dyn Conn>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open && self.conn.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Marks the session unusable. Subsequent uses must re-acquire.
    pub fn fault(&mut self) {
        if self.state != SessionState::Faulted {
            warn!(target = %self.target, "session faulted");
        }
        self.state = SessionState::Faulted;
    }

    /// Idempotently releases the underlying connection.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            debug!(target = %self.target, "session closed");
        }
        if self.state != SessionState::Faulted {
            self.state = SessionState::Closed;
        }
    }

    pub async fn execute(&mut self, sql: &str, params: &[i64]) -> Result<u64, DbError> {
        match &mut self.conn {
            Some(conn) => conn.execute(sql, params).await,
            None => Err(DbError::connection("session has no open connection")),
        }
    }

    pub async fn query(&mut self, sql: &str, params: &[i64]) -> Result<Vec<Row>, DbError> {
        match &mut self.conn {
            Some(conn) => conn.query(sql, params).await,
            None => Err(DbError::connection("session has no open connection")),
        }
    }
}

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    not_ready_wait: Duration,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        SessionManager {
            connector,
            connect_timeout: CONNECT_TIMEOUT,
            not_ready_wait: NOT_READY_WAIT,
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn not_ready_wait(mut self, wait: Duration) -> Self {
        self.not_ready_wait = wait;
        self
    }

    /// Opens a fresh session within the connect timeout. The returned session
    /// is Open; previously faulted sessions are simply dropped by the caller.
    pub async fn acquire(&self, target: &Target) -> Result<Session, SessionError> {
        let mut session = Session {
            target: target.clone(),
            state: SessionState::Opening,
            conn: None,
        };
        let dial = self.connector.dial(target);
        match tokio::time::timeout(self.connect_timeout, dial).await {
            Err(_elapsed) => {
                warn!(target = %target, timeout = ?self.connect_timeout, "connect timed out");
                Err(SessionError::ConnectTimeout {
                    target: target.clone(),
                })
            }
            Ok(Err(error)) => {
                warn!(target = %target, %error, "connect failed");
                Err(SessionError::Dial {
                    target: target.clone(),
                    error,
                })
            }
            Ok(Ok(conn)) => {
                info!(target = %target, "session open");
                session.conn = Some(conn);
                session.state = SessionState::Open;
                Ok(session)
            }
        }
    }

    /// The not-ready gate. If the connection is closed or faulted, waits
    /// [`NOT_READY_WAIT`] and fails with [`SessionError::ConnFailure`] rather
    /// than retrying in place; the caller's own retry loop decides.
    pub async fn ensure_ready(&self, session: &mut Session) -> Result<(), SessionError> {
        if !session.is_open() {
            debug!(target = %session.target, state = ?session.state, "connection not ready");
            tokio::time::sleep(self.not_ready_wait).await;
            session.fault();
            return Err(SessionError::ConnFailure);
        }
        Ok(())
    }

    /// Scoped execution against a session, behind the not-ready gate.
    pub async fn with_session<R>(
        &self,
        session: &mut Session,
        body: impl for<'a> FnOnce(&'a mut Session) -> BoxFuture<'a, R>,
    ) -> Result<R, SessionError> {
        self.ensure_ready(session).await?;
        Ok(body(session).await)
    }
}

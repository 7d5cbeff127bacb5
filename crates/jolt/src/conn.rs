//! The driver seam. The harness never implements a database; it talks to one
//! through these traits, and tests substitute the scripted double from
//! [`crate::testing`].

use {
    async_trait::async_trait,
    jolt_core::{DbError, Target},
};

/// A single result row. The workloads only ever read integer columns.
pub type Row = Vec<i64>;

/// One live database connection, exclusively owned by a session.
#[async_trait]
pub trait Conn: Send {
    /// Runs a statement, returning the number of rows affected.
    async fn execute(&mut self, sql: &str, params: &[i64]) -> Result<u64, DbError>;

    /// Runs a query, returning the result rows.
    async fn query(&mut self, sql: &str, params: &[i64]) -> Result<Vec<Row>, DbError>;

    /// Whether the underlying transport is known to be closed.
    fn is_closed(&self) -> bool;

    /// Releases the connection. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens connections to cluster members.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Conn>, DbError>;
}

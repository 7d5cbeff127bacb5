//! Jolt drives typed workloads (set adds, register writes and compare-and-swap,
//! dirty-read probes) against a clustered SQL database while an external fault
//! scheduler restarts nodes and partitions the network. Every attempt and its
//! outcome is appended to a [`History`](jolt_core::History), which the
//! `jolt_checker` crate analyzes after the run.
//!
//! The correctness-critical piece is the [`runner`] module: it decides whether
//! a database error is a retryable transient, a confirmed logical failure, or
//! an indeterminate outcome. Marking a possibly-committed write as a confirmed
//! failure would let the dirty-reads checker declare false violations, so the
//! runner only downgrades write errors that are provably idempotent.
//!
//! # Example
//!
//! ```ignore
//! let cfg = HarnessConfig::from_env()?;
//! let manager = Arc::new(SessionManager::new(connector));
//! let keys = Arc::new(Counter::new(0));
//! let workload = SetWorkload::new(0usize, cfg.targets()[0].clone(), manager, keys);
//! let history = orchestrator::drive(vec![Box::new(workload)], schedule).await?;
//! ```

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod conn;
pub mod counter;
pub mod orchestrator;
pub mod runner;
pub mod session;
pub mod testing;
pub mod workload;

pub use config::HarnessConfig;
pub use conn::{Conn, Connector, Row};
pub use counter::Counter;
pub use orchestrator::{drive, OpSource, Recorder, Schedule};
pub use runner::{OpKind, RunOutcome, RunnerConfig, TxnRunner};
pub use session::{Session, SessionError, SessionManager, SessionState};
pub use workload::{
    DirtyReadsWorkload, Invocation, RegisterWorkload, SetWorkload, SetupError, Workload, SENTINEL,
};

//! This crate specifies the core types for the Jolt harness: identifiers for
//! cluster nodes and logical client processes, the operation records that make
//! up an append-only history, the raw database error shape, and the pure
//! classifiers that decide whether a database error is retryable, an expected
//! logical failure, a connection fault that provably had no side effect, or
//! fatal.
//!
//! Nothing here performs I/O. The driving engine lives in the `jolt` crate and
//! the history analyzers in `jolt_checker`.

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod error;
mod history;
mod id;

pub use error::{classify_abort, classify_logical, classify_prep, classify};
pub use error::{DbError, DbErrorKind, ErrorClass};
pub use history::{History, Op, OpFn, OpType, OpValue};
pub use id::{Node, Process, Target};

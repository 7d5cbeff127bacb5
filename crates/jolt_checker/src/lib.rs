//! Offline analysis of recorded operation histories.
//!
//! Checkers are pure functions over a [`History`](jolt_core::History): no
//! clock, no database, no mutation. Each returns a serializable report whose
//! `valid` flag reflects only confirmed violations; suspicious-but-legal
//! observations are surfaced in the report without failing the run.
//!
//! Soundness leans on how outcomes were recorded: a `Fail` record means the
//! attempt provably left no durable state, while `Info` means unknown. The
//! checkers therefore treat `Info` writes as possibly committed and only ever
//! condemn values tied to `Fail`.

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

pub mod dirty_reads;
pub mod register;
pub mod set;

pub use dirty_reads::DirtyReadsReport;
pub use register::RegisterReport;
pub use set::SetReport;

//! Detects reads that observed writes known to have failed.
//!
//! A write recorded `Fail` provably committed nothing, so its value must
//! never appear in any read. The seed sentinel joins the failed set
//! unconditionally: rows still holding it were never successfully
//! overwritten, and a read sees only live rows. Reads that mix several live
//! values are legal under concurrent overwrites and are reported without
//! invalidating the run.

use {
    jolt_core::{History, OpFn, OpType},
    serde::Serialize,
    std::collections::BTreeSet,
    tracing::warn,
};

/// Seed value planted during setup, treated as a failed write.
const SENTINEL: i64 = -1;

#[derive(Clone, Debug, Serialize)]
pub struct DirtyReadsReport {
    pub valid: bool,
    /// Values no read may contain: failed-write values plus the sentinel.
    pub failed_writes: BTreeSet<i64>,
    /// Distinct value sets of reads observing more than one live value.
    /// Legal, but worth eyeballing.
    pub inconsistent_reads: Vec<Vec<i64>>,
    /// Distinct value sets of reads intersecting `failed_writes`. Each one
    /// is a dirty read.
    pub filthy_reads: Vec<Vec<i64>>,
}

pub fn check(history: &History) -> DirtyReadsReport {
    let mut failed_writes: BTreeSet<i64> = history
        .completions(OpFn::Write)
        .filter(|op| op.kind == OpType::Fail)
        .filter_map(|op| op.value.as_int())
        .collect();
    failed_writes.insert(SENTINEL);

    let mut inconsistent_reads = Vec::new();
    let mut filthy_reads = Vec::new();
    for op in history
        .completions(OpFn::Read)
        .filter(|op| op.kind == OpType::Ok)
    {
        let observed = op.value.distinct();
        if observed.len() > 1 {
            inconsistent_reads.push(observed.iter().copied().collect());
        }
        if !observed.is_disjoint(&failed_writes) {
            warn!(?observed, "read observed a failed write");
            filthy_reads.push(observed.iter().copied().collect());
        }
    }

    DirtyReadsReport {
        valid: filthy_reads.is_empty(),
        failed_writes,
        inconsistent_reads,
        filthy_reads,
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        jolt_core::{Op, OpValue},
    };

    fn write_fail(value: i64) -> Op {
        Op::fail(0, OpFn::Write, OpValue::Int(value)).with_error("timeout")
    }

    fn write_ok(value: i64) -> Op {
        Op::ok(0, OpFn::Write, OpValue::Int(value))
    }

    fn read_ok(values: Vec<i64>) -> Op {
        Op::ok(1, OpFn::Read, OpValue::List(values))
    }

    #[test]
    fn read_of_a_failed_write_is_filthy() {
        let history = History::from_ops(vec![write_fail(7), read_ok(vec![7])]);
        let report = check(&history);
        assert!(!report.valid);
        assert_eq!(report.filthy_reads, vec![vec![7]]);
        assert!(report.inconsistent_reads.is_empty());
    }

    #[test]
    fn consistent_reads_of_committed_writes_are_valid() {
        let history = History::from_ops(vec![
            write_ok(3),
            read_ok(vec![3]),
            read_ok(vec![3]),
        ]);
        let report = check(&history);
        assert!(report.valid);
        assert!(report.filthy_reads.is_empty());
        assert!(report.inconsistent_reads.is_empty());
    }

    #[test]
    fn mixed_live_values_are_reported_but_legal() {
        let history = History::from_ops(vec![
            write_ok(3),
            write_ok(5),
            read_ok(vec![3, 5]),
        ]);
        let report = check(&history);
        assert!(report.valid);
        assert_eq!(report.inconsistent_reads, vec![vec![3, 5]]);
    }

    #[test]
    fn sentinel_observation_is_filthy_even_without_failed_writes() {
        let history = History::from_ops(vec![read_ok(vec![SENTINEL])]);
        let report = check(&history);
        assert!(!report.valid);
        assert_eq!(report.filthy_reads, vec![vec![SENTINEL]]);
    }

    #[test]
    fn indeterminate_writes_never_condemn_a_read() {
        let history = History::from_ops(vec![
            Op::info(0, OpFn::Write, OpValue::Int(9)).with_error("connection reset"),
            read_ok(vec![9]),
        ]);
        let report = check(&history);
        assert!(report.valid);
    }
}

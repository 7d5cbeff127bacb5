//! Set completeness: every acknowledged add must survive to the final read,
//! and nothing may appear that was never attempted.

use {
    jolt_core::{History, OpFn, OpType},
    serde::Serialize,
    std::collections::BTreeSet,
    tracing::info,
};

#[derive(Clone, Debug, Serialize)]
pub struct SetReport {
    pub valid: bool,
    /// Acknowledged adds missing from the final read. Data loss.
    pub lost: Vec<i64>,
    /// Read values never attempted by any add. Fabrication.
    pub unexpected: Vec<i64>,
    /// Unacknowledged adds that nevertheless survived. Legal (the attempt
    /// was indeterminate) and useful for gauging fault impact.
    pub recovered: Vec<i64>,
    pub attempted_count: usize,
    pub acknowledged_count: usize,
    /// `None` when the history holds no successful final read, which also
    /// invalidates the run.
    pub final_read: Option<Vec<i64>>,
}

pub fn check(history: &History) -> SetReport {
    let attempted: BTreeSet<i64> = history
        .ops()
        .iter()
        .filter(|op| op.f == OpFn::Add && op.kind == OpType::Invoke)
        .filter_map(|op| op.value.as_int())
        .collect();
    let acknowledged: BTreeSet<i64> = history
        .completions(OpFn::Add)
        .filter(|op| op.kind == OpType::Ok)
        .filter_map(|op| op.value.as_int())
        .collect();

    let final_read = history
        .completions(OpFn::Read)
        .filter(|op| op.kind == OpType::Ok)
        .last()
        .map(|op| op.value.distinct());

    let Some(read) = final_read else {
        return SetReport {
            valid: false,
            lost: Vec::new(),
            unexpected: Vec::new(),
            recovered: Vec::new(),
            attempted_count: attempted.len(),
            acknowledged_count: acknowledged.len(),
            final_read: None,
        };
    };

    let lost: Vec<i64> = acknowledged.difference(&read).copied().collect();
    let unexpected: Vec<i64> = read.difference(&attempted).copied().collect();
    let recovered: Vec<i64> = read
        .intersection(&attempted)
        .filter(|v| !acknowledged.contains(v))
        .copied()
        .collect();
    info!(
        attempted = attempted.len(),
        acknowledged = acknowledged.len(),
        recovered = recovered.len(),
        "set totals"
    );

    SetReport {
        valid: lost.is_empty() && unexpected.is_empty(),
        lost,
        unexpected,
        recovered,
        attempted_count: attempted.len(),
        acknowledged_count: acknowledged.len(),
        final_read: Some(read.into_iter().collect()),
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        jolt_core::{Op, OpValue},
    };

    fn add_pair(value: i64, kind: OpType) -> Vec<Op> {
        let invoke = Op::invoke(0, OpFn::Add, OpValue::Int(value));
        let completion = match kind {
            OpType::Ok => Op::ok(0, OpFn::Add, OpValue::Int(value)),
            OpType::Fail => Op::fail(0, OpFn::Add, OpValue::Int(value)).with_error("timeout"),
            _ => Op::info(0, OpFn::Add, OpValue::Int(value)).with_error("connection reset"),
        };
        vec![invoke, completion]
    }

    fn with_final_read(mut ops: Vec<Op>, read: Vec<i64>) -> History {
        ops.push(Op::invoke(1, OpFn::Read, OpValue::None));
        ops.push(Op::ok(1, OpFn::Read, OpValue::List(read)));
        History::from_ops(ops)
    }

    #[test]
    fn acknowledged_add_missing_from_read_is_lost() {
        let mut ops = add_pair(1, OpType::Ok);
        ops.extend(add_pair(2, OpType::Ok));
        let report = check(&with_final_read(ops, vec![1]));
        assert!(!report.valid);
        assert_eq!(report.lost, vec![2]);
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn read_value_never_attempted_is_unexpected() {
        let report = check(&with_final_read(add_pair(1, OpType::Ok), vec![1, 99]));
        assert!(!report.valid);
        assert_eq!(report.unexpected, vec![99]);
    }

    #[test]
    fn indeterminate_add_that_survived_is_recovered_not_unexpected() {
        let mut ops = add_pair(1, OpType::Ok);
        ops.extend(add_pair(2, OpType::Info));
        let report = check(&with_final_read(ops, vec![1, 2]));
        assert!(report.valid);
        assert_eq!(report.recovered, vec![2]);
    }

    #[test]
    fn missing_final_read_invalidates_the_run() {
        let report = check(&History::from_ops(add_pair(1, OpType::Ok)));
        assert!(!report.valid);
        assert_eq!(report.final_read, None);
    }
}

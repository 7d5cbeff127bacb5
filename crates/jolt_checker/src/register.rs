//! Write-identifier uniqueness over register mutations.
//!
//! Full linearizability checking of the register history is delegated to an
//! external model checker over the serialized history; what must hold locally
//! is that no uid was acknowledged twice, otherwise that analysis is fed
//! ambiguous writes.

use {
    jolt_core::{History, OpFn, OpType, OpValue},
    serde::Serialize,
    std::collections::BTreeSet,
};

#[derive(Clone, Debug, Serialize)]
pub struct RegisterReport {
    pub valid: bool,
    /// uids acknowledged by more than one mutation.
    pub uid_collisions: Vec<i64>,
    pub acknowledged_mutations: usize,
}

pub fn check(history: &History) -> RegisterReport {
    let mut seen = BTreeSet::new();
    let mut collisions = BTreeSet::new();
    let mut acknowledged = 0usize;
    let mutations = history
        .completions(OpFn::Write)
        .chain(history.completions(OpFn::Cas))
        .filter(|op| op.kind == OpType::Ok);
    for op in mutations {
        acknowledged += 1;
        let uid = match op.value {
            OpValue::Register { uid, .. } | OpValue::Cas { uid, .. } => uid,
            _ => None,
        };
        if let Some(uid) = uid {
            if !seen.insert(uid) {
                collisions.insert(uid);
            }
        }
    }
    RegisterReport {
        valid: collisions.is_empty(),
        uid_collisions: collisions.into_iter().collect(),
        acknowledged_mutations: acknowledged,
    }
}

#[cfg(test)]
mod test {
    use {super::*, jolt_core::Op};

    fn write_ok(key: i64, value: i64, uid: i64) -> Op {
        Op::ok(
            0,
            OpFn::Write,
            OpValue::Register {
                key,
                value,
                uid: Some(uid),
            },
        )
    }

    #[test]
    fn distinct_uids_are_valid() {
        let history = History::from_ops(vec![write_ok(1, 5, 10), write_ok(1, 5, 11)]);
        let report = check(&history);
        assert!(report.valid);
        assert_eq!(report.acknowledged_mutations, 2);
    }

    #[test]
    fn repeated_uid_is_a_collision() {
        let history = History::from_ops(vec![
            write_ok(1, 5, 10),
            write_ok(2, 6, 10),
            Op::ok(
                1,
                OpFn::Cas,
                OpValue::Cas {
                    key: 1,
                    old: 5,
                    new: 7,
                    uid: Some(12),
                },
            ),
        ]);
        let report = check(&history);
        assert!(!report.valid);
        assert_eq!(report.uid_collisions, vec![10]);
    }
}

//! Operation records and the append-only history.
//!
//! Operations follow a request/response model: an `Invoke` record marks the
//! start of an attempt and exactly one completion record follows for the same
//! process: `Ok` (confirmed success), `Fail` (confirmed no durable effect),
//! or `Info` (indeterminate; the attempt may or may not have committed).
//! Checkers consume the ordered sequence and must never revise an outcome.

use {
    crate::Process,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeSet, time::Duration},
};

/// The function tag of an operation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OpFn {
    /// Insert an element into the observed set.
    Add,
    /// Read current state (the set contents, a register, or the dirty-reads rows).
    Read,
    /// Unconditional register write.
    Write,
    /// Compare-and-swap register update.
    Cas,
}

/// The phase/outcome classification of a record.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OpType {
    /// The operation was invoked and has not completed yet.
    Invoke,
    /// Confirmed success.
    Ok,
    /// Confirmed failure with no durable side effect.
    Fail,
    /// Indeterminate outcome. The attempt may have committed; checkers must
    /// treat it as neither a confirmed success nor a confirmed failure.
    Info,
}

/// The value payload carried by a record.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum OpValue {
    None,
    /// A single element (set adds, dirty-reads writes).
    Int(i64),
    /// A register observation or write: `(key, value)` plus the
    /// write-identifier that produced (or was allocated for) the value. The
    /// uid disambiguates which write produced an observed literal value when
    /// two writes coincidentally carry the same value.
    Register {
        key: i64,
        value: i64,
        uid: Option<i64>,
    },
    /// A conditional update: succeed iff the register currently holds `old`.
    /// `uid` is the write-identifier allocated for `new`.
    Cas {
        key: i64,
        old: i64,
        new: i64,
        uid: Option<i64>,
    },
    /// A multi-row observation (set reads, dirty reads).
    List(Vec<i64>),
}

impl OpValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OpValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[i64]> {
        match self {
            OpValue::List(vs) => Some(vs),
            _ => None,
        }
    }

    /// Distinct values of a `List`, empty for other shapes.
    pub fn distinct(&self) -> BTreeSet<i64> {
        match self {
            OpValue::List(vs) => vs.iter().copied().collect(),
            _ => BTreeSet::new(),
        }
    }
}

/// One record in a history. Immutable once appended.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Op {
    pub process: Process,
    pub f: OpFn,
    pub kind: OpType,
    pub value: OpValue,
    /// Time since the start of the run.
    pub time: Duration,
    /// Classifier tag for `Fail`/`Info` records, e.g. `"conn-failure"`.
    pub error: Option<String>,
}

impl Op {
    pub fn invoke(process: impl Into<Process>, f: OpFn, value: OpValue) -> Self {
        Op {
            process: process.into(),
            f,
            kind: OpType::Invoke,
            value,
            time: Duration::ZERO,
            error: None,
        }
    }

    pub fn ok(process: impl Into<Process>, f: OpFn, value: OpValue) -> Self {
        Op {
            process: process.into(),
            f,
            kind: OpType::Ok,
            value,
            time: Duration::ZERO,
            error: None,
        }
    }

    pub fn fail(process: impl Into<Process>, f: OpFn, value: OpValue) -> Self {
        Op {
            process: process.into(),
            f,
            kind: OpType::Fail,
            value,
            time: Duration::ZERO,
            error: None,
        }
    }

    pub fn info(process: impl Into<Process>, f: OpFn, value: OpValue) -> Self {
        Op {
            process: process.into(),
            f,
            kind: OpType::Info,
            value,
            time: Duration::ZERO,
            error: None,
        }
    }

    #[must_use]
    pub fn at(mut self, time: Duration) -> Self {
        self.time = time;
        self
    }

    #[must_use]
    pub fn with_error(mut self, tag: impl Into<String>) -> Self {
        self.error = Some(tag.into());
        self
    }
}

/// An append-only, time-ordered sequence of operation records across all
/// processes. The sole input to the checkers.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct History {
    ops: Vec<Op>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        History { ops: Vec::new() }
    }

    #[must_use]
    pub fn from_ops(ops: Vec<Op>) -> Self {
        History { ops }
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Completion records (everything but `Invoke`) matching a function tag.
    pub fn completions(&self, f: OpFn) -> impl Iterator<Item = &Op> {
        self.ops
            .iter()
            .filter(move |op| op.f == f && op.kind != OpType::Invoke)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn completions_excludes_invocations() {
        let mut history = History::new();
        history.push(Op::invoke(0, OpFn::Add, OpValue::Int(1)));
        history.push(Op::ok(0, OpFn::Add, OpValue::Int(1)));
        history.push(Op::invoke(1, OpFn::Read, OpValue::None));
        history.push(Op::ok(1, OpFn::Read, OpValue::List(vec![1])));

        let adds: Vec<_> = history.completions(OpFn::Add).collect();
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].kind, OpType::Ok);
        assert_eq!(adds[0].value, OpValue::Int(1));
    }

    #[test]
    fn distinct_collapses_duplicate_observations() {
        let value = OpValue::List(vec![3, 5, 3]);
        assert_eq!(value.distinct(), BTreeSet::from([3, 5]));
        assert_eq!(OpValue::Int(3).distinct(), BTreeSet::new());
    }
}

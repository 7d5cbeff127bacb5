//! Read/write/CAS registers keyed by integer id.
//!
//! Every mutation carries a freshly allocated uid so an external model
//! checker can tell otherwise-identical writes apart. The uid is drawn before
//! the statement runs; an indeterminate outcome therefore burns the uid
//! rather than risking a duplicate.

use {
    super::{fail_op, info_op, ClientCore, Invocation, SetupError, Workload, TAG_UNSUPPORTED},
    crate::{
        counter::Counter,
        runner::{OpKind, RunOutcome, RunnerConfig},
        session::SessionManager,
    },
    async_trait::async_trait,
    jolt_core::{Op, OpFn, OpValue, Process, Target},
    std::sync::Arc,
    tracing::warn,
};

pub const CREATE_REGISTER_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS jolt_registers (id INT PRIMARY KEY, value INT, uid INT)";
pub const SELECT_REGISTER: &str = "SELECT value, uid FROM jolt_registers WHERE id = ?";
pub const UPSERT_REGISTER: &str = "UPSERT INTO jolt_registers (id, value, uid) VALUES (?, ?, ?)";
pub const CAS_REGISTER: &str =
    "UPDATE jolt_registers SET value = ?, uid = ? WHERE id = ? AND value = ?";

/// Recorded when a mutation committed but touched an unexpected number of
/// rows: a CAS whose precondition did not hold, or an upsert that vanished.
pub const TAG_NO_ROWS: &str = "no-rows-updated";

pub struct RegisterWorkload {
    core: ClientCore,
    uids: Arc<Counter>,
}

impl RegisterWorkload {
    pub fn new(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        uids: Arc<Counter>,
    ) -> Self {
        Self::with_config(process, target, manager, uids, RunnerConfig::default())
    }

    pub fn with_config(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        uids: Arc<Counter>,
        cfg: RunnerConfig,
    ) -> Self {
        RegisterWorkload {
            core: ClientCore::new(process, target, manager, cfg),
            uids,
        }
    }

    /// Maps a committed mutation to Ok or Fail by rows affected. A committed
    /// statement that changed no rows had no effect, so Fail is sound.
    fn mutation_op(process: Process, f: OpFn, value: OpValue, rows: u64) -> Op {
        if rows == 1 {
            Op::ok(process, f, value)
        } else {
            fail_op(process, f, value, TAG_NO_ROWS)
        }
    }
}

#[async_trait]
impl Workload for RegisterWorkload {
    fn process(&self) -> Process {
        self.core.process
    }

    async fn setup(&mut self) -> Result<(), SetupError> {
        let session = self.core.setup_session().await?;
        session.execute(CREATE_REGISTER_TABLE, &[]).await?;
        Ok(())
    }

    async fn invoke(&mut self, invocation: Invocation) -> Op {
        let process = self.core.process;
        match invocation {
            Invocation::ReadRegister { key } => {
                let outcome = self
                    .core
                    .run(OpKind::Read, move |s| {
                        Box::pin(async move { s.query(SELECT_REGISTER, &[key]).await })
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(rows) => match rows.first() {
                        Some(row) if row.len() >= 2 => Op::ok(
                            process,
                            OpFn::Read,
                            OpValue::Register {
                                key,
                                value: row[0],
                                uid: Some(row[1]),
                            },
                        ),
                        // An absent register reads as no value, still Ok.
                        _ => Op::ok(process, OpFn::Read, OpValue::None),
                    },
                    RunOutcome::Fail { tag } => fail_op(process, OpFn::Read, OpValue::None, tag),
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Read, OpValue::None, &error)
                    }
                }
            }
            Invocation::WriteRegister { key, value } => {
                let uid = self.uids.next();
                let recorded = OpValue::Register {
                    key,
                    value,
                    uid: Some(uid),
                };
                let outcome = self
                    .core
                    .run(OpKind::Write, move |s| {
                        Box::pin(
                            async move { s.execute(UPSERT_REGISTER, &[key, value, uid]).await },
                        )
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(rows) => Self::mutation_op(process, OpFn::Write, recorded, rows),
                    RunOutcome::Fail { tag } => fail_op(process, OpFn::Write, recorded, tag),
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Write, recorded, &error)
                    }
                }
            }
            Invocation::Cas { key, old, new } => {
                let uid = self.uids.next();
                let recorded = OpValue::Cas {
                    key,
                    old,
                    new,
                    uid: Some(uid),
                };
                let outcome = self
                    .core
                    .run(OpKind::Write, move |s| {
                        Box::pin(
                            async move { s.execute(CAS_REGISTER, &[new, uid, key, old]).await },
                        )
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(rows) => Self::mutation_op(process, OpFn::Cas, recorded, rows),
                    RunOutcome::Fail { tag } => fail_op(process, OpFn::Cas, recorded, tag),
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Cas, recorded, &error)
                    }
                }
            }
            other => {
                warn!(?other, "invocation outside the register workload");
                fail_op(process, other.f(), other.value(), TAG_UNSUPPORTED)
            }
        }
    }

    async fn teardown(&mut self) {
        self.core.teardown().await;
    }
}

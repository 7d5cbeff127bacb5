//! Dirty-reads probe: concurrent whole-slot overwrites under fault
//! injection, with reads that must never observe a failed write.
//!
//! Each process owns a contiguous slot of rows seeded to [`SENTINEL`].
//! Writers select every owned row in random order to widen the read set of
//! the transaction, then overwrite the slot with one value. Readers select
//! every live (non-sentinel) row cluster-wide. The checker later rejects any
//! read that contains a value whose write was recorded Fail.

use {
    super::{fail_op, info_op, ClientCore, Invocation, SetupError, Workload, TAG_UNSUPPORTED},
    crate::{
        runner::{OpKind, RunOutcome, RunnerConfig, TAG_LOGICAL},
        session::SessionManager,
    },
    async_trait::async_trait,
    jolt_core::{Op, OpFn, OpValue, Process, Target},
    rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng},
    std::{collections::BTreeSet, sync::Arc, time::Duration},
    tracing::{debug, warn},
};

/// Seed value, excluded from reads. Real writes never use it.
pub const SENTINEL: i64 = -1;

pub const CREATE_DIRTY_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS jolt_dirty (id INT PRIMARY KEY, v INT)";
pub const INSERT_ROW: &str = "INSERT INTO jolt_dirty (id, v) VALUES (?, ?)";
pub const SELECT_ROW: &str = "SELECT v FROM jolt_dirty WHERE id = ?";
pub const UPDATE_SLOT: &str = "UPDATE jolt_dirty SET v = ? WHERE id >= ? AND id < ?";
pub const SELECT_LIVE: &str = "SELECT v FROM jolt_dirty WHERE v != ?";

const MAX_SEED_ATTEMPTS: u32 = 10;
const SEED_JITTER_MS: u64 = 50;

pub struct DirtyReadsWorkload {
    core: ClientCore,
    rows_per_slot: usize,
    rng: StdRng,
}

impl DirtyReadsWorkload {
    pub fn new(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        rows_per_slot: usize,
        seed: u64,
    ) -> Self {
        Self::with_config(
            process,
            target,
            manager,
            rows_per_slot,
            seed,
            RunnerConfig::default(),
        )
    }

    pub fn with_config(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        rows_per_slot: usize,
        seed: u64,
        cfg: RunnerConfig,
    ) -> Self {
        DirtyReadsWorkload {
            core: ClientCore::new(process, target, manager, cfg),
            rows_per_slot,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The half-open row id range owned by this process.
    fn slot(&self) -> (i64, i64) {
        let base = usize::from(self.core.process) * self.rows_per_slot;
        (base as i64, (base + self.rows_per_slot) as i64)
    }

    /// Seeds one row, retrying independently so a flaky node does not abort
    /// the whole slot. A duplicate-key rejection means the row survived an
    /// earlier indeterminate attempt.
    async fn seed_row(&mut self, id: i64) -> Result<(), SetupError> {
        for attempt in 1..=MAX_SEED_ATTEMPTS {
            let outcome = self
                .core
                .run(OpKind::Write, move |s| {
                    Box::pin(async move { s.execute(INSERT_ROW, &[id, SENTINEL]).await })
                })
                .await;
            match outcome {
                RunOutcome::Ok(_) => return Ok(()),
                RunOutcome::Fail { tag } if tag == TAG_LOGICAL => return Ok(()),
                other => {
                    debug!(id, attempt, ?other, "seed insert did not land, retrying");
                    let jitter = Duration::from_millis(self.rng.gen_range(0..SEED_JITTER_MS));
                    tokio::time::sleep(jitter).await;
                }
            }
        }
        Err(SetupError::RetriesExhausted { row: id })
    }
}

#[async_trait]
impl Workload for DirtyReadsWorkload {
    fn process(&self) -> Process {
        self.core.process
    }

    async fn setup(&mut self) -> Result<(), SetupError> {
        let session = self.core.setup_session().await?;
        session.execute(CREATE_DIRTY_TABLE, &[]).await?;
        let (lo, hi) = self.slot();
        for id in lo..hi {
            self.seed_row(id).await?;
        }
        Ok(())
    }

    async fn invoke(&mut self, invocation: Invocation) -> Op {
        let process = self.core.process;
        match invocation {
            Invocation::WriteAll { value } => {
                let (lo, hi) = self.slot();
                let mut order: Vec<i64> = (lo..hi).collect();
                order.shuffle(&mut self.rng);
                let outcome = self
                    .core
                    .run(OpKind::Write, move |s| {
                        let order = order.clone();
                        Box::pin(async move {
                            // Touch every owned row first so the overwrite
                            // conflicts with any concurrent slot read.
                            for id in order {
                                s.query(SELECT_ROW, &[id]).await?;
                            }
                            s.execute(UPDATE_SLOT, &[value, lo, hi]).await
                        })
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(_) => Op::ok(process, OpFn::Write, OpValue::Int(value)),
                    RunOutcome::Fail { tag } => {
                        fail_op(process, OpFn::Write, OpValue::Int(value), tag)
                    }
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Write, OpValue::Int(value), &error)
                    }
                }
            }
            Invocation::Read => {
                let outcome = self
                    .core
                    .run(OpKind::Read, |s| {
                        Box::pin(async move { s.query(SELECT_LIVE, &[SENTINEL]).await })
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(rows) => {
                        let values: BTreeSet<i64> =
                            rows.iter().filter_map(|row| row.first().copied()).collect();
                        Op::ok(
                            process,
                            OpFn::Read,
                            OpValue::List(values.into_iter().collect()),
                        )
                    }
                    RunOutcome::Fail { tag } => fail_op(process, OpFn::Read, OpValue::None, tag),
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Read, OpValue::None, &error)
                    }
                }
            }
            other => {
                warn!(?other, "invocation outside the dirty-reads workload");
                fail_op(process, other.f(), other.value(), TAG_UNSUPPORTED)
            }
        }
    }

    async fn teardown(&mut self) {
        self.core.teardown().await;
    }
}

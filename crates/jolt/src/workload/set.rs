//! Grow-only set of integers, checked offline for lost and fabricated
//! elements.

use {
    super::{fail_op, info_op, ClientCore, Invocation, SetupError, Workload, TAG_UNSUPPORTED},
    crate::{
        counter::Counter,
        runner::{OpKind, RunOutcome, RunnerConfig},
        session::SessionManager,
    },
    async_trait::async_trait,
    jolt_core::{Op, OpFn, OpValue, Process, Target},
    std::{collections::BTreeSet, sync::Arc},
    tracing::warn,
};

pub const CREATE_SET_TABLE: &str = "CREATE TABLE IF NOT EXISTS jolt_set (k INT PRIMARY KEY, v INT)";
pub const INSERT_ELEMENT: &str = "INSERT INTO jolt_set (k, v) VALUES (?, ?)";
pub const SELECT_ELEMENTS: &str = "SELECT v FROM jolt_set";

/// Adds elements under keys drawn from a shared counter, so concurrent
/// clients never contend on the same primary key.
pub struct SetWorkload {
    core: ClientCore,
    keys: Arc<Counter>,
}

impl SetWorkload {
    pub fn new(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        keys: Arc<Counter>,
    ) -> Self {
        Self::with_config(process, target, manager, keys, RunnerConfig::default())
    }

    pub fn with_config(
        process: impl Into<Process>,
        target: Target,
        manager: Arc<SessionManager>,
        keys: Arc<Counter>,
        cfg: RunnerConfig,
    ) -> Self {
        SetWorkload {
            core: ClientCore::new(process, target, manager, cfg),
            keys,
        }
    }
}

#[async_trait]
impl Workload for SetWorkload {
    fn process(&self) -> Process {
        self.core.process
    }

    async fn setup(&mut self) -> Result<(), SetupError> {
        let session = self.core.setup_session().await?;
        session.execute(CREATE_SET_TABLE, &[]).await?;
        Ok(())
    }

    async fn invoke(&mut self, invocation: Invocation) -> Op {
        let process = self.core.process;
        match invocation {
            Invocation::Add { value } => {
                // Allocated before the insert: an indeterminate outcome must
                // not reuse the key.
                let key = self.keys.next();
                let outcome = self
                    .core
                    .run(OpKind::Write, move |s| {
                        Box::pin(async move { s.execute(INSERT_ELEMENT, &[key, value]).await })
                    })
                    .await;
                match outcome {
                    RunOutcome::Ok(_) => Op::ok(process, OpFn::Add, OpValue::Int(value)),
                    RunOutcome::Fail { tag } => {
                        fail_op(process, OpFn::Add, OpValue::Int(value), tag)
                    }
                    RunOutcome::Indeterminate { error } => {
                        info_op(process, OpFn::Add, OpValue::Int(value), &error)
                    }
                }
            }
            Invocation::Read => {
                let outcome = self
                    .core
                    .run(OpKind::Read, |s| {
                        Box::pin(async move { s.query(SELECT_ELEMENTS, &[]).await })
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
                warn!(?other, "invocation outside the set workload");
                fail_op(process, other.f(), other.value(), TAG_UNSUPPORTED)
            }
        }
    }

    async fn teardown(&mut self) {
        self.core.teardown().await;
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::testing::{ScriptStep, ScriptedConn, ScriptedConnector},
        jolt_core::{DbError, OpType},
        std::time::Duration,
    };

    fn workload(conn: ScriptedConn) -> SetWorkload {
        let connector = Arc::new(ScriptedConnector::new_with(vec![conn]));
        let manager = Arc::new(SessionManager::new(connector).not_ready_wait(Duration::ZERO));
        SetWorkload::new(0usize, Target::new("n1", "jolt"), manager, Arc::new(Counter::new(0)))
    }

    #[tokio::test]
    async fn add_then_read_records_distinct_sorted_values() {
        let log = ScriptedConn::default();
        let handle = log.log_handle();
        let conn = log
            .step(ScriptStep::Affected(1))
            .step(ScriptStep::Rows(vec![vec![5], vec![5], vec![2]]));
        let mut w = workload(conn);
        w.setup().await.unwrap();

        let add = w.invoke(Invocation::Add { value: 5 }).await;
        assert_eq!(add.kind, OpType::Ok);
        assert_eq!(add.value, OpValue::Int(5));

        let read = w.invoke(Invocation::Read).await;
        assert_eq!(read.kind, OpType::Ok);
        assert_eq!(read.value, OpValue::List(vec![2, 5]));

        let issued = handle.lock().unwrap();
        assert!(issued.iter().any(|(sql, params)| {
            sql == INSERT_ELEMENT && params == &vec![0, 5]
        }));
    }

    #[tokio::test]
    async fn indeterminate_add_records_info() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Fail(DbError::connection("connection reset")));
        let mut w = workload(conn);
        w.setup().await.unwrap();

        let add = w.invoke(Invocation::Add { value: 9 }).await;
        assert_eq!(add.kind, OpType::Info);
        assert_eq!(add.value, OpValue::Int(9));
    }
}

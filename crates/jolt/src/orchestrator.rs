//! Drives workload clients concurrently and records the operation history.
//!
//! One task per client; each task pulls invocations from a shared
//! [`OpSource`], appends the invoke record, runs the operation to completion,
//! and appends the completion. The recorder is the only writer ordering
//! point, so the history interleaves exactly as completions happened.

use {
    crate::workload::{Invocation, SetupError, Workload},
    jolt_core::{History, Op, OpFn, OpValue, Process},
    std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Instant,
    },
    thiserror::Error,
    tracing::{debug, error, info},
};

/// Supplies the next invocation for a process, or `None` to stop it.
pub trait OpSource: Send {
    fn next_op(&mut self, process: Process) -> Option<Invocation>;
}

/// A fixed per-process schedule, handed out in order. The simplest source;
/// fault-injection runs wrap richer generators in the same trait.
#[derive(Default)]
pub struct Schedule {
    by_process: Vec<VecDeque<Invocation>>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the schedule for the next process slot.
    #[must_use]
    pub fn thread(mut self, ops: impl IntoIterator<Item = Invocation>) -> Self {
        self.by_process.push(ops.into_iter().collect());
        self
    }
}

impl OpSource for Schedule {
    fn next_op(&mut self, process: Process) -> Option<Invocation> {
        self.by_process
            .get_mut(usize::from(process))?
            .pop_front()
    }
}

/// Append-only history sink shared by all client tasks. Timestamps are
/// relative to recorder creation.
pub struct Recorder {
    start: Instant,
    history: Mutex<History>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            start: Instant::now(),
            history: Mutex::new(History::default()),
        }
    }

    pub fn record_invoke(&self, process: Process, f: OpFn, value: OpValue) {
        let op = Op::invoke(process, f, value).at(self.start.elapsed());
        if let Ok(mut history) = self.history.lock() {
            history.push(op);
        }
    }

    /// Appends a completion, stamping the time. The outcome itself was
    /// decided by the workload and is never rewritten here.
    pub fn record(&self, op: Op) {
        let op = op.at(self.start.elapsed());
        if let Ok(mut history) = self.history.lock() {
            history.push(op);
        }
    }

    pub fn snapshot(&self) -> History {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("workload task panicked")]
    Panicked,
}

/// Runs every workload to schedule exhaustion and returns the recorded
/// history. Setup failures on any client abort the run.
pub async fn drive(
    workloads: Vec<Box<dyn Workload>>,
    source: impl OpSource + 'static,
) -> Result<History, DriveError> {
    let source = Arc::new(Mutex::new(source));
    let recorder = Arc::new(Recorder::new());

    let mut tasks = Vec::with_capacity(workloads.len());
    for mut workload in workloads {
        let source = Arc::clone(&source);
        let recorder = Arc::clone(&recorder);
        tasks.push(tokio::spawn(async move {
            let process = workload.process();
            workload.setup().await?;
            info!(%process, "client set up, starting schedule");
            loop {
                let invocation = match source.lock() {
                    Ok(mut source) => source.next_op(process),
                    Err(_) => None,
                };
                let Some(invocation) = invocation else { break };
                debug!(%process, ?invocation, "invoking");
                recorder.record_invoke(process, invocation.f(), invocation.value());
                let completion = workload.invoke(invocation).await;
                recorder.record(completion);
            }
            workload.teardown().await;
            info!(%process, "client drained");
            Ok::<(), SetupError>(())
        }));
    }

    for task in tasks {
        match task.await {
            Ok(result) => result?,
            Err(join_error) => {
                error!(%join_error, "client task did not complete");
                return Err(DriveError::Panicked);
            }
        }
    }
    Ok(recorder.snapshot())
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            counter::Counter,
            session::SessionManager,
            testing::{ScriptStep, ScriptedConn, ScriptedConnector},
            workload::SetWorkload,
        },
        jolt_core::{OpType, Target},
        std::time::Duration,
    };

    #[tokio::test]
    async fn drive_records_invoke_and_completion_pairs() {
        let conn = ScriptedConn::default()
            .step(ScriptStep::Affected(1))
            .step(ScriptStep::Rows(vec![vec![1]]));
        let connector = Arc::new(ScriptedConnector::new_with(vec![conn]));
        let manager = Arc::new(SessionManager::new(connector).not_ready_wait(Duration::ZERO));
        let workload = SetWorkload::new(
            0usize,
            Target::new("n1", "jolt"),
            manager,
            Arc::new(Counter::new(0)),
        );

        let schedule = Schedule::new().thread([
            Invocation::Add { value: 1 },
            Invocation::Read,
        ]);
        let history = drive(vec![Box::new(workload)], schedule).await.unwrap();

        assert_eq!(history.len(), 4);
        let kinds: Vec<OpType> = history.ops().iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![OpType::Invoke, OpType::Ok, OpType::Invoke, OpType::Ok]
        );
        // Timestamps never run backwards.
        let times: Vec<_> = history.ops().iter().map(|op| op.time).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[tokio::test]
    async fn schedule_stops_each_process_independently() {
        let mut schedule = Schedule::new()
            .thread([Invocation::Read])
            .thread([]);
        assert_eq!(
            schedule.next_op(Process::from(0)),
            Some(Invocation::Read)
        );
        assert_eq!(schedule.next_op(Process::from(0)), None);
        assert_eq!(schedule.next_op(Process::from(1)), None);
        assert_eq!(schedule.next_op(Process::from(5)), None);
    }
}

//! Drives a set workload over scripted connections and checks the recorded
//! history. Run with `RUST_LOG=debug` to watch the engine's decisions.

use {
    jolt::{
        drive,
        testing::{ScriptStep, ScriptedConn, ScriptedConnector},
        Counter, Invocation, Schedule, SessionManager, SetWorkload,
    },
    jolt_core::{DbError, Target},
    std::{sync::Arc, time::Duration},
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt::init();

    // One client adds three elements; the second add hits a transient abort
    // and is retried, the third is rejected outright. A final read returns
    // what actually committed.
    let conn = ScriptedConn::default()
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Fail(DbError::abort("restart transaction")))
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Fail(DbError::integrity("duplicate key value")))
        .step(ScriptStep::Rows(vec![vec![10], vec![11]]));
    let connector = Arc::new(ScriptedConnector::new_with(vec![conn]));
    let manager = Arc::new(SessionManager::new(connector).not_ready_wait(Duration::ZERO));
    let workload = SetWorkload::new(
        0usize,
        Target::new("n1", "jolt"),
        manager,
        Arc::new(Counter::new(0)),
    );
    let schedule = Schedule::new().thread([
        Invocation::Add { value: 10 },
        Invocation::Add { value: 11 },
        Invocation::Add { value: 12 },
        Invocation::Read,
    ]);

    let history = drive(vec![Box::new(workload)], schedule)
        .await
        .expect("scripted run cannot fail setup");
    for op in history.ops() {
        println!("{op:?}");
    }
    let report = jolt_checker::set::check(&history);
    println!("{report:#?}");
}

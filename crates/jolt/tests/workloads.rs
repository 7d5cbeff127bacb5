//! End-to-end runs over scripted connections: drive a workload schedule,
//! record the history, and feed it to the offline checkers.

use {
    jolt::{
        drive,
        testing::{ScriptStep, ScriptedConn, ScriptedConnector},
        Counter, DirtyReadsWorkload, Invocation, Schedule, SessionManager, SetWorkload,
    },
    jolt_core::{DbError, Target},
    std::{sync::Arc, time::Duration},
};

fn manager(conns: Vec<ScriptedConn>) -> Arc<SessionManager> {
    let connector = Arc::new(ScriptedConnector::new_with(conns));
    Arc::new(SessionManager::new(connector).not_ready_wait(Duration::ZERO))
}

#[tokio::test]
async fn set_run_checks_out_when_every_add_survives() {
    let conn = ScriptedConn::default()
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Rows(vec![vec![1], vec![2], vec![3]]));
    let workload = SetWorkload::new(
        0usize,
        Target::new("n1", "jolt"),
        manager(vec![conn]),
        Arc::new(Counter::new(0)),
    );
    let schedule = Schedule::new().thread([
        Invocation::Add { value: 1 },
        Invocation::Add { value: 2 },
        Invocation::Add { value: 3 },
        Invocation::Read,
    ]);

    let history = drive(vec![Box::new(workload)], schedule).await.unwrap();
    let report = jolt_checker::set::check(&history);
    assert!(report.valid, "unexpected violations: {report:?}");
    assert_eq!(report.acknowledged_count, 3);
    assert!(report.lost.is_empty());
    assert!(report.recovered.is_empty());
}

#[tokio::test]
async fn set_run_flags_a_lost_acknowledged_add() {
    let conn = ScriptedConn::default()
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Rows(vec![vec![1]]));
    let workload = SetWorkload::new(
        0usize,
        Target::new("n1", "jolt"),
        manager(vec![conn]),
        Arc::new(Counter::new(0)),
    );
    let schedule = Schedule::new().thread([
        Invocation::Add { value: 1 },
        Invocation::Add { value: 2 },
        Invocation::Read,
    ]);

    let history = drive(vec![Box::new(workload)], schedule).await.unwrap();
    let report = jolt_checker::set::check(&history);
    assert!(!report.valid);
    assert_eq!(report.lost, vec![2]);
}

#[tokio::test]
async fn dirty_read_of_a_rejected_write_invalidates_the_run() {
    // One owned row. The overwrite is rejected outright (no durable state),
    // yet a later read observes its value.
    let conn = ScriptedConn::default()
        .step(ScriptStep::Affected(1))
        .step(ScriptStep::Rows(vec![vec![-1]]))
        .step(ScriptStep::Fail(DbError::integrity("row would violate a constraint")))
        .step(ScriptStep::Rows(vec![vec![7]]));
    let workload =
        DirtyReadsWorkload::new(0usize, Target::new("n1", "jolt"), manager(vec![conn]), 1, 42);
    let schedule = Schedule::new().thread([
        Invocation::WriteAll { value: 7 },
        Invocation::Read,
    ]);

    let history = drive(vec![Box::new(workload)], schedule).await.unwrap();
    let report = jolt_checker::dirty_reads::check(&history);
    assert!(!report.valid);
    assert_eq!(report.filthy_reads, vec![vec![7]]);
}

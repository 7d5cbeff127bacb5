//! Checks a recorded run history and exits nonzero on violations.
//!
//! The history is produced by an orchestration layer driving the `jolt`
//! workloads while faults are injected; this front end replays the offline
//! analysis so runs can be re-checked, diffed, and archived independently of
//! the cluster that produced them.

use {
    anyhow::Context,
    clap::{Parser, ValueEnum},
    jolt::HarnessConfig,
    jolt_core::History,
    std::{fs, path::PathBuf, process::ExitCode},
    tracing::{info, warn},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WorkloadKind {
    Set,
    Register,
    DirtyReads,
}

#[derive(Debug, Parser)]
#[command(name = "jolt", about = "Check a recorded jolt run history.")]
struct Args {
    /// Database name the history was recorded against.
    #[arg(default_value = "jolt")]
    db: String,

    /// Path to the recorded history (JSON).
    #[arg(long)]
    history: PathBuf,

    /// Which checker to apply.
    #[arg(long, value_enum)]
    workload: WorkloadKind,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    match run(Args::parse()) {
        Ok(valid) => {
            if valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    // Cluster topology is optional here: checking is offline, but logging
    // the targets ties the report back to the run that produced it.
    if let Ok(cfg) = HarnessConfig::from_env() {
        let cfg = cfg.db(args.db.clone());
        info!(targets = ?cfg.targets(), "run topology");
    } else {
        warn!("no cluster topology in the environment, checking offline");
    }

    let raw = fs::read_to_string(&args.history)
        .with_context(|| format!("reading history from {}", args.history.display()))?;
    let history: History = serde_json::from_str(&raw)
        .with_context(|| format!("parsing history from {}", args.history.display()))?;
    info!(ops = history.len(), "history loaded");

    let (valid, report) = match args.workload {
        WorkloadKind::Set => {
            let report = jolt_checker::set::check(&history);
            (report.valid, serde_json::to_string_pretty(&report)?)
        }
        WorkloadKind::Register => {
            let report = jolt_checker::register::check(&history);
            (report.valid, serde_json::to_string_pretty(&report)?)
        }
        WorkloadKind::DirtyReads => {
            let report = jolt_checker::dirty_reads::check(&history);
            (report.valid, serde_json::to_string_pretty(&report)?)
        }
    };
    println!("{report}");
    if !valid {
        warn!("history is invalid");
    }
    Ok(valid)
}

//! Deploy sequencer
//!
//! Runs the fixed deploy sequence against one session: git sync, database
//! startup, compose up, a bounded readiness wait on the app container, then
//! the two prisma migration commands. The readiness wait replaces the old
//! scripts' blind `sleep 15`.
//!
//! Failure policy: `Continue` runs every step regardless of prior failures
//! (the legacy behavior, each failure recorded); `Abort` stops at the first
//! failed step and marks the rest skipped. The session is closed on every
//! path.

use tracing::info;

use crate::config::{EnvConfig, FailurePolicy};
use crate::domain::deploy::{migration_commands, RemoteCommand, RunReport, StepReport, StepStatus};
use crate::infra::ssh::CommandExecutor;
use crate::services::steps::{close_executor, print_summary, run_step, skip_step, wait_for_running};

/// The commands that run before the readiness wait, in order
fn setup_commands(config: &EnvConfig) -> Vec<RemoteCommand> {
    vec![
        RemoteCommand::git_sync(&config.target_dir, &config.branch),
        RemoteCommand::db_startup(&config.target_dir),
        RemoteCommand::compose_up(&config.target_dir),
    ]
}

/// Run the full deploy sequence
pub async fn run_deploy<E: CommandExecutor>(executor: &mut E, config: &EnvConfig) -> RunReport {
    let mut report = RunReport::new();
    let mut aborted_after: Option<String> = None;

    println!("=== Deploying to {} ===", config.host);
    println!("Target directory: {}", config.target_dir);
    println!("Branch: {}", config.branch);

    for command in setup_commands(config) {
        run_or_skip(executor, config, &command, &mut aborted_after, &mut report).await;
    }

    // Readiness gate on the app container before touching the database
    if let Some(ref failed) = aborted_after {
        let mut step = StepReport::new("wait_ready", "Wait Ready");
        step.skip(Some(format!("aborted after {} failed", failed)));
        report.push(step);
    } else {
        let step = wait_for_running(executor, config).await;
        if step.status == StepStatus::Failed && config.on_failure == FailurePolicy::Abort {
            aborted_after = Some(step.name.clone());
        }
        report.push(step);
    }

    for command in migration_commands(&config.container) {
        run_or_skip(executor, config, &command, &mut aborted_after, &mut report).await;
    }

    println!("Deployment sequence finished.");
    print_summary(&report);
    close_executor(executor).await;

    info!(
        host = %config.host,
        succeeded = report.succeeded(),
        "Deploy run finished"
    );
    report
}

async fn run_or_skip<E: CommandExecutor>(
    executor: &mut E,
    config: &EnvConfig,
    command: &RemoteCommand,
    aborted_after: &mut Option<String>,
    report: &mut RunReport,
) {
    if let Some(failed) = aborted_after {
        report.push(skip_step(command, failed));
        return;
    }
    let step = run_step(executor, command).await;
    if step.status == StepStatus::Failed && config.on_failure == FailurePolicy::Abort {
        *aborted_after = Some(step.name.clone());
    }
    report.push(step);
}

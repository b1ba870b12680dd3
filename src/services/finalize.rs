//! Finalization checker
//!
//! Verifies the deployed app container actually comes up, then re-applies the
//! database migration steps. Flow: inspect (status + log tail, diagnostic
//! output for the operator), poll the running-state flag with a bounded retry
//! loop, then migrate.
//!
//! Under the default `Continue` policy the migration steps run even when the
//! poll is exhausted - the legacy fail-open behavior, now recorded as a failed
//! step so the exit code reflects it. `Abort` skips the migrations instead.

use tracing::info;

use crate::config::{EnvConfig, FailurePolicy};
use crate::domain::deploy::{migration_commands, RemoteCommand, RunReport, StepStatus};
use crate::infra::ssh::CommandExecutor;
use crate::services::steps::{close_executor, print_summary, run_step, skip_step, wait_for_running};

/// Run the finalization flow
pub async fn run_finalize<E: CommandExecutor>(executor: &mut E, config: &EnvConfig) -> RunReport {
    let mut report = RunReport::new();

    println!("=== Finalizing deploy on {} ===", config.host);

    // Inspecting: one-shot diagnostics, printed for the operator. Their
    // output is not evaluated and never gates the rest of the flow.
    println!("Checking container status...");
    report.push(run_step(executor, &RemoteCommand::container_status(&config.container)).await);

    println!("Checking logs for {}...", config.container);
    report.push(run_step(executor, &RemoteCommand::container_logs(&config.container)).await);

    // Polling
    let wait = wait_for_running(executor, config).await;
    let exhausted = wait.status == StepStatus::Failed;
    report.push(wait);

    // Migrating
    let mut aborted_after = if exhausted && config.on_failure == FailurePolicy::Abort {
        Some("wait_ready".to_string())
    } else {
        None
    };
    for command in migration_commands(&config.container) {
        if let Some(ref failed) = aborted_after {
            report.push(skip_step(&command, failed));
            continue;
        }
        let step = run_step(executor, &command).await;
        if step.status == StepStatus::Failed && config.on_failure == FailurePolicy::Abort {
            aborted_after = Some(step.name.clone());
        }
        report.push(step);
    }

    print_summary(&report);
    close_executor(executor).await;

    info!(
        host = %config.host,
        succeeded = report.succeeded(),
        "Finalize run finished"
    );
    report
}

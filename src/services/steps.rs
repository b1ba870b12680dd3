//! Step execution shared by both flows

use tracing::warn;

use crate::config::EnvConfig;
use crate::domain::deploy::{RemoteCommand, RunReport, StepReport, StepStatus};
use crate::infra::ssh::CommandExecutor;
use crate::services::poll::{poll_until, PollOutcome, RunningProbe};

/// Run one command as a tracked step
pub async fn run_step<E: CommandExecutor>(executor: &mut E, command: &RemoteCommand) -> StepReport {
    let mut step = StepReport::new(command.name, command.display_name);
    step.start();
    println!(">>> {}", command.shell);

    match executor.run(command).await {
        Ok(result) => {
            step.exit_status = Some(result.exit_status);
            if result.success() {
                step.finish(true, None);
            } else {
                step.finish(false, Some(format!("exit status {}", result.exit_status)));
                warn!(
                    step = command.name,
                    exit_status = result.exit_status,
                    "Command failed"
                );
            }
        }
        Err(e) => {
            step.finish(false, Some(e.to_string()));
            warn!(step = command.name, error = %e, "Command could not be executed");
        }
    }
    step
}

/// Record a step that never ran because an earlier failure aborted the run
pub fn skip_step(command: &RemoteCommand, failed_step: &str) -> StepReport {
    let mut step = StepReport::new(command.name, command.display_name);
    step.skip(Some(format!("aborted after {} failed", failed_step)));
    step
}

/// Poll the container running-state probe as a tracked step
pub async fn wait_for_running<E: CommandExecutor>(
    executor: &mut E,
    config: &EnvConfig,
) -> StepReport {
    let mut step = StepReport::new("wait_ready", "Wait Ready");
    step.start();

    let outcome = {
        let mut probe = RunningProbe::new(executor, &config.container);
        poll_until(&mut probe, config.poll_attempts, config.poll_interval).await
    };

    match outcome {
        PollOutcome::Ready { attempts_used } => {
            println!("Container {} is running.", config.container);
            step.finish(
                true,
                Some(format!("running after {} attempt(s)", attempts_used)),
            );
        }
        PollOutcome::Exhausted { attempts } => {
            step.finish(
                false,
                Some(format!("not running after {} attempts", attempts)),
            );
        }
    }
    step
}

/// Release the session; a failed disconnect is logged, never escalated
pub async fn close_executor<E: CommandExecutor>(executor: &mut E) {
    if let Err(e) = executor.close().await {
        warn!(error = %e, "Failed to close session cleanly");
    }
}

/// Print the per-step summary table
pub fn print_summary(report: &RunReport) {
    println!();
    println!("=== Step Summary ===");
    for step in &report.steps {
        let duration = step
            .duration_ms
            .map(|d| format!("{}ms", d))
            .unwrap_or_else(|| "-".to_string());
        let status_icon = match step.status {
            StepStatus::Success => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "⊘",
            StepStatus::Running => "⟳",
            StepStatus::Pending => "○",
        };
        match &step.message {
            Some(msg) => println!("{} {} ({}) - {}", status_icon, step.display_name, duration, msg),
            None => println!("{} {} ({})", status_icon, step.display_name, duration),
        }
    }
}

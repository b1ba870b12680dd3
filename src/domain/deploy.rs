//! Deployment domain models

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::constants;

/// One shell command to run on the remote host
#[derive(Clone, Debug)]
pub struct RemoteCommand {
    /// Step identifier (e.g., "git_sync", "compose_up")
    pub name: &'static str,
    /// Display name (e.g., "Git Sync", "Compose Up")
    pub display_name: &'static str,
    /// Shell string sent over the exec channel
    pub shell: String,
}

impl RemoteCommand {
    pub fn new(name: &'static str, display_name: &'static str, shell: String) -> Self {
        Self {
            name,
            display_name,
            shell,
        }
    }

    /// Fetch and hard-reset the checkout to the remote branch
    pub fn git_sync(target_dir: &str, branch: &str) -> Self {
        Self::new(
            "git_sync",
            "Git Sync",
            format!(
                "cd {dir} && git fetch origin {br} && git reset --hard origin/{br}",
                dir = target_dir,
                br = branch
            ),
        )
    }

    /// Start the database dependency
    pub fn db_startup(target_dir: &str) -> Self {
        Self::new(
            "db_startup",
            "DB Startup",
            format!("cd {} && ./scripts/start-db.sh", target_dir),
        )
    }

    /// Bring up the compose stack, rebuilding in detached mode
    pub fn compose_up(target_dir: &str) -> Self {
        Self::new(
            "compose_up",
            "Compose Up",
            format!(
                "cd {} && docker compose -f docker-compose.yml -f docker-compose.prod.yml up -d --build",
                target_dir
            ),
        )
    }

    /// One-shot container status listing
    pub fn container_status(container: &str) -> Self {
        Self::new(
            "container_status",
            "Container Status",
            format!("docker ps -a --filter name={}", container),
        )
    }

    /// Tail of the container log
    pub fn container_logs(container: &str) -> Self {
        Self::new(
            "container_logs",
            "Container Logs",
            format!(
                "docker logs {} --tail {}",
                container,
                constants::LOG_TAIL_LINES
            ),
        )
    }

    /// Probe the container's running-state flag
    pub fn running_probe(container: &str) -> Self {
        Self::new(
            "running_probe",
            "Running Probe",
            format!("docker inspect -f '{{{{.State.Running}}}}' {}", container),
        )
    }
}

/// The two database migration commands, shared by the deploy sequencer and
/// the finalization checker so the lists cannot drift apart.
pub fn migration_commands(container: &str) -> Vec<RemoteCommand> {
    vec![
        RemoteCommand::new(
            "prisma_db_push",
            "Prisma DB Push",
            format!(
                "docker exec {} npx prisma db push --accept-data-loss",
                container
            ),
        ),
        RemoteCommand::new(
            "prisma_db_seed",
            "Prisma DB Seed",
            format!("docker exec {} npx prisma db seed", container),
        ),
    ]
}

/// Outcome of one remote command execution
#[derive(Clone, Debug)]
pub struct CommandResult {
    /// Remote exit status
    pub exit_status: u32,
    /// Captured stdout lines, in arrival order
    pub stdout: Vec<String>,
    /// Captured stderr lines, in arrival order
    pub stderr: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// One streamed output line
#[derive(Clone, Debug)]
pub struct LogLine {
    pub stream: &'static str, // stdout | stderr
    pub content: String,
}

impl LogLine {
    pub fn stdout(content: impl Into<String>) -> Self {
        Self {
            stream: "stdout",
            content: content.into(),
        }
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self {
            stream: "stderr",
            content: content.into(),
        }
    }

    /// Operator-facing prefix, matching the original scripts' output
    pub fn prefix(&self) -> &'static str {
        if self.stream == "stderr" {
            "ERR"
        } else {
            "OUT"
        }
    }
}

/// Step status
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// Per-step execution record
#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub name: String,
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: StepStatus,
    pub exit_status: Option<u32>,
    pub message: Option<String>,
}

impl StepReport {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StepStatus::Pending,
            exit_status: None,
            message: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StepStatus::Running;
    }

    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StepStatus::Skipped;
        self.message = reason;
    }
}

/// Aggregated record of one run, in step order
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepReport) {
        self.steps.push(step);
    }

    /// True when no step failed (skipped steps do not count as failures)
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Failed)
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> u8 {
        if self.succeeded() {
            constants::EXIT_OK
        } else {
            constants::EXIT_STEP_FAILED
        }
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
    }
}

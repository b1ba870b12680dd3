//! End-to-end flow tests with a scripted command executor

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use vist_deploy::config::{EnvConfig, FailurePolicy, HostKeyPolicy};
use vist_deploy::domain::deploy::{CommandResult, RemoteCommand, StepStatus};
use vist_deploy::error::{DeployError, Result};
use vist_deploy::infra::ssh::CommandExecutor;
use vist_deploy::services::{deploy, finalize};

/// Executor double that replays canned results in order
struct ScriptedExecutor {
    responses: VecDeque<Result<CommandResult>>,
    executed: Vec<String>,
    close_count: u32,
}

impl ScriptedExecutor {
    fn new(responses: Vec<Result<CommandResult>>) -> Self {
        Self {
            responses: responses.into(),
            executed: Vec::new(),
            close_count: 0,
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&mut self, command: &RemoteCommand) -> Result<CommandResult> {
        self.executed.push(command.name.to_string());
        self.responses.pop_front().unwrap_or_else(|| Ok(ok_result()))
    }

    async fn close(&mut self) -> Result<()> {
        self.close_count += 1;
        Ok(())
    }
}

fn ok_result() -> CommandResult {
    CommandResult {
        exit_status: 0,
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

fn exit(status: u32) -> Result<CommandResult> {
    Ok(CommandResult {
        exit_status: status,
        stdout: Vec::new(),
        stderr: Vec::new(),
    })
}

fn probe(running: bool) -> Result<CommandResult> {
    Ok(CommandResult {
        exit_status: 0,
        stdout: vec![if running { "true" } else { "false" }.to_string()],
        stderr: Vec::new(),
    })
}

fn test_config(on_failure: FailurePolicy, poll_attempts: u32) -> EnvConfig {
    EnvConfig {
        host: "deploy.example.com".to_string(),
        port: 22,
        user: "deploy".to_string(),
        password: "secret".to_string(),
        target_dir: "/opt/vist".to_string(),
        container: "vistos-server".to_string(),
        branch: "main".to_string(),
        host_key: HostKeyPolicy::KnownHosts,
        on_failure,
        poll_attempts,
        poll_interval: Duration::ZERO,
    }
}

#[tokio::test]
async fn deploy_continue_runs_every_step_and_reports_failure() {
    // git sync ok, db startup ok, compose up fails; container already running
    let mut executor = ScriptedExecutor::new(vec![
        exit(0),
        exit(0),
        exit(1),
        probe(true),
        exit(0),
        exit(0),
    ]);
    let config = test_config(FailurePolicy::Continue, 5);

    let report = deploy::run_deploy(&mut executor, &config).await;

    assert_eq!(
        executor.executed,
        vec![
            "git_sync",
            "db_startup",
            "compose_up",
            "running_probe",
            "prisma_db_push",
            "prisma_db_seed",
        ]
    );
    assert_eq!(executor.close_count, 1);

    let compose = report.steps.iter().find(|s| s.name == "compose_up").unwrap();
    assert_eq!(compose.status, StepStatus::Failed);
    assert_eq!(compose.exit_status, Some(1));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn deploy_abort_skips_remaining_steps() {
    // db startup fails under the abort policy
    let mut executor = ScriptedExecutor::new(vec![exit(0), exit(1)]);
    let config = test_config(FailurePolicy::Abort, 5);

    let report = deploy::run_deploy(&mut executor, &config).await;

    assert_eq!(executor.executed, vec!["git_sync", "db_startup"]);
    assert_eq!(executor.close_count, 1);

    let names: Vec<_> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "git_sync",
            "db_startup",
            "compose_up",
            "wait_ready",
            "prisma_db_push",
            "prisma_db_seed",
        ]
    );
    for step in &report.steps[2..] {
        assert_eq!(step.status, StepStatus::Skipped);
    }
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn deploy_exit_statuses_are_captured_faithfully() {
    let mut executor = ScriptedExecutor::new(vec![
        exit(0),
        exit(0),
        exit(0),
        probe(true),
        exit(0),
        exit(0),
    ]);
    let config = test_config(FailurePolicy::Continue, 5);

    let report = deploy::run_deploy(&mut executor, &config).await;

    assert!(report.succeeded());
    assert_eq!(report.exit_code(), 0);
    for step in report.steps.iter().filter(|s| s.name != "wait_ready") {
        assert_eq!(step.exit_status, Some(0));
    }
}

#[tokio::test]
async fn deploy_closes_session_when_execution_errors() {
    // transport dies on compose up; remaining steps fail fast but still run
    let mut executor = ScriptedExecutor::new(vec![
        exit(0),
        exit(0),
        Err(DeployError::ChannelClosed),
        probe(true),
        exit(0),
        exit(0),
    ]);
    let config = test_config(FailurePolicy::Continue, 5);

    let report = deploy::run_deploy(&mut executor, &config).await;

    assert_eq!(executor.close_count, 1);
    let compose = report.steps.iter().find(|s| s.name == "compose_up").unwrap();
    assert_eq!(compose.status, StepStatus::Failed);
    assert!(compose.message.is_some());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn finalize_polls_until_running_then_migrates() {
    // probe sequence false, false, true with attempt cap 5
    let mut executor = ScriptedExecutor::new(vec![
        exit(0), // container status
        exit(0), // container logs
        probe(false),
        probe(false),
        probe(true),
        exit(0), // prisma db push
        exit(0), // prisma db seed
    ]);
    let config = test_config(FailurePolicy::Continue, 5);

    let report = finalize::run_finalize(&mut executor, &config).await;

    let probes = executor
        .executed
        .iter()
        .filter(|n| n.as_str() == "running_probe")
        .count();
    assert_eq!(probes, 3);
    assert_eq!(
        executor.executed.last().map(String::as_str),
        Some("prisma_db_seed")
    );
    assert_eq!(executor.close_count, 1);
    assert!(report.succeeded());
}

#[tokio::test]
async fn finalize_exhausted_still_migrates_under_continue() {
    // all probes false with attempt cap 3: documented fail-open behavior
    let mut executor = ScriptedExecutor::new(vec![
        exit(0),
        exit(0),
        probe(false),
        probe(false),
        probe(false),
        exit(0),
        exit(0),
    ]);
    let config = test_config(FailurePolicy::Continue, 3);

    let report = finalize::run_finalize(&mut executor, &config).await;

    let probes = executor
        .executed
        .iter()
        .filter(|n| n.as_str() == "running_probe")
        .count();
    assert_eq!(probes, 3);
    assert!(executor.executed.iter().any(|n| n == "prisma_db_push"));
    assert!(executor.executed.iter().any(|n| n == "prisma_db_seed"));

    let wait = report.steps.iter().find(|s| s.name == "wait_ready").unwrap();
    assert_eq!(wait.status, StepStatus::Failed);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn finalize_exhausted_aborts_when_configured() {
    let mut executor = ScriptedExecutor::new(vec![
        exit(0),
        exit(0),
        probe(false),
        probe(false),
        probe(false),
    ]);
    let config = test_config(FailurePolicy::Abort, 3);

    let report = finalize::run_finalize(&mut executor, &config).await;

    assert!(!executor.executed.iter().any(|n| n == "prisma_db_push"));
    assert_eq!(executor.close_count, 1);

    let push = report
        .steps
        .iter()
        .find(|s| s.name == "prisma_db_push")
        .unwrap();
    assert_eq!(push.status, StepStatus::Skipped);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn output_line_order_is_preserved_in_results() {
    let result = CommandResult {
        exit_status: 0,
        stdout: vec!["first".to_string(), "second".to_string(), "third".to_string()],
        stderr: vec!["warn-a".to_string(), "warn-b".to_string()],
    };
    let mut executor = ScriptedExecutor::new(vec![Ok(result)]);
    let cmd = RemoteCommand::git_sync("/opt/vist", "main");

    let got = executor.run(&cmd).await.unwrap();
    assert_eq!(got.stdout, vec!["first", "second", "third"]);
    assert_eq!(got.stderr, vec!["warn-a", "warn-b"]);
}

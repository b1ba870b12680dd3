//! vist-deploy - SSH deployment runner for the vist stack
//!
//! Usage:
//! - Run the deploy sequence: `vist-deploy deploy`
//! - Verify and re-migrate:   `vist-deploy finalize`
//! - JSON step report:        `vist-deploy deploy --json`
//!
//! All target settings come from VIST_DEPLOY_* environment variables; see
//! `config::env`. Exit codes: 0 all steps succeeded, 1 one or more steps
//! failed, 2 configuration or connection failure.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use vist_deploy::config::{constants, EnvConfig};
use vist_deploy::infra::ssh::SshSession;
use vist_deploy::services::{deploy, finalize};

#[derive(Clone, Copy, Debug)]
enum Flow {
    Deploy,
    Finalize,
}

struct CliArgs {
    flow: Flow,
    json: bool,
}

/// Parse command line arguments
fn parse_args() -> Result<CliArgs, u8> {
    let args: Vec<String> = std::env::args().collect();
    let mut flow = None;
    let mut json = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "deploy" => flow = Some(Flow::Deploy),
            "finalize" => flow = Some(Flow::Finalize),
            "--json" => json = true,
            "--version" | "-V" => {
                println!("vist-deploy {}", constants::VERSION);
                return Err(constants::EXIT_OK);
            }
            "--help" | "-h" => {
                print_help();
                return Err(constants::EXIT_OK);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return Err(constants::EXIT_FATAL);
            }
        }
    }

    match flow {
        Some(flow) => Ok(CliArgs { flow, json }),
        None => {
            print_help();
            Err(constants::EXIT_FATAL)
        }
    }
}

fn print_help() {
    println!("vist-deploy - SSH deployment runner for the vist stack");
    println!();
    println!("USAGE:");
    println!("    vist-deploy [OPTIONS] <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    deploy       Run the deploy sequence on the configured host");
    println!("    finalize     Verify the app container and re-run the migrations");
    println!();
    println!("OPTIONS:");
    println!("    --json           Print the step report as JSON when done");
    println!("    -V, --version    Print version information");
    println!("    -h, --help       Print help information");
    println!();
    println!("CONFIGURATION (environment variables):");
    println!("    VIST_DEPLOY_HOST, VIST_DEPLOY_USER, VIST_DEPLOY_PASSWORD   required");
    println!("    VIST_DEPLOY_PORT, VIST_DEPLOY_TARGET_DIR, VIST_DEPLOY_CONTAINER,");
    println!("    VIST_DEPLOY_BRANCH, VIST_DEPLOY_HOST_KEY,");
    println!("    VIST_DEPLOY_ACCEPT_UNKNOWN_HOST_KEY, VIST_DEPLOY_ON_FAILURE,");
    println!("    VIST_DEPLOY_POLL_ATTEMPTS, VIST_DEPLOY_POLL_INTERVAL_SECS  optional");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let code = rt.block_on(run(cli));
    ExitCode::from(code)
}

async fn run(cli: CliArgs) -> u8 {
    let config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return constants::EXIT_FATAL;
        }
    };

    let mut session = match SshSession::connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            return constants::EXIT_FATAL;
        }
    };

    let report = match cli.flow {
        Flow::Deploy => deploy::run_deploy(&mut session, &config).await,
        Flow::Finalize => finalize::run_finalize(&mut session, &config).await,
    };

    for step in report.failed_steps() {
        error!(
            step = %step.name,
            message = step.message.as_deref().unwrap_or("-"),
            "Step failed"
        );
    }

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    }

    report.exit_code()
}

//! Environment variable configuration loading
//!
//! Every remote-target value comes from the environment. The host, user and
//! password have no defaults on purpose: the old scripts shipped them as
//! literals, which is exactly what this tool exists to stop.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// What to do when a deploy step fails
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Run every remaining step regardless (legacy script behavior)
    Continue,
    /// Stop at the first failed step, mark the rest skipped
    Abort,
}

impl FailurePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "continue" => Some(FailurePolicy::Continue),
            "abort" => Some(FailurePolicy::Abort),
            _ => None,
        }
    }
}

/// Server identity verification policy
#[derive(Clone, Debug)]
pub enum HostKeyPolicy {
    /// Verify against ~/.ssh/known_hosts (default)
    KnownHosts,
    /// Require a pinned SHA256 fingerprint
    Fingerprint(String),
    /// Accept any key. Explicit opt-in only; logged as a warning.
    AcceptAny,
}

/// Environment configuration
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// Remote host address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// SSH user
    pub user: String,
    /// SSH password
    pub password: String,
    /// Checkout directory on the remote host
    pub target_dir: String,
    /// Application container name
    pub container: String,
    /// Git branch the deploy resets to
    pub branch: String,
    /// Host key verification policy
    pub host_key: HostKeyPolicy,
    /// Step failure policy
    pub on_failure: FailurePolicy,
    /// Readiness poll attempt cap
    pub poll_attempts: u32,
    /// Delay between readiness polls
    pub poll_interval: Duration,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = require("VIST_DEPLOY_HOST")?;
        let user = require("VIST_DEPLOY_USER")?;
        let password = require("VIST_DEPLOY_PASSWORD")?;

        let port = parse_or("VIST_DEPLOY_PORT", 22)?;

        let target_dir = env::var("VIST_DEPLOY_TARGET_DIR")
            .unwrap_or_else(|_| constants::DEFAULT_TARGET_DIR.to_string());
        let container = env::var("VIST_DEPLOY_CONTAINER")
            .unwrap_or_else(|_| constants::DEFAULT_CONTAINER.to_string());
        let branch =
            env::var("VIST_DEPLOY_BRANCH").unwrap_or_else(|_| constants::DEFAULT_BRANCH.to_string());

        let accept_any = env::var("VIST_DEPLOY_ACCEPT_UNKNOWN_HOST_KEY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let host_key = if accept_any {
            HostKeyPolicy::AcceptAny
        } else if let Ok(fp) = env::var("VIST_DEPLOY_HOST_KEY") {
            HostKeyPolicy::Fingerprint(fp)
        } else {
            HostKeyPolicy::KnownHosts
        };

        let on_failure = match env::var("VIST_DEPLOY_ON_FAILURE") {
            Ok(v) => FailurePolicy::parse(&v).ok_or(ConfigError::Invalid {
                var: "VIST_DEPLOY_ON_FAILURE",
                value: v,
            })?,
            Err(_) => FailurePolicy::Continue,
        };

        let poll_attempts =
            parse_or("VIST_DEPLOY_POLL_ATTEMPTS", constants::DEFAULT_POLL_ATTEMPTS)?;
        let poll_interval_secs = parse_or(
            "VIST_DEPLOY_POLL_INTERVAL_SECS",
            constants::DEFAULT_POLL_INTERVAL_SECS,
        )?;

        Ok(Self {
            host,
            port,
            user,
            password,
            target_dir,
            container,
            branch,
            host_key,
            on_failure,
            poll_attempts,
            poll_interval: Duration::from_secs(poll_interval_secs),
        })
    }
}

/// Load a required environment variable
fn require(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(var)),
    }
}

/// Load an optional variable, parsing it or falling back to a default
fn parse_or<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: v }),
        Err(_) => Ok(default),
    }
}

/// Constants
pub mod constants {
    /// Default checkout directory on the remote host
    pub const DEFAULT_TARGET_DIR: &str = "/opt/vist";

    /// Default application container name
    pub const DEFAULT_CONTAINER: &str = "vistos-server";

    /// Default branch the deploy resets to
    pub const DEFAULT_BRANCH: &str = "main";

    /// Default readiness poll attempt cap
    pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;

    /// Default delay between readiness polls (seconds)
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

    /// Lines of container log shown by the finalizer
    pub const LOG_TAIL_LINES: u32 = 50;

    /// Process exit code: all steps succeeded
    pub const EXIT_OK: u8 = 0;

    /// Process exit code: one or more steps failed
    pub const EXIT_STEP_FAILED: u8 = 1;

    /// Process exit code: configuration or connection failure
    pub const EXIT_FATAL: u8 = 2;

    /// Version number
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

//! Unified error handling
//!
//! Connection-class errors are fatal and abort the run. A remote command that
//! exits non-zero is NOT an error here: it is captured in its `CommandResult`
//! and handled by the failure policy.

use thiserror::Error;

/// Deploy error type
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to connect: {0}")]
    Connect(std::io::Error),

    #[error("Authentication rejected for user '{0}'")]
    Auth(String),

    #[error("Host key verification failed for {0}")]
    HostKeyRejected(String),

    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("Host key check failed: {0}")]
    KnownHosts(#[from] russh_keys::Error),

    #[error("Remote closed the channel without reporting an exit status")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DeployError>;

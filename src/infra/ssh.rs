//! SSH session and remote command execution
//!
//! One authenticated session per run. Commands go over fresh exec channels;
//! output is streamed to the operator line by line as it arrives and captured
//! for the step report. No per-command timeout: a hung remote command blocks
//! the run.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use tracing::{debug, info, warn};

use crate::config::{EnvConfig, HostKeyPolicy};
use crate::domain::deploy::{CommandResult, LogLine, RemoteCommand};
use crate::error::{DeployError, Result};

/// Executes remote commands and owns the underlying connection.
///
/// The seam between the flows and the transport; tests substitute a scripted
/// implementation.
#[async_trait]
pub trait CommandExecutor: Send {
    /// Run one command, streaming and capturing its output
    async fn run(&mut self, command: &RemoteCommand) -> Result<CommandResult>;

    /// Release the connection. Called exactly once per run, on every path.
    async fn close(&mut self) -> Result<()>;
}

/// Client-side connection handler carrying the host key policy
struct ClientHandler {
    policy: HostKeyPolicy,
    host: String,
    port: u16,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = DeployError;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    host = %self.host,
                    "Accepting server host key without verification (VIST_DEPLOY_ACCEPT_UNKNOWN_HOST_KEY is set)"
                );
                Ok(true)
            }
            HostKeyPolicy::Fingerprint(expected) => {
                let actual = server_public_key.fingerprint();
                let expected = expected.strip_prefix("SHA256:").unwrap_or(expected);
                if actual == expected {
                    debug!(fingerprint = %actual, "Pinned host key fingerprint matched");
                    Ok(true)
                } else {
                    warn!(
                        expected = %expected,
                        actual = %actual,
                        "Pinned host key fingerprint mismatch"
                    );
                    Ok(false)
                }
            }
            HostKeyPolicy::KnownHosts => {
                let known = russh_keys::check_known_hosts(&self.host, self.port, server_public_key)?;
                if !known {
                    warn!(host = %self.host, "Server host key not present in known_hosts");
                }
                Ok(known)
            }
        }
    }
}

/// An authenticated SSH session against the deploy target
pub struct SshSession {
    handle: client::Handle<ClientHandler>,
    host: String,
}

impl SshSession {
    /// Connect and authenticate against the configured target
    pub async fn connect(config: &EnvConfig) -> Result<Self> {
        info!(host = %config.host, port = config.port, user = %config.user, "Connecting");

        let ssh_config = Arc::new(client::Config::default());
        let handler = ClientHandler {
            policy: config.host_key.clone(),
            host: config.host.clone(),
            port: config.port,
        };

        let mut handle =
            client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                .await
                .map_err(|e| classify_connect_error(e, &config.host))?;

        let authenticated = handle
            .authenticate_password(config.user.as_str(), config.password.as_str())
            .await?;
        if !authenticated {
            return Err(DeployError::Auth(config.user.clone()));
        }

        info!(host = %config.host, "Connected successfully");
        Ok(Self {
            handle,
            host: config.host.clone(),
        })
    }

    async fn exec(&mut self, command: &str) -> Result<CommandResult> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = LineBuffer::new();
        let mut stderr = LineBuffer::new();
        let mut exit_status: Option<u32> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    for line in stdout.push(data) {
                        emit(&LogLine::stdout(line));
                    }
                }
                ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                    for line in stderr.push(data) {
                        emit(&LogLine::stderr(line));
                    }
                }
                ChannelMsg::ExitStatus { exit_status: code } => {
                    exit_status = Some(code);
                }
                _ => {}
            }
        }

        if let Some(line) = stdout.flush() {
            emit(&LogLine::stdout(line));
        }
        if let Some(line) = stderr.flush() {
            emit(&LogLine::stderr(line));
        }

        let exit_status = exit_status.ok_or(DeployError::ChannelClosed)?;
        Ok(CommandResult {
            exit_status,
            stdout: stdout.into_lines(),
            stderr: stderr.into_lines(),
        })
    }
}

#[async_trait]
impl CommandExecutor for SshSession {
    async fn run(&mut self, command: &RemoteCommand) -> Result<CommandResult> {
        debug!(step = command.name, "Executing remote command");
        self.exec(&command.shell).await
    }

    async fn close(&mut self) -> Result<()> {
        info!(host = %self.host, "Closing session");
        self.handle
            .disconnect(Disconnect::ByApplication, "run finished", "en")
            .await?;
        Ok(())
    }
}

/// Print one streamed line for the operator
fn emit(line: &LogLine) {
    println!("{}: {}", line.prefix(), line.content);
}

fn classify_connect_error(err: DeployError, host: &str) -> DeployError {
    match err {
        DeployError::Ssh(russh::Error::IO(e)) => DeployError::Connect(e),
        DeployError::Ssh(russh::Error::UnknownKey) => DeployError::HostKeyRejected(host.to_string()),
        other => other,
    }
}

/// Splits raw channel data into complete lines, keeping partial trailing
/// output buffered until more data (or the flush at channel close) arrives.
struct LineBuffer {
    partial: Vec<u8>,
    lines: Vec<String>,
}

impl LineBuffer {
    fn new() -> Self {
        Self {
            partial: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Feed a chunk; returns the lines completed by it, in order
    fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut completed = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.partial);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                let line = String::from_utf8_lossy(&line).into_owned();
                self.lines.push(line.clone());
                completed.push(line);
            } else {
                self.partial.push(byte);
            }
        }
        completed
    }

    /// Complete any unterminated trailing output
    fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&std::mem::take(&mut self.partial)).into_owned();
        self.lines.push(line.clone());
        Some(line)
    }

    fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"hello\nwor"), vec!["hello".to_string()]);
        assert_eq!(buf.push(b"ld\n"), vec!["world".to_string()]);
        assert_eq!(buf.flush(), None);
        assert_eq!(buf.into_lines(), vec!["hello", "world"]);
    }

    #[test]
    fn test_line_buffer_strips_carriage_return() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"one\r\ntwo\r\n"), vec!["one", "two"]);
    }

    #[test]
    fn test_line_buffer_flushes_partial_tail() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"no newline").is_empty());
        assert_eq!(buf.flush(), Some("no newline".to_string()));
        assert_eq!(buf.into_lines(), vec!["no newline"]);
    }

    #[test]
    fn test_line_buffer_preserves_order() {
        let mut buf = LineBuffer::new();
        buf.push(b"1\n2\n3\n");
        assert_eq!(buf.into_lines(), vec!["1", "2", "3"]);
    }
}

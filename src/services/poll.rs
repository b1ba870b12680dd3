//! Bounded poll-until-ready loop
//!
//! At most `max_attempts` probes, stopping on the first success, with a fixed
//! delay between failed attempts. No delay follows the final attempt (the old
//! operator scripts slept after every failed probe, including the last, so
//! this loop's worst case is one interval shorter). A probe error counts as
//! "not ready" so a transient `docker inspect` failure does not kill the loop.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::deploy::RemoteCommand;
use crate::error::Result;
use crate::infra::ssh::CommandExecutor;

/// A readiness condition checked on each poll attempt
#[async_trait]
pub trait Probe: Send {
    async fn check(&mut self) -> Result<bool>;
}

/// Poll loop outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Probe reported ready on attempt `attempts_used`
    Ready { attempts_used: u32 },
    /// All attempts reported not ready
    Exhausted { attempts: u32 },
}

/// Run the probe until it reports ready or attempts run out
pub async fn poll_until<P>(probe: &mut P, max_attempts: u32, interval: Duration) -> PollOutcome
where
    P: Probe + ?Sized,
{
    for attempt in 1..=max_attempts {
        let ready = match probe.check().await {
            Ok(ready) => ready,
            Err(e) => {
                warn!(attempt, error = %e, "Probe failed, treating as not ready");
                false
            }
        };
        if ready {
            return PollOutcome::Ready {
                attempts_used: attempt,
            };
        }
        info!("Waiting for readiness... ({}/{})", attempt, max_attempts);
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    PollOutcome::Exhausted {
        attempts: max_attempts,
    }
}

/// Probe that asks the remote Docker daemon whether a container is running
pub struct RunningProbe<'a, E: CommandExecutor> {
    executor: &'a mut E,
    command: RemoteCommand,
}

impl<'a, E: CommandExecutor> RunningProbe<'a, E> {
    pub fn new(executor: &'a mut E, container: &str) -> Self {
        Self {
            executor,
            command: RemoteCommand::running_probe(container),
        }
    }
}

#[async_trait]
impl<'a, E: CommandExecutor> Probe for RunningProbe<'a, E> {
    async fn check(&mut self) -> Result<bool> {
        let result = self.executor.run(&self.command).await?;
        // docker inspect prints "true" or "false" on one line
        Ok(result
            .stdout
            .first()
            .map(|line| line.trim() == "true")
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use std::collections::VecDeque;

    struct ScriptedProbe {
        responses: VecDeque<Result<bool>>,
        checks: u32,
    }

    impl ScriptedProbe {
        fn new(responses: Vec<Result<bool>>) -> Self {
            Self {
                responses: responses.into(),
                checks: 0,
            }
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn check(&mut self) -> Result<bool> {
            self.checks += 1;
            self.responses.pop_front().unwrap_or(Ok(false))
        }
    }

    #[tokio::test]
    async fn test_poll_stops_on_first_ready() {
        let mut probe = ScriptedProbe::new(vec![Ok(false), Ok(false), Ok(true)]);
        let outcome = poll_until(&mut probe, 5, Duration::ZERO).await;
        assert_eq!(outcome, PollOutcome::Ready { attempts_used: 3 });
        assert_eq!(probe.checks, 3);
    }

    #[tokio::test]
    async fn test_poll_exhausts_at_cap() {
        let mut probe = ScriptedProbe::new((0..10).map(|_| Ok(false)).collect());
        let outcome = poll_until(&mut probe, 3, Duration::ZERO).await;
        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 3 });
        assert_eq!(probe.checks, 3);
    }

    #[tokio::test]
    async fn test_poll_ready_on_first_attempt() {
        let mut probe = ScriptedProbe::new(vec![Ok(true)]);
        let outcome = poll_until(&mut probe, 10, Duration::ZERO).await;
        assert_eq!(outcome, PollOutcome::Ready { attempts_used: 1 });
        assert_eq!(probe.checks, 1);
    }

    #[tokio::test]
    async fn test_probe_error_counts_as_not_ready() {
        let mut probe = ScriptedProbe::new(vec![Err(DeployError::ChannelClosed), Ok(true)]);
        let outcome = poll_until(&mut probe, 5, Duration::ZERO).await;
        assert_eq!(outcome, PollOutcome::Ready { attempts_used: 2 });
    }
}

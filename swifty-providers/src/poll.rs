//! Waiting for an instance to be assigned a routable address.

use crate::{CloudProvider, ProviderError};
use std::time::Duration;
use swifty_common::InstanceAddress;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(600);

/// How often, and for how long, to ask the provider for an instance address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` disables the attempt ceiling.
    pub max_attempts: Option<u32>,
    /// `None` disables the wall-clock ceiling.
    pub max_elapsed: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            max_elapsed: Some(DEFAULT_MAX_ELAPSED),
        }
    }
}

impl PollPolicy {
    /// Poll forever. Only a cancellation token can stop the wait.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            max_elapsed: None,
        }
    }
}

/// Progress of a single wait against its [`PollPolicy`].
#[derive(Debug, Clone)]
pub struct PollBudget {
    policy: PollPolicy,
    started: Instant,
    attempts: u32,
}

impl PollBudget {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            attempts: 0,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `None` when the policy has no attempt ceiling.
    pub fn remaining_attempts(&self) -> Option<u32> {
        self.policy
            .max_attempts
            .map(|max| max.saturating_sub(self.attempts))
    }

    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Time to sleep before the next lookup: the policy interval, cut short so the wait
    /// never runs past `max_elapsed`.
    pub fn next_delay(&self) -> Duration {
        match self.policy.max_elapsed {
            Some(max) => self.policy.interval.min(max.saturating_sub(self.elapsed())),
            None => self.policy.interval,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        let attempts_spent = self.remaining_attempts() == Some(0);
        let time_spent = self
            .policy
            .max_elapsed
            .is_some_and(|max| self.elapsed() >= max);
        attempts_spent || time_spent
    }
}

/// Query `provider` until `instance_id` reports a non-placeholder address.
///
/// Any lookup error ends the wait immediately. Between lookups the task sleeps for the
/// policy interval, or less when the wall-clock ceiling is closer than that.
pub async fn wait_for_address<P>(
    provider: &P,
    instance_id: &str,
    budget: &mut PollBudget,
    cancel: &CancellationToken,
) -> Result<InstanceAddress, ProviderError>
where
    P: CloudProvider + ?Sized,
{
    let name = provider.provider_name();
    loop {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled {
                instance_id: instance_id.to_string(),
            });
        }
        if budget.is_exhausted() {
            return Err(ProviderError::PollExhausted {
                instance_id: instance_id.to_string(),
                attempts: budget.attempts(),
                elapsed: budget.elapsed(),
            });
        }

        budget.record_attempt();
        let address = provider.lookup_instance_ip(instance_id).await?;
        if !address.is_placeholder() {
            info!(
                "✅ [{} API] Instance IP Ready: instance_id={} ip={} attempts={}",
                name,
                instance_id,
                address,
                budget.attempts()
            );
            return Ok(address);
        }

        if budget.is_exhausted() {
            continue;
        }

        info!(
            "⏳ [{} API] Waiting for IP to be ready: instance_id={} attempt={} remaining={:?} elapsed={:?}",
            name,
            instance_id,
            budget.attempts(),
            budget.remaining_attempts(),
            budget.elapsed()
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[{} API] Address wait for {} cancelled during backoff", name, instance_id);
            }
            _ = sleep(budget.next_delay()) => {}
        }
    }
}

use async_trait::async_trait;
use swifty_common::InstanceAddress;
use tokio_util::sync::CancellationToken;

mod error;
pub mod poll;
pub mod response;

pub use error::ProviderError;
pub use poll::{PollBudget, PollPolicy};

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Short name used in log lines, e.g. `Linode`.
    fn provider_name(&self) -> &'static str;

    /// Submit one creation request for a server labelled after `server_id`.
    /// Returns the provider's response body unchanged.
    async fn create_instance(&self, server_id: &str) -> Result<String, ProviderError>;

    /// One status query. The placeholder address is returned as-is so the caller can
    /// decide whether to keep waiting.
    async fn lookup_instance_ip(&self, instance_id: &str) -> Result<InstanceAddress, ProviderError>;

    fn poll_policy(&self) -> PollPolicy;

    /// Wait until the instance reports a routable address.
    /// Default implementation polls `lookup_instance_ip` according to `poll_policy`.
    async fn get_instance_ip(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<InstanceAddress, ProviderError> {
        let mut budget = PollBudget::new(self.poll_policy());
        poll::wait_for_address(self, instance_id, &mut budget, cancel).await
    }
}

/// Reject ids that would change the shape of the per-instance URL.
pub fn validate_instance_id(instance_id: &str) -> Result<&str, ProviderError> {
    let id = instance_id.trim();
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(ProviderError::InvalidInstanceId(instance_id.to_string()));
    }
    Ok(id)
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "linode")]
pub mod linode;

use anyhow::{Context, Result};
use swifty_common::InstanceAddress;
use swifty_providers::response::instance_id_from_create_response;
use swifty_providers::CloudProvider;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug)]
pub struct LaunchOutcome {
    pub instance_id: String,
    /// Raw body of the creation response.
    pub create_response: String,
    /// `None` when the caller chose not to wait for the address.
    pub address: Option<InstanceAddress>,
}

/// Provision one server, then wait for its address unless `wait_for_address` is false.
pub async fn launch_server(
    provider: &dyn CloudProvider,
    server_id: &str,
    wait_for_address: bool,
    cancel: &CancellationToken,
) -> Result<LaunchOutcome> {
    let create_response = provider
        .create_instance(server_id)
        .await
        .context("instance creation failed")?;
    let instance_id = instance_id_from_create_response(&create_response)?;
    info!(
        "🚀 [{}] Instance {} accepted for server {}",
        provider.provider_name(),
        instance_id,
        server_id
    );

    if !wait_for_address {
        return Ok(LaunchOutcome {
            instance_id,
            create_response,
            address: None,
        });
    }

    let address = provider
        .get_instance_ip(&instance_id, cancel)
        .await
        .with_context(|| format!("instance {} was created but its address is unknown", instance_id))?;

    Ok(LaunchOutcome {
        instance_id,
        create_response,
        address: Some(address),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use swifty_common::instance_type::parse_instance_type_patterns;
    use swifty_common::{InstanceTemplate, DEFAULT_LABEL_PREFIX};
    use swifty_providers::mock::MockProvider;
    use swifty_providers::{PollPolicy, ProviderError};

    fn mock() -> MockProvider {
        MockProvider::new(
            InstanceTemplate {
                region: "us-ord".into(),
                instance_type: "g6-dedicated-2".into(),
                image: "linode/ubuntu22.04".into(),
                stackscript_id: 1,
                root_pass: "pw".into(),
                backups_enabled: false,
                label_prefix: DEFAULT_LABEL_PREFIX.into(),
                dedicated_type_patterns: parse_instance_type_patterns(None),
            },
            PollPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn provisions_then_resolves() {
        let p = mock().with_pending_lookups(2);
        let outcome = launch_server(&p, "1", true, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(p.label_of(&outcome.instance_id).as_deref(), Some("TF2-Server-1"));
        assert!(outcome.address.is_some_and(|a| !a.is_placeholder()));
        assert_eq!(p.create_calls(), 1);
        assert_eq!(p.lookup_calls(), 3);
    }

    #[tokio::test]
    async fn no_wait_stops_after_creation() {
        let p = mock();
        let outcome = launch_server(&p, "1", false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.address.is_none());
        assert!(outcome.create_response.contains("\"status\":\"provisioning\""));
        assert_eq!(p.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn creation_failure_skips_address_resolution() {
        let p = mock().with_create_failure(400, r#"{"message":"X"}"#);
        let err = launch_server(&p, "1", true, &CancellationToken::new())
            .await
            .unwrap_err();

        let cause = err.downcast_ref::<ProviderError>().unwrap();
        assert_eq!(cause.http_status(), Some(400));
        assert!(format!("{:#}", err).contains("API Message: X"));
        assert_eq!(p.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_wait_reports_the_instance() {
        let p = mock();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = launch_server(&p, "1", true, &cancel).await.unwrap_err();

        assert!(err.to_string().contains("was created but its address is unknown"));
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Cancelled { .. })
        ));
    }
}

use crate::poll::PollPolicy;
use crate::response::extract_error_message;
use crate::{validate_instance_id, CloudProvider, ProviderError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, MutexGuard};
use swifty_common::{CreationRequest, InstanceAddress, InstanceTemplate};
use tracing::info;

/// In-memory provider for local dry runs. Nothing leaves the process.
///
/// Every instance reports the placeholder address for `pending_lookups` queries and
/// then a TEST-NET-1 (192.0.2.0/24) address derived from its id.
pub struct MockProvider {
    template: InstanceTemplate,
    poll: PollPolicy,
    pending_lookups: u32,
    create_failure: Option<(u16, String)>,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    instances: HashMap<String, MockInstance>,
    create_calls: u32,
    lookup_calls: u32,
}

struct MockInstance {
    label: String,
    lookups: u32,
}

impl MockProvider {
    pub fn new(template: InstanceTemplate, poll: PollPolicy) -> Self {
        Self {
            template,
            poll,
            pending_lookups: 2,
            create_failure: None,
            state: Mutex::new(MockState {
                next_id: 1000,
                ..MockState::default()
            }),
        }
    }

    pub fn with_pending_lookups(mut self, pending_lookups: u32) -> Self {
        self.pending_lookups = pending_lookups;
        self
    }

    /// Make every creation fail as if the API answered `status` with `body`.
    pub fn with_create_failure(mut self, status: u16, body: impl Into<String>) -> Self {
        self.create_failure = Some((status, body.into()));
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.state().create_calls
    }

    pub fn lookup_calls(&self) -> u32 {
        self.state().lookup_calls
    }

    pub fn label_of(&self, instance_id: &str) -> Option<String> {
        self.state()
            .instances
            .get(instance_id)
            .map(|i| i.label.clone())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn address_for(id: u64) -> InstanceAddress {
        let host = (id % 254 + 1) as u8;
        InstanceAddress::from(IpAddr::V4(Ipv4Addr::new(192, 0, 2, host)))
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    fn provider_name(&self) -> &'static str {
        "Mock"
    }

    async fn create_instance(&self, server_id: &str) -> Result<String, ProviderError> {
        let request = CreationRequest::new(&self.template, server_id);
        let mut state = self.state();
        state.create_calls += 1;

        if let Some((status, body)) = &self.create_failure {
            return Err(ProviderError::CreateRejected {
                status: *status,
                message: extract_error_message(body),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.instances.insert(
            id.to_string(),
            MockInstance {
                label: request.label().to_string(),
                lookups: 0,
            },
        );
        info!(
            "🧪 [Mock API] Created instance id={} label={} payload={}",
            id,
            request.label(),
            request.redacted()
        );

        Ok(json!({
            "id": id,
            "label": request.label(),
            "region": request.region(),
            "type": request.instance_type(),
            "image": request.image(),
            "status": "provisioning",
        })
        .to_string())
    }

    async fn lookup_instance_ip(&self, instance_id: &str) -> Result<InstanceAddress, ProviderError> {
        let id = validate_instance_id(instance_id)?;
        let pending_lookups = self.pending_lookups;
        let mut state = self.state();
        state.lookup_calls += 1;

        let Some(instance) = state.instances.get_mut(id) else {
            return Err(ProviderError::LookupRejected { status: 404 });
        };
        instance.lookups += 1;
        if instance.lookups <= pending_lookups {
            return Ok(InstanceAddress::PLACEHOLDER);
        }

        let numeric = id.parse::<u64>().unwrap_or_default();
        Ok(Self::address_for(numeric))
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }
}

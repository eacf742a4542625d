use crate::poll::PollPolicy;
use crate::response::{extract_error_message, is_create_success, main_ip_from_lookup_response};
use crate::{validate_instance_id, CloudProvider, ProviderError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use swifty_common::instance_type::parse_instance_type_patterns;
use swifty_common::redact::{preview, redact_body, REDACTED};
use swifty_common::{CreationRequest, InstanceAddress, InstanceTemplate, DEFAULT_LABEL_PREFIX};
use tracing::{debug, error, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.linode.com/v4/linode/instances";
pub const DEFAULT_REGION: &str = "us-ord";
pub const DEFAULT_INSTANCE_TYPE: &str = "g6-dedicated-2";
pub const DEFAULT_IMAGE: &str = "linode/ubuntu22.04";

const BODY_PREVIEW_CHARS: usize = 500;

/// Personal access token for the Linode API. Never printed.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn bearer(&self) -> Result<HeaderValue, ProviderError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0)).map_err(|_| {
            ProviderError::InvalidConfig("API token contains characters not allowed in a header".into())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[derive(Debug, Clone)]
pub struct LinodeConfig {
    /// The instances collection, e.g. `https://api.linode.com/v4/linode/instances`.
    pub api_base_url: String,
    pub token: ApiToken,
    pub template: InstanceTemplate,
    pub poll: PollPolicy,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl LinodeConfig {
    pub fn new(token: ApiToken, template: InstanceTemplate) -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token,
            template,
            poll: PollPolicy::default(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(20),
        }
    }

    /// The standard game-server plan with the given root credential.
    pub fn default_template(root_pass: impl Into<String>, stackscript_id: u64) -> InstanceTemplate {
        InstanceTemplate {
            region: DEFAULT_REGION.to_string(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            stackscript_id,
            root_pass: root_pass.into(),
            backups_enabled: false,
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            dedicated_type_patterns: parse_instance_type_patterns(None),
        }
    }
}

pub struct LinodeProvider {
    client: Client,
    config: LinodeConfig,
    auth: HeaderValue,
}

impl LinodeProvider {
    pub fn new(config: LinodeConfig) -> Result<Self, ProviderError> {
        if config.token.is_empty() {
            return Err(ProviderError::InvalidConfig("API token is empty".into()));
        }
        config.template.validate()?;
        let auth = config.token.bearer()?;

        // Default reqwest client has no overall timeout. If the API stalls, a launch can hang forever.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self {
            client,
            config,
            auth,
        })
    }

    pub fn config(&self) -> &LinodeConfig {
        &self.config
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn collection_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    fn instance_url(&self, instance_id: &str) -> Result<String, ProviderError> {
        let id = validate_instance_id(instance_id)?;
        Ok(format!("{}/{}", self.collection_url(), id))
    }
}

#[async_trait]
impl CloudProvider for LinodeProvider {
    fn provider_name(&self) -> &'static str {
        "Linode"
    }

    async fn create_instance(&self, server_id: &str) -> Result<String, ProviderError> {
        let url = self.collection_url().to_string();
        if server_id.trim().is_empty() {
            warn!("⚠️ [Linode API] Empty server id, label will be the bare prefix");
        }
        let request = CreationRequest::new(&self.config.template, server_id);

        info!(
            "🔵 [Linode API] POST {} - Creating instance: label={}, type={}, image={}, region={}",
            url,
            request.label(),
            request.instance_type(),
            request.image(),
            request.region()
        );
        info!("🔵 [Linode API] Request payload: {}", request.redacted());

        let resp = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|source| {
                error!("❌ [Linode API] Failed to connect to Linode API: {}", source);
                ProviderError::Transport {
                    url: url.clone(),
                    source,
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|source| {
            error!("❌ [Linode API] Failed to read response from {}: {}", url, source);
            ProviderError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        info!("🔵 [Linode API] Response Code: {}", status);
        info!(
            "🔵 [Linode API] Response Body: {}",
            preview(&redact_body(&body), BODY_PREVIEW_CHARS)
        );

        if !is_create_success(status) {
            let message = extract_error_message(&body);
            error!(
                "❌ [Linode API] POST {} failed: status={}, details={}",
                url, status, message
            );
            return Err(ProviderError::CreateRejected { status, message });
        }

        info!("✅ [Linode API] POST {} succeeded: status={}", url, status);
        Ok(body)
    }

    async fn lookup_instance_ip(&self, instance_id: &str) -> Result<InstanceAddress, ProviderError> {
        let url = self.instance_url(instance_id)?;
        debug!("🔵 [Linode API] GET {} - Getting instance IP", url);

        let resp = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            error!(
                "❌ [Linode API] GET {} failed: status={}",
                url,
                status.as_u16()
            );
            return Err(ProviderError::LookupRejected {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| ProviderError::Transport {
            url: url.clone(),
            source,
        })?;
        debug!(
            "🔍 [Linode API] Instance {} body: {}",
            instance_id,
            preview(&redact_body(&body), BODY_PREVIEW_CHARS)
        );

        main_ip_from_lookup_response(&body)
    }

    fn poll_policy(&self) -> PollPolicy {
        self.config.poll
    }
}

use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use swifty_providers::linode::{ApiToken, LinodeConfig, LinodeProvider};
use swifty_providers::mock::MockProvider;
use swifty_providers::CloudProvider;

pub struct ProviderManager;

impl ProviderManager {
    pub fn get_provider(provider_name: &str, settings: &Settings) -> Result<Box<dyn CloudProvider>> {
        match provider_name.trim().to_lowercase().as_str() {
            "linode" => {
                let token = settings
                    .token
                    .clone()
                    .context("LINODE_TOKEN (or LINODE_TOKEN_FILE) not set")?;
                let mut config = LinodeConfig::new(ApiToken::new(token), settings.template.clone());
                config.api_base_url = settings.api_base_url.clone();
                config.poll = settings.poll;
                let provider = LinodeProvider::new(config)
                    .context("invalid Linode configuration (check LINODE_ROOT_PASS / LINODE_STACKSCRIPT_ID / LINODE_TYPE)")?;
                Ok(Box::new(provider))
            }
            "mock" => Ok(Box::new(
                MockProvider::new(settings.template.clone(), settings.poll)
                    .with_pending_lookups(settings.mock_pending_lookups),
            )),
            other => bail!("unknown provider `{}` (expected `linode` or `mock`)", other),
        }
    }
}

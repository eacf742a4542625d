use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use swifty_common::instance_type::parse_instance_type_patterns;
use swifty_common::redact::REDACTED;
use swifty_common::{InstanceTemplate, DEFAULT_LABEL_PREFIX};
use swifty_providers::linode::{DEFAULT_API_URL, DEFAULT_IMAGE, DEFAULT_INSTANCE_TYPE, DEFAULT_REGION};
use swifty_providers::poll::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_ELAPSED, DEFAULT_POLL_INTERVAL};
use swifty_providers::PollPolicy;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{name} has invalid value `{value}` (expected {expected})")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Everything the launcher needs, read once at startup.
#[derive(Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub token: Option<String>,
    pub template: InstanceTemplate,
    pub poll: PollPolicy,
    pub mock_pending_lookups: u32,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_base_url", &self.api_base_url)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("template", &self.template)
            .field("poll", &self.poll)
            .field("mock_pending_lookups", &self.mock_pending_lookups)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let template = InstanceTemplate {
            region: text("LINODE_REGION", DEFAULT_REGION),
            instance_type: text("LINODE_TYPE", DEFAULT_INSTANCE_TYPE),
            image: text("LINODE_IMAGE", DEFAULT_IMAGE),
            stackscript_id: parse_var(&lookup, "LINODE_STACKSCRIPT_ID", 0, "an integer")?,
            root_pass: secret(&lookup, "LINODE_ROOT_PASS").unwrap_or_default(),
            backups_enabled: parse_bool(&lookup, "LINODE_BACKUPS_ENABLED", false)?,
            // The prefix is taken verbatim so trailing separators survive.
            label_prefix: lookup("LINODE_LABEL_PREFIX")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_LABEL_PREFIX.to_string()),
            dedicated_type_patterns: parse_instance_type_patterns(lookup("LINODE_DEDICATED_TYPE_PATTERNS").as_deref()),
        };

        let interval_secs: u64 = parse_var(
            &lookup,
            "LINODE_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL.as_secs(),
            "a number of seconds",
        )?;
        if interval_secs == 0 {
            return Err(SettingsError::Invalid {
                name: "LINODE_POLL_INTERVAL_SECS",
                value: "0".into(),
                expected: "a positive number of seconds",
            });
        }
        let max_attempts: u32 = parse_var(
            &lookup,
            "LINODE_POLL_MAX_ATTEMPTS",
            DEFAULT_MAX_ATTEMPTS,
            "an integer, 0 for no limit",
        )?;
        let max_secs: u64 = parse_var(
            &lookup,
            "LINODE_POLL_MAX_SECS",
            DEFAULT_MAX_ELAPSED.as_secs(),
            "a number of seconds, 0 for no limit",
        )?;

        Ok(Self {
            api_base_url: text("LINODE_API_URL", DEFAULT_API_URL),
            token: secret(&lookup, "LINODE_TOKEN"),
            template,
            poll: PollPolicy {
                interval: Duration::from_secs(interval_secs),
                max_attempts: (max_attempts > 0).then_some(max_attempts),
                max_elapsed: (max_secs > 0).then(|| Duration::from_secs(max_secs)),
            },
            mock_pending_lookups: parse_var(&lookup, "MOCK_PENDING_LOOKUPS", 2, "an integer")?,
        })
    }
}

/// Prefer `<NAME>_FILE` for secrets (Docker/K8s friendly), fallback to `<NAME>`.
fn secret<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&format!("{}_FILE", name))
        .and_then(|path| fs::read_to_string(path.trim()).ok())
        .or_else(|| lookup(name))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| SettingsError::Invalid {
            name,
            value: raw,
            expected,
        }),
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name).map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid {
            name,
            value: raw,
            expected: "true or false",
        }),
    }
}

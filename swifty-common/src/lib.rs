use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

pub mod instance_type;
pub mod redact;

pub const DEFAULT_LABEL_PREFIX: &str = "TF2-Server-";

// --- Errors ---

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("root credential must not be empty")]
    MissingRootCredential,
    #[error("stackscript id must be set")]
    MissingStackScript,
    #[error("instance type `{0}` is not a dedicated-resource plan")]
    SharedInstanceType(String),
    #[error("`{0}` must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("`{0}` is not a valid IP address")]
pub struct AddressParseError(pub String);

// --- Instance template ---

/// The fixed values every new instance is created with.
#[derive(Clone)]
pub struct InstanceTemplate {
    pub region: String,
    pub instance_type: String,
    pub image: String,
    pub stackscript_id: u64,
    pub root_pass: String,
    pub backups_enabled: bool,
    pub label_prefix: String,
    /// Wildcard patterns an instance type must match (see [`instance_type`]).
    pub dedicated_type_patterns: Vec<String>,
}

impl InstanceTemplate {
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (name, value) in [
            ("region", &self.region),
            ("instance_type", &self.instance_type),
            ("image", &self.image),
        ] {
            if value.trim().is_empty() {
                return Err(TemplateError::EmptyField(name));
            }
        }
        if self.root_pass.is_empty() {
            return Err(TemplateError::MissingRootCredential);
        }
        if self.stackscript_id == 0 {
            return Err(TemplateError::MissingStackScript);
        }
        if !instance_type::is_dedicated_instance_type(&self.instance_type, &self.dedicated_type_patterns) {
            return Err(TemplateError::SharedInstanceType(self.instance_type.clone()));
        }
        Ok(())
    }

    pub fn label_for(&self, server_id: &str) -> String {
        format!("{}{}", self.label_prefix, server_id)
    }
}

impl fmt::Debug for InstanceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceTemplate")
            .field("region", &self.region)
            .field("instance_type", &self.instance_type)
            .field("image", &self.image)
            .field("stackscript_id", &self.stackscript_id)
            .field("root_pass", &redact::REDACTED)
            .field("backups_enabled", &self.backups_enabled)
            .field("label_prefix", &self.label_prefix)
            .field("dedicated_type_patterns", &self.dedicated_type_patterns)
            .finish()
    }
}

// --- Creation request (wire payload) ---

/// Body of `POST /linode/instances`. Built once per provisioning call.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct CreationRequest {
    region: String,
    #[serde(rename = "type")]
    instance_type: String,
    image: String,
    stackscript_id: u64,
    root_pass: String,
    label: String,
    backups_enabled: bool,
}

impl CreationRequest {
    pub fn new(template: &InstanceTemplate, server_id: &str) -> Self {
        Self {
            region: template.region.clone(),
            instance_type: template.instance_type.clone(),
            image: template.image.clone(),
            stackscript_id: template.stackscript_id,
            root_pass: template.root_pass.clone(),
            label: template.label_for(server_id),
            backups_enabled: template.backups_enabled,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn instance_type(&self) -> &str {
        &self.instance_type
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn stackscript_id(&self) -> u64 {
        self.stackscript_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn backups_enabled(&self) -> bool {
        self.backups_enabled
    }

    /// The payload as it may appear in logs.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .map(|v| redact::redact_json(&v))
            .unwrap_or_default()
    }
}

impl fmt::Debug for CreationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationRequest")
            .field("region", &self.region)
            .field("instance_type", &self.instance_type)
            .field("image", &self.image)
            .field("stackscript_id", &self.stackscript_id)
            .field("root_pass", &redact::REDACTED)
            .field("label", &self.label)
            .field("backups_enabled", &self.backups_enabled)
            .finish()
    }
}

// --- Instance address ---

/// The main public address reported for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceAddress(IpAddr);

impl InstanceAddress {
    /// Reported by the provider until an address has been assigned.
    pub const PLACEHOLDER: InstanceAddress = InstanceAddress(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        raw.trim()
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|_| AddressParseError(raw.to_string()))
    }

    pub fn is_placeholder(&self) -> bool {
        *self == Self::PLACEHOLDER
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl FromStr for InstanceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<IpAddr> for InstanceAddress {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

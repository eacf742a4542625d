use std::time::Duration;
use swifty_common::TemplateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP exchange never produced a status code (DNS, refused connection, TLS, timeout).
    #[error("failed to reach provider API at {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to create instance. HTTP {status}. Details: {message}")]
    CreateRejected { status: u16, message: String },

    #[error("failed to get instance details, response code: {status}")]
    LookupRejected { status: u16 },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("instance {instance_id} still had no address after {attempts} attempts ({elapsed:?})")]
    PollExhausted {
        instance_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("waiting for the address of instance {instance_id} was cancelled")]
    Cancelled { instance_id: String },

    #[error("invalid instance id `{0}`")]
    InvalidInstanceId(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

impl ProviderError {
    /// HTTP status returned by the provider, `None` when no response was received.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::CreateRejected { status, .. } | ProviderError::LookupRejected { status } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport { .. })
    }
}

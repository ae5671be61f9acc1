use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("http timeout cannot be 0")]
    InvalidTimeout,
}

/// Base URLs and call policy for the three backing services.
///
/// Note: Uses the `url::Url` type for compile-time URL validation.
/// Invalid URLs will be rejected during config deserialization.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamsConfig {
    /// Content catalog service base URL
    pub content_url: Url,
    /// User/subscription account service base URL
    pub users_url: Url,
    /// Interaction/recommendation tracking service base URL
    pub interactions_url: Url,
    /// Per-call timeout applied to every upstream request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Extra attempts for GET requests that fail at the transport level.
    /// Non-idempotent verbs are never retried.
    #[serde(default = "default_get_retries")]
    pub get_retries: u32,
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_get_retries() -> u32 {
    1
}

impl UpstreamsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

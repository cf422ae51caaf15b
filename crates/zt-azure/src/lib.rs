//! Azure provider for the Zero Trust engine
//!
//! Implements the inventory and credential capabilities of `zt-core`
//! against Azure Resource Manager.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      AzureConnector                          │
//! │                            │                                 │
//! │        ┌───────────────────┴───────────────────┐             │
//! │        ▼                                       ▼             │
//! │  ClientSecretCredential                  AzureInventory      │
//! │  (OAuth2 client credentials,             (resources, child   │
//! │   cached bearer token)                    collections, subs) │
//! │        │                                       │             │
//! │        └──────────────▶ ArmClient ◀────────────┘             │
//! │                  (bearer GET, nextLink paging)               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

use serde::Deserialize;
use thiserror::Error;
use zt_core::ProviderError;

pub mod arm;
pub mod connector;
pub mod credential;
pub mod inventory;

pub use arm::ArmClient;
pub use connector::AzureConnector;
pub use credential::ClientSecretCredential;
pub use inventory::AzureInventory;

/// Public cloud Entra ID authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Public cloud ARM endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Cloud endpoints; defaults target the public Azure cloud
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    /// Token authority
    pub authority_host: String,
    /// ARM endpoint
    pub management_endpoint: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
        }
    }
}

impl AzureSettings {
    /// Read `AZURE_AUTHORITY_HOST` and `AZURE_MANAGEMENT_ENDPOINT`, falling back to defaults
    pub fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            authority_host: var("AZURE_AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST),
            management_endpoint: var("AZURE_MANAGEMENT_ENDPOINT", DEFAULT_MANAGEMENT_ENDPOINT),
        }
    }
}

/// Azure client errors
#[derive(Debug, Error)]
pub enum AzureError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with the ARM error body, when one was sent
    #[error("ARM request failed with {status}: {code}: {message}")]
    Api {
        /// HTTP status
        status: u16,
        /// ARM error code
        code: String,
        /// ARM error message
        message: String,
    },

    /// Token endpoint rejected the request
    #[error("token request failed: {0}")]
    Token(String),

    /// Credential provider failure
    #[error(transparent)]
    Credential(ProviderError),

    /// Malformed endpoint
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Unexpected response body
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<AzureError> for ProviderError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::Api { status: 401 | 403, .. } => ProviderError::Unauthorized(err.to_string()),
            AzureError::Api { status: 404, .. } => ProviderError::NotFound(err.to_string()),
            AzureError::Token(_) => ProviderError::Unauthorized(err.to_string()),
            AzureError::Credential(inner) => inner,
            AzureError::Decode(_) | AzureError::Url(_) => ProviderError::Malformed(err.to_string()),
            AzureError::Http(_) | AzureError::Api { .. } => ProviderError::Http(err.to_string()),
        }
    }
}

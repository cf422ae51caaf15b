//! Client-secret credential (OAuth2 client credentials flow)

use crate::AzureError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use zt_core::{ClientCredentials, CredentialProvider, ProviderError, ProviderResult};

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    scope: String,
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, scope: &str) -> bool {
        self.scope == scope && Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Service principal credential with a cached bearer token
pub struct ClientSecretCredential {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<CachedToken>>,
}

impl ClientSecretCredential {
    /// Credential for one service principal
    pub fn new(client: Client, authority_host: &str, credentials: &ClientCredentials) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                credentials.tenant_id
            ),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            cached: RwLock::new(None),
        }
    }

    async fn request_token(&self, scope: &str) -> Result<CachedToken, AzureError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
            ("grant_type", "client_credentials"),
        ];

        let response = self.client.post(&self.token_url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error, e.error_description))
                .unwrap_or_else(|_| format!("status {}", status.as_u16()));
            return Err(AzureError::Token(reason));
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AzureError::Token(e.to_string()))?;
        debug!("Acquired token for {} (expires in {}s)", scope, token.expires_in);

        Ok(CachedToken {
            scope: scope.to_string(),
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> ProviderResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(scope)) {
                return Ok(token.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(scope)) {
            return Ok(token.token.clone());
        }

        let fresh = self.request_token(scope).await.map_err(ProviderError::from)?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

//! Credential Provider capability

use crate::error::ProviderResult;
use async_trait::async_trait;

/// Management-plane scope used for every inventory call
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Hands out bearer tokens for a scope
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Bearer token for `scope`
    async fn get_token(&self, scope: &str) -> ProviderResult<String>;
}

/// Fixed token, for tests and pre-authorized callers
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Token handed out for every scope
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn get_token(&self, _scope: &str) -> ProviderResult<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        let token = StaticToken::new("abc");
        assert_eq!(tokio_test::block_on(token.get_token(MANAGEMENT_SCOPE)).unwrap(), "abc");
        assert_eq!(format!("{:?}", token), "StaticToken(<redacted>)");
    }
}

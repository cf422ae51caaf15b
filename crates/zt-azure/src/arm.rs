//! Azure Resource Manager REST client

use crate::AzureError;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use zt_core::CredentialProvider;

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Bearer-authorized GETs against the management endpoint
#[derive(Clone)]
pub struct ArmClient {
    http: Client,
    endpoint: String,
    scope: String,
    credential: Arc<dyn CredentialProvider>,
}

impl ArmClient {
    /// Client for `endpoint` authenticating with `credential`
    pub fn new(http: Client, endpoint: &str, credential: Arc<dyn CredentialProvider>) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self {
            http,
            scope: format!("{}/.default", endpoint),
            endpoint,
            credential,
        }
    }

    /// Absolute URL for `path` with the given query pairs
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AzureError> {
        let mut url = Url::parse(&format!("{}/{}", self.endpoint, path.trim_start_matches('/')))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// GET one document
    pub async fn get<T: DeserializeOwned>(&self, path: &str, api_version: &str) -> Result<T, AzureError> {
        let url = self.url(path, &[("api-version", api_version)])?;
        self.get_url(url.as_str()).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T, AzureError> {
        let token = self
            .credential
            .get_token(&self.scope)
            .await
            .map_err(AzureError::Credential)?;

        debug!("GET {}", url);
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_default();
            return Err(AzureError::Api {
                status: status.as_u16(),
                code: if detail.code.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                } else {
                    detail.code
                },
                message: if detail.message.is_empty() { body } else { detail.message },
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AzureError::Decode(e.to_string()))
    }

    /// Lazily page through a collection, following `nextLink`
    pub fn list(&self, url: Url) -> BoxStream<'_, Result<Value, AzureError>> {
        stream::try_unfold(Some(url.to_string()), move |next| async move {
            let url = match next {
                Some(url) => url,
                None => return Ok::<_, AzureError>(None),
            };
            let page: Page = self.get_url(&url).await?;
            let next = page.next_link.filter(|link| !link.is_empty());
            Ok::<_, AzureError>(Some((page.value, next)))
        })
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    /// Every item of a collection
    pub async fn list_all(&self, path: &str, api_version: &str) -> Result<Vec<Value>, AzureError> {
        let url = self.url(path, &[("api-version", api_version)])?;
        self.list(url).try_collect().await
    }
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zt_core::{ProviderError, StaticToken};

    fn client(server: &MockServer) -> ArmClient {
        ArmClient::new(Client::new(), &server.uri(), Arc::new(StaticToken::new("tok")))
    }

    #[tokio::test]
    async fn test_follows_next_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/0000/resources"))
            .and(query_param("api-version", "2021-04-01"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "id": "/a" }, { "id": "/b" }],
                "nextLink": format!("{}/page2?api-version=2021-04-01&$skiptoken=x", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [{ "id": "/c" }] })))
            .mount(&server)
            .await;

        let items = client(&server)
            .list_all("/subscriptions/0000/resources", "2021-04-01")
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["/a", "/b", "/c"]);
    }

    #[tokio::test]
    async fn test_error_body_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "The Resource was not found." }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("nope"))
            .mount(&server)
            .await;

        let arm = client(&server);
        let err = arm.get::<Value>("/missing", "1").await.unwrap_err();
        assert!(err.to_string().contains("ResourceNotFound"));
        assert!(matches!(ProviderError::from(err), ProviderError::NotFound(_)));

        let err = arm.get::<Value>("/forbidden", "1").await.unwrap_err();
        assert!(matches!(ProviderError::from(err), ProviderError::Unauthorized(_)));
    }

    #[test]
    fn test_url_encodes_query() {
        let arm = ArmClient::new(Client::new(), "https://management.azure.com/", Arc::new(StaticToken::new("t")));
        let url = arm
            .url("/subscriptions/0000/resources", &[("$filter", "resourceType eq 'x'"), ("api-version", "1")])
            .unwrap();
        assert_eq!(url.path(), "/subscriptions/0000/resources");
        let pairs: Vec<_> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(pairs[0], ("$filter".to_string(), "resourceType eq 'x'".to_string()));
    }
}

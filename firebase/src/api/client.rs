use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use tfplug::Context;

use super::auth::TokenSource;
use super::error::ApiError;

pub const DEFAULT_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

/// Authenticated client for the Firebase Storage API
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenSource,
}

impl Client {
    /// Create a client from explicit JSON key material, or from the ambient
    /// credential chain when `credentials` is `None`
    ///
    /// `FIREBASE_STORAGE_ENDPOINT` overrides the API endpoint.
    pub async fn from_credentials(credentials: Option<&str>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().build()?;
        let tokens = TokenSource::resolve(credentials)?;

        let endpoint = std::env::var("FIREBASE_STORAGE_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        tracing::debug!(credentials = tokens.kind(), endpoint = %endpoint, "created API client");

        Self::with_token_source(http, &endpoint, tokens)
    }

    pub fn with_token_source(
        http: reqwest::Client,
        endpoint: &str,
        tokens: TokenSource,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                endpoint,
                parsed.scheme()
            )));
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: endpoint.trim_end_matches('/').to_string(),
                tokens,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Storage API operations
    pub fn storage(&self) -> super::storage::StorageApi<'_> {
        super::storage::StorageApi::new(self)
    }

    /// Send an authenticated request
    ///
    /// A body is sent as JSON with `Content-Type: application/json`; without a
    /// body no content type is set. Resolves to `ApiError::Cancelled` as soon
    /// as `ctx` is cancelled, dropping the in-flight request.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                tracing::debug!(%method, url, "request cancelled");
                Err(ApiError::Cancelled)
            }
            result = self.send(method.clone(), url, body) => result,
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.inner.http.request(method.clone(), url);

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let auth_headers = self.inner.tokens.headers().await?;
        tracing::debug!(%method, url, "sending request");

        let response = request.headers(auth_headers).send().await?;
        tracing::debug!(%method, url, status = response.status().as_u16(), "received response");

        Ok(response)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::api::test_helpers::create_test_client;
    use mockito::{Matcher, Server};
    use std::collections::HashMap;
    use std::time::Duration;

    #[tokio::test]
    async fn request_without_body_sends_bearer_and_no_content_type() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1alpha/projects/demo-proj/defaultBucket")
            .match_header("authorization", "Bearer test-token")
            .match_header("content-type", Matcher::Missing)
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let url = format!("{}/v1alpha/projects/demo-proj/defaultBucket", client.base_url());

        let response = client
            .request(&Context::new(), Method::GET, &url, None::<&()>)
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_with_body_sends_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1alpha/projects/demo-proj/defaultBucket")
            .match_header("content-type", "application/json")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::Json(serde_json::json!({"location": "us"})))
            .with_body("{}")
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let url = format!("{}/v1alpha/projects/demo-proj/defaultBucket", client.base_url());
        let body = HashMap::from([("location", "us")]);

        client
            .request(&Context::new(), Method::POST, &url, Some(&body))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unserializable_body_is_a_serialization_error() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let client = create_test_client(&server.url());
        // JSON object keys must be strings
        let body = HashMap::from([((1, 2), "x")]);

        let err = client
            .request(&Context::new(), Method::POST, &server.url(), Some(&body))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let client = create_test_client(&server.url());
        let ctx = Context::new();
        ctx.cancel();

        let err = client
            .request(&ctx, Method::GET, &server.url(), None::<&()>)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accepts connections and never answers
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = create_test_client(&format!("http://{}", addr));
        let ctx = Context::new();
        let url = format!("{}/v1alpha/projects/p/defaultBucket", client.base_url());

        let request = {
            let client = client.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                client
                    .request(&ctx, Method::GET, &url, None::<&()>)
                    .await
                    .map(|response| response.status())
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!request.is_finished());
        ctx.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), request)
            .await
            .expect("request should stop once cancelled")
            .unwrap();
        assert!(matches!(result, Err(ApiError::Cancelled)));

        server.abort();
    }

    #[tokio::test]
    async fn transport_failures_are_transport_errors() {
        let client = create_test_client("http://127.0.0.1:9");

        let err = client
            .request(
                &Context::new(),
                Method::GET,
                "http://127.0.0.1:9/v1alpha/projects/p/defaultBucket",
                None::<&()>,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn endpoint_must_be_http() {
        let tokens = TokenSource::static_token("t");
        let err = Client::with_token_source(reqwest::Client::new(), "ftp://example.com", tokens)
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = create_test_client("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}

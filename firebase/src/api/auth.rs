//! Google credentials for outbound requests
//!
//! Credentials come from, in order:
//!
//! 1. explicit JSON key material (any key type `google-cloud-auth` accepts)
//! 2. `GOOGLE_OAUTH_ACCESS_TOKEN`, a ready access token
//! 3. Application Default Credentials: `GOOGLE_APPLICATION_CREDENTIALS`, the
//!    gcloud well-known file, then the metadata server
//!
//! Token exchange and caching are left to `google-cloud-auth`.

use super::error::ApiError;
use google_cloud_auth::credentials::{
    external_account, impersonated, service_account, user_account, Builder, CacheableResource,
    Credentials,
};
use http::Extensions;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/firebase",
    "https://www.googleapis.com/auth/firebase.storage",
    "https://www.googleapis.com/auth/cloud-platform",
];

enum TokenKind {
    Static(String),
    Google {
        credentials: Credentials,
        kind: &'static str,
    },
}

/// Source of authorization headers for outbound requests
pub struct TokenSource {
    kind: TokenKind,
}

fn build_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Auth(e.to_string())
}

impl TokenSource {
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Static(token.into()),
        }
    }

    /// Credentials from JSON key material, dispatched on its `type` field
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ApiError::Auth(format!("invalid credentials JSON: {}", e)))?;

        let key_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let (credentials, kind) = match key_type.as_str() {
            "service_account" => (
                service_account::Builder::new(value)
                    .with_access_specifier(service_account::AccessSpecifier::from_scopes(SCOPES))
                    .build()
                    .map_err(build_error)?,
                "service_account",
            ),
            "authorized_user" => (
                user_account::Builder::new(value)
                    .with_scopes(SCOPES)
                    .build()
                    .map_err(build_error)?,
                "authorized_user",
            ),
            "impersonated_service_account" => (
                impersonated::Builder::new(value)
                    .with_scopes(SCOPES)
                    .build()
                    .map_err(build_error)?,
                "impersonated_service_account",
            ),
            "external_account" => (
                external_account::Builder::new(value)
                    .with_scopes(SCOPES)
                    .build()
                    .map_err(build_error)?,
                "external_account",
            ),
            other => {
                return Err(ApiError::Auth(format!(
                    "unsupported credentials type '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            kind: TokenKind::Google { credentials, kind },
        })
    }

    pub fn application_default() -> Result<Self, ApiError> {
        let credentials = Builder::default()
            .with_scopes(SCOPES)
            .build()
            .map_err(build_error)?;

        Ok(Self {
            kind: TokenKind::Google {
                credentials,
                kind: "application_default",
            },
        })
    }

    /// Explicit key material when given, the ambient credential chain otherwise
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ApiError> {
        if let Some(json) = explicit.filter(|json| !json.trim().is_empty()) {
            return Self::from_json(json);
        }

        if let Some(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
        {
            tracing::debug!("using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(Self::static_token(token));
        }

        tracing::debug!("using application default credentials");
        Self::application_default()
    }

    pub fn kind(&self) -> &'static str {
        match &self.kind {
            TokenKind::Static(_) => "access_token",
            TokenKind::Google { kind, .. } => kind,
        }
    }

    /// Authorization headers for the next request
    pub async fn headers(&self) -> Result<HeaderMap, ApiError> {
        match &self.kind {
            TokenKind::Static(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::Auth(format!("invalid access token: {}", e)))?;
                value.set_sensitive(true);

                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, value);
                Ok(headers)
            }
            TokenKind::Google { credentials, .. } => {
                match credentials
                    .headers(Extensions::new())
                    .await
                    .map_err(build_error)?
                {
                    CacheableResource::New { data, .. } => Ok(data),
                    _ => Err(ApiError::Auth(
                        "credentials returned no authorization headers".to_string(),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

    fn service_account_json() -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": "demo-proj",
            "private_key_id": "key-1",
            "private_key": TEST_KEY,
            "client_email": "deployer@demo-proj.iam.gserviceaccount.com",
            "token_uri": "https://oauth2.googleapis.com/token",
        })
        .to_string()
    }

    fn authorized_user() -> serde_json::Value {
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "client-id",
            "client_secret": "client-secret",
            "refresh_token": "refresh-me",
        })
    }

    fn clear_credential_env() {
        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
        std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");
    }

    #[tokio::test]
    async fn static_token_is_sent_as_bearer() {
        let tokens = TokenSource::static_token("ya29.static");
        let headers = tokens.headers().await.unwrap();

        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer ya29.static");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(tokens.kind(), "access_token");
    }

    #[tokio::test]
    async fn builds_credentials_for_each_key_type() {
        let tokens = TokenSource::from_json(&service_account_json()).unwrap();
        assert_eq!(tokens.kind(), "service_account");

        let tokens = TokenSource::from_json(&authorized_user().to_string()).unwrap();
        assert_eq!(tokens.kind(), "authorized_user");

        let impersonated = serde_json::json!({
            "type": "impersonated_service_account",
            "service_account_impersonation_url": "https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts/deployer@demo-proj.iam.gserviceaccount.com:generateAccessToken",
            "source_credentials": authorized_user(),
        });
        let tokens = TokenSource::from_json(&impersonated.to_string()).unwrap();
        assert_eq!(tokens.kind(), "impersonated_service_account");

        let workload_identity = serde_json::json!({
            "type": "external_account",
            "audience": "//iam.googleapis.com/projects/123/locations/global/workloadIdentityPools/ci/providers/github",
            "subject_token_type": "urn:ietf:params:oauth:token-type:jwt",
            "token_url": "https://sts.googleapis.com/v1/token",
            "credential_source": {"file": "/var/run/secrets/token"},
        });
        let tokens = TokenSource::from_json(&workload_identity.to_string()).unwrap();
        assert_eq!(tokens.kind(), "external_account");
    }

    #[test]
    fn rejects_unknown_key_types() {
        let err = TokenSource::from_json(r#"{"type":"api_key"}"#).err().unwrap();

        assert!(matches!(err, ApiError::Auth(_)));
        assert!(err.to_string().contains("unsupported credentials type 'api_key'"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = TokenSource::from_json("{not json").err().unwrap();
        assert!(matches!(err, ApiError::Auth(_)));
        assert!(err.to_string().contains("invalid credentials JSON"));
    }

    #[tokio::test]
    #[serial]
    async fn explicit_credentials_win_over_environment() {
        clear_credential_env();
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "from-env");

        let tokens = TokenSource::resolve(Some(&authorized_user().to_string())).unwrap();
        assert_eq!(tokens.kind(), "authorized_user");

        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn access_token_env_is_used_as_is() {
        clear_credential_env();
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.env");

        let tokens = TokenSource::resolve(None).unwrap();
        let headers = tokens.headers().await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer ya29.env");

        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn application_default_credentials_read_key_file() {
        clear_credential_env();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("adc.json");
        std::fs::write(&key_path, authorized_user().to_string()).unwrap();
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", &key_path);

        let tokens = TokenSource::resolve(None).unwrap();
        assert_eq!(tokens.kind(), "application_default");

        std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");
    }

    #[test]
    #[serial]
    fn missing_application_credentials_file_is_an_auth_error() {
        clear_credential_env();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(
            "GOOGLE_APPLICATION_CREDENTIALS",
            dir.path().join("does-not-exist.json"),
        );

        let err = TokenSource::resolve(None).err().unwrap();
        assert!(matches!(err, ApiError::Auth(_)));

        std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");
    }
}

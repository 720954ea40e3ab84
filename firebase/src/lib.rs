pub mod api;
pub mod data_sources;
pub mod resources;

use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::request::{ConfigureRequest, ConfigureResponse};
use tfplug::{
    AttributeBuilder, Config, DataSource, Diagnostics, Provider, Resource, Schema, SchemaBuilder,
    TfplugError,
};

/// Environment fallback for the `credentials` provider attribute
pub const CREDENTIALS_ENV: &str = "FIREBASE_CREDENTIALS";

pub struct FirebaseProvider {
    client: Option<api::Client>,
}

impl Default for FirebaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FirebaseProvider {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&self) -> tfplug::Result<api::Client> {
        self.client
            .clone()
            .ok_or(TfplugError::ProviderNotConfigured)
    }
}

#[async_trait]
impl Provider for FirebaseProvider {
    fn provider_schema(&self) -> Schema {
        SchemaBuilder::new()
            .description("Firebase provider")
            .attribute(
                AttributeBuilder::string("credentials")
                    .optional()
                    .sensitive()
                    .description(
                        "Service account or authorized user JSON key. \
                         Falls back to FIREBASE_CREDENTIALS, then Application Default Credentials",
                    ),
            )
            .build()
    }

    async fn validate(&self, config: &Config) -> Diagnostics {
        let mut diags = Diagnostics::new();

        if let Some(credentials) = config.get_string("credentials") {
            if !credentials.trim().is_empty() {
                let has_type = serde_json::from_str::<serde_json::Value>(credentials)
                    .ok()
                    .and_then(|v| v.get("type").map(|t| t.is_string()))
                    .unwrap_or(false);
                if !has_type {
                    diags.add_attribute_error(
                        "credentials",
                        "Invalid credentials",
                        "credentials must be a JSON key object with a \"type\" field",
                    );
                }
            }
        }

        diags
    }

    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse {
        let credentials = request
            .config
            .get_string("credentials")
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.to_string())
            .or_else(|| {
                std::env::var(CREDENTIALS_ENV)
                    .ok()
                    .filter(|c| !c.trim().is_empty())
            });

        let mut diags = Diagnostics::new();

        match api::Client::from_credentials(credentials.as_deref()).await {
            Ok(client) => {
                tracing::info!(endpoint = client.base_url(), "provider configured");
                self.client = Some(client);
            }
            Err(e) => {
                diags.add_error("Failed to create API client", Some(e.to_string()));
            }
        }

        ConfigureResponse { diagnostics: diags }
    }

    async fn create_resource(&self, name: &str) -> tfplug::Result<Box<dyn Resource>> {
        match name {
            resources::default_bucket::TYPE_NAME => Ok(Box::new(
                resources::DefaultBucketResource::new(self.client()?),
            )),
            _ => Err(TfplugError::ResourceNotFound(name.to_string())),
        }
    }

    async fn create_data_source(&self, name: &str) -> tfplug::Result<Box<dyn DataSource>> {
        match name {
            data_sources::default_bucket::TYPE_NAME => Ok(Box::new(
                data_sources::DefaultBucketDataSource::new(self.client()?),
            )),
            _ => Err(TfplugError::DataSourceNotFound(name.to_string())),
        }
    }

    async fn resource_schemas(&self) -> HashMap<String, Schema> {
        static SCHEMAS: std::sync::OnceLock<HashMap<String, Schema>> = std::sync::OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                let mut schemas = HashMap::new();
                schemas.insert(
                    resources::default_bucket::TYPE_NAME.to_string(),
                    resources::DefaultBucketResource::schema_static(),
                );
                schemas
            })
            .clone()
    }

    async fn data_source_schemas(&self) -> HashMap<String, Schema> {
        static SCHEMAS: std::sync::OnceLock<HashMap<String, Schema>> = std::sync::OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                let mut schemas = HashMap::new();
                schemas.insert(
                    data_sources::default_bucket::TYPE_NAME.to_string(),
                    data_sources::DefaultBucketDataSource::schema_static(),
                );
                schemas
            })
            .clone()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::{Context, Dynamic};

    fn configure_request(credentials: Option<&str>) -> ConfigureRequest {
        let mut config = Config::new();
        config.set(
            "credentials",
            credentials
                .map(|c| Dynamic::String(c.to_string()))
                .unwrap_or(Dynamic::Null),
        );
        ConfigureRequest {
            context: Context::new(),
            config,
        }
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_from_access_token_env() {
        std::env::remove_var(CREDENTIALS_ENV);
        std::env::remove_var("FIREBASE_STORAGE_ENDPOINT");
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.test");

        let mut provider = FirebaseProvider::new();
        let response = provider.configure(configure_request(None)).await;

        assert!(response.diagnostics.errors.is_empty());
        let client = provider.client.as_ref().unwrap();
        assert_eq!(client.base_url(), "https://firebasestorage.googleapis.com");

        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn provider_reports_unusable_credentials() {
        std::env::remove_var(CREDENTIALS_ENV);

        let mut provider = FirebaseProvider::new();
        let response = provider
            .configure(configure_request(Some(r#"{"type":"api_key"}"#)))
            .await;

        assert_eq!(response.diagnostics.errors.len(), 1);
        assert_eq!(
            response.diagnostics.errors[0].summary,
            "Failed to create API client"
        );
        assert!(provider.client.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn credentials_env_is_used_when_attribute_is_unset() {
        std::env::set_var(CREDENTIALS_ENV, r#"{"type":"api_key"}"#);
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.test");

        // The env key wins over the ambient token, and it is unusable
        let mut provider = FirebaseProvider::new();
        let response = provider.configure(configure_request(None)).await;
        assert!(!response.diagnostics.errors.is_empty());

        std::env::remove_var(CREDENTIALS_ENV);
        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn provider_rejects_invalid_endpoint_override() {
        std::env::remove_var(CREDENTIALS_ENV);
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.test");
        std::env::set_var("FIREBASE_STORAGE_ENDPOINT", "not a url");

        let mut provider = FirebaseProvider::new();
        let response = provider.configure(configure_request(None)).await;

        assert!(response.diagnostics.errors[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .starts_with("Invalid URL"));

        std::env::remove_var("FIREBASE_STORAGE_ENDPOINT");
        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    async fn validate_checks_credentials_shape() {
        let provider = FirebaseProvider::new();

        let ok = provider
            .validate(&configure_request(Some(r#"{"type":"service_account"}"#)).config)
            .await;
        assert!(!ok.has_errors());

        let unset = provider.validate(&configure_request(None).config).await;
        assert!(!unset.has_errors());

        let not_json = provider
            .validate(&configure_request(Some("hunter2")).config)
            .await;
        assert_eq!(not_json.errors[0].attribute.as_deref(), Some("credentials"));

        let no_type = provider
            .validate(&configure_request(Some(r#"{"client_email":"a@b"}"#)).config)
            .await;
        assert!(no_type.has_errors());
    }

    #[tokio::test]
    #[serial]
    async fn provider_creates_resources_after_configuration() {
        std::env::remove_var(CREDENTIALS_ENV);
        std::env::remove_var("FIREBASE_STORAGE_ENDPOINT");
        std::env::set_var("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.test");

        let mut provider = FirebaseProvider::new();
        provider.configure(configure_request(None)).await;

        assert!(provider
            .create_resource("firebase_default_bucket")
            .await
            .is_ok());
        assert!(provider
            .create_data_source("firebase_default_bucket")
            .await
            .is_ok());
        assert!(matches!(
            provider.create_resource("firebase_unknown").await,
            Err(TfplugError::ResourceNotFound(_))
        ));
        assert!(matches!(
            provider.create_data_source("firebase_unknown").await,
            Err(TfplugError::DataSourceNotFound(_))
        ));

        std::env::remove_var("GOOGLE_OAUTH_ACCESS_TOKEN");
    }

    #[tokio::test]
    async fn provider_fails_to_create_resources_before_configuration() {
        let provider = FirebaseProvider::new();

        let resource = provider.create_resource("firebase_default_bucket").await;
        assert!(resource
            .err()
            .unwrap()
            .to_string()
            .contains("Provider not configured"));
    }

    #[tokio::test]
    async fn provider_schemas_contain_expected_types() {
        let provider = FirebaseProvider::new();

        assert!(provider
            .resource_schemas()
            .await
            .contains_key("firebase_default_bucket"));
        assert!(provider
            .data_source_schemas()
            .await
            .contains_key("firebase_default_bucket"));
        assert!(provider.provider_schema().attributes["credentials"].sensitive);
    }
}

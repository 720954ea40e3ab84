//! Default storage bucket data source

use crate::api::{default_bucket_id, Client};
use async_trait::async_trait;
use tfplug::request::{DataSourceReadRequest, DataSourceReadResponse};
use tfplug::{AttributeBuilder, DataSource, Diagnostics, Dynamic, Schema, SchemaBuilder};

pub const TYPE_NAME: &str = "firebase_default_bucket";

pub struct DefaultBucketDataSource {
    client: Client,
}

impl DefaultBucketDataSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .description("Looks up the default Cloud Storage bucket of a Firebase project")
            .attribute(
                AttributeBuilder::string("project")
                    .required()
                    .description("Firebase project ID"),
            )
            .attribute(AttributeBuilder::string("id").computed())
            .attribute(
                AttributeBuilder::string("name")
                    .computed()
                    .description("Resource name of the default bucket"),
            )
            .attribute(AttributeBuilder::string("location").computed())
            .attribute(
                AttributeBuilder::string("bucket")
                    .computed()
                    .description("Name of the underlying Cloud Storage bucket"),
            )
            .attribute(AttributeBuilder::string("storage_class").computed())
            .build()
    }
}

fn optional_string(value: Option<String>) -> Dynamic {
    value.map(Dynamic::String).unwrap_or(Dynamic::Null)
}

#[async_trait]
impl DataSource for DefaultBucketDataSource {
    async fn read(&self, request: DataSourceReadRequest) -> DataSourceReadResponse {
        let mut diagnostics = Diagnostics::new();
        let mut state = request.config;

        let Some(project) = state.get_string("project").map(str::to_string) else {
            diagnostics.add_attribute_error(
                "project",
                "Missing project",
                "project must be set to a known value",
            );
            return DataSourceReadResponse {
                state: None,
                diagnostics,
            };
        };

        let bucket = match self
            .client
            .storage()
            .get_default_bucket(&request.context, &project)
            .await
        {
            Ok(Some(bucket)) => bucket,
            Ok(None) => {
                diagnostics.add_error(
                    "default bucket not found",
                    Some(format!("Project '{}' has no default storage bucket", project)),
                );
                return DataSourceReadResponse {
                    state: None,
                    diagnostics,
                };
            }
            Err(e) => {
                diagnostics.add_error("Failed to read default bucket", Some(e.to_string()));
                return DataSourceReadResponse {
                    state: None,
                    diagnostics,
                };
            }
        };

        state.set_string("id", default_bucket_id(&project));
        state.set_string("name", bucket.name);
        state.set("location", optional_string(bucket.location));
        state.set("bucket", optional_string(bucket.bucket.map(|b| b.name)));
        state.set("storage_class", optional_string(bucket.storage_class));

        DataSourceReadResponse {
            state: Some(state),
            diagnostics,
        }
    }
}

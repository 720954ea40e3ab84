//! Provider, resource and data source traits
//!
//! A [`Provider`] is long-lived and configured once. Resources and data
//! sources are created on demand, per RPC, through the provider's factory
//! methods, so each instance can hold a cheap clone of the configured API
//! client instead of sharing mutable state.

use crate::request::{
    ConfigureRequest, ConfigureResponse, CreateRequest, CreateResponse, DataSourceReadRequest,
    DataSourceReadResponse, DeleteRequest, DeleteResponse, ImportRequest, ImportResponse,
    ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
use crate::schema::Schema;
use crate::types::{Config, Diagnostics};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Schema of the `provider` block
    fn provider_schema(&self) -> Schema;

    /// Provider-specific checks on top of the schema validation the
    /// framework already performs
    async fn validate(&self, _config: &Config) -> Diagnostics {
        Diagnostics::new()
    }

    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse;

    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>>;

    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>>;

    async fn resource_schemas(&self) -> HashMap<String, Schema>;

    async fn data_source_schemas(&self) -> HashMap<String, Schema>;
}

#[async_trait]
pub trait Resource: Send + Sync {
    async fn create(&self, request: CreateRequest) -> CreateResponse;

    async fn read(&self, request: ReadRequest) -> ReadResponse;

    async fn update(&self, request: UpdateRequest) -> UpdateResponse;

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse;

    async fn import_state(&self, request: ImportRequest) -> ImportResponse {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(
            "Import not supported",
            Some(format!(
                "This resource does not support importing '{}'",
                request.id
            )),
        );
        ImportResponse {
            state: None,
            diagnostics,
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn read(&self, request: DataSourceReadRequest) -> DataSourceReadResponse;
}

//! gRPC service implementation
//!
//! This module implements Terraform Plugin Protocol v6 on top of the factory
//! based [`Provider`] trait. Resource and data source instances are created
//! per call; the provider itself sits behind a `RwLock` that is only taken for
//! writing during `ConfigureProvider`.
//!
//! The service owns a root [`Context`]. Every callback receives a clone of it
//! and `StopProvider` cancels it.

use crate::context::Context;
use crate::defaults::DefaultRequest;
use crate::error::TfplugError;
use crate::plan_modifier::PlanModifyRequest;
use crate::proto;
use crate::proto::attribute_path::{step::Selector, Step};
use crate::provider::Provider;
use crate::request::{
    ConfigureRequest, CreateRequest, DataSourceReadRequest, DeleteRequest, ImportRequest,
    ReadRequest, UpdateRequest,
};
use crate::schema::Schema;
use crate::types::{null_msgpack, Config, Diagnostic, Diagnostics, Dynamic, State};
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type RpcResult<T> = std::result::Result<Response<T>, Status>;

pub struct ProviderService<P: Provider> {
    provider: Arc<RwLock<P>>,
    stop: Context,
}

impl<P: Provider + 'static> ProviderService<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(RwLock::new(provider)),
            stop: Context::new(),
        }
    }

    async fn resource_schema(&self, type_name: &str) -> std::result::Result<Schema, Status> {
        let provider = self.provider.read().await;
        provider
            .resource_schemas()
            .await
            .remove(type_name)
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()).into())
    }

    async fn data_source_schema(&self, type_name: &str) -> std::result::Result<Schema, Status> {
        let provider = self.provider.read().await;
        provider
            .data_source_schemas()
            .await
            .remove(type_name)
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()).into())
    }

    async fn resource(
        &self,
        type_name: &str,
    ) -> std::result::Result<Box<dyn crate::provider::Resource>, Status> {
        let provider = self.provider.read().await;
        Ok(provider.create_resource(type_name).await?)
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderRpc for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> RpcResult<proto::get_metadata::Response> {
        let provider = self.provider.read().await;

        let mut resources: Vec<String> = provider.resource_schemas().await.into_keys().collect();
        resources.sort();
        let mut data_sources: Vec<String> =
            provider.data_source_schemas().await.into_keys().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> RpcResult<proto::get_provider_schema::Response> {
        let provider = self.provider.read().await;

        let resource_schemas = provider
            .resource_schemas()
            .await
            .iter()
            .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
            .collect();
        let data_source_schemas = provider
            .data_source_schemas()
            .await
            .iter()
            .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
            .collect();

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider.provider_schema())),
            resource_schemas,
            data_source_schemas,
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> RpcResult<proto::validate_provider_config::Response> {
        let req = request.into_inner();
        let config = decode_state(&req.config)?.unwrap_or_default();

        let provider = self.provider.read().await;
        let mut diagnostics = validate_config(&provider.provider_schema(), &config);
        diagnostics.extend(provider.validate(&config).await);

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: encode_diagnostics(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> RpcResult<proto::validate_resource_config::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let config = decode_state(&req.config)?.unwrap_or_default();

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: encode_diagnostics(validate_config(&schema, &config)),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> RpcResult<proto::validate_data_resource_config::Response> {
        let req = request.into_inner();
        let schema = self.data_source_schema(&req.type_name).await?;
        let config = decode_state(&req.config)?.unwrap_or_default();

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: encode_diagnostics(validate_config(&schema, &config)),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> RpcResult<proto::upgrade_resource_state::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        // Only schema version 0 exists, so upgrading means re-shaping the JSON
        // state to the current attribute set.
        let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
        let state = State::from_json(&raw)?;

        tracing::debug!(
            type_name = %req.type_name,
            version = req.version,
            "upgrading resource state"
        );

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_state(
                state.map(|s| conform_to_schema(s, &schema)).as_ref(),
            )?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> RpcResult<proto::configure_provider::Response> {
        let req = request.into_inner();
        let config = decode_state(&req.config)?.unwrap_or_default();

        tracing::debug!(
            terraform_version = %req.terraform_version,
            "configuring provider"
        );

        let mut provider = self.provider.write().await;
        let response = provider
            .configure(ConfigureRequest {
                context: self.stop.clone(),
                config,
            })
            .await;

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: encode_diagnostics(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> RpcResult<proto::read_resource::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let resource = self.resource(&req.type_name).await?;

        let Some(current_state) = decode_state(&req.current_state)? else {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_state(None)?),
                diagnostics: vec![],
                private: req.private,
            }));
        };

        tracing::debug!(type_name = %req.type_name, "reading resource");

        let response = resource
            .read(ReadRequest {
                context: self.stop.clone(),
                current_state: current_state.clone(),
            })
            .await;

        // A failed read leaves the recorded state untouched
        let new_state = if response.diagnostics.has_errors() {
            Some(current_state)
        } else {
            response.state
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_state(
                new_state.map(|s| conform_to_schema(s, &schema)).as_ref(),
            )?),
            diagnostics: encode_diagnostics(response.diagnostics),
            private: req.private,
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> RpcResult<proto::plan_resource_change::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;

        let prior_state = decode_state(&req.prior_state)?;
        let proposed_new_state = decode_state(&req.proposed_new_state)?;
        let config = decode_state(&req.config)?.unwrap_or_default();

        let Some(proposed_new_state) = proposed_new_state else {
            // Destroy
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: Some(encode_state(None)?),
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
            }));
        };

        let plan = plan_change(&schema, prior_state.as_ref(), proposed_new_state, &config);

        tracing::debug!(
            type_name = %req.type_name,
            create = prior_state.is_none(),
            replace = plan.requires_replace.len(),
            "planned resource change"
        );

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_state(Some(&plan.planned_state))?),
            requires_replace: plan
                .requires_replace
                .into_iter()
                .map(attribute_path)
                .collect(),
            planned_private: req.prior_private,
            diagnostics: encode_diagnostics(plan.diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> RpcResult<proto::apply_resource_change::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let resource = self.resource(&req.type_name).await?;

        let prior_state = decode_state(&req.prior_state)?;
        let planned_state = decode_state(&req.planned_state)?;
        let config = decode_state(&req.config)?.unwrap_or_default();
        let context = self.stop.clone();

        let (new_state, diagnostics) = match (prior_state, planned_state) {
            (None, Some(planned_state)) => {
                tracing::debug!(type_name = %req.type_name, "creating resource");
                let response = resource
                    .create(CreateRequest {
                        context,
                        config,
                        planned_state,
                    })
                    .await;
                // Nothing exists remotely if create failed
                let state = (!response.diagnostics.has_errors()).then_some(response.state);
                (state, response.diagnostics)
            }
            (Some(current_state), None) => {
                tracing::debug!(type_name = %req.type_name, "deleting resource");
                let response = resource
                    .delete(DeleteRequest {
                        context,
                        current_state: current_state.clone(),
                    })
                    .await;
                let state = response
                    .diagnostics
                    .has_errors()
                    .then_some(current_state);
                (state, response.diagnostics)
            }
            (Some(current_state), Some(planned_state)) => {
                tracing::debug!(type_name = %req.type_name, "updating resource");
                let response = resource
                    .update(UpdateRequest {
                        context,
                        config,
                        planned_state,
                        current_state: current_state.clone(),
                    })
                    .await;
                if response.diagnostics.has_errors() {
                    (Some(current_state), response.diagnostics)
                } else {
                    (Some(response.state), response.diagnostics)
                }
            }
            (None, None) => (None, Diagnostics::new()),
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_state(
                new_state.map(|s| conform_to_schema(s, &schema)).as_ref(),
            )?),
            private: req.planned_private,
            diagnostics: encode_diagnostics(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> RpcResult<proto::import_resource_state::Response> {
        let req = request.into_inner();
        let schema = self.resource_schema(&req.type_name).await?;
        let resource = self.resource(&req.type_name).await?;

        tracing::debug!(type_name = %req.type_name, id = %req.id, "importing resource");

        let response = resource
            .import_state(ImportRequest {
                context: self.stop.clone(),
                id: req.id,
            })
            .await;

        let imported_resources = match response.state {
            Some(state) if !response.diagnostics.has_errors() => {
                vec![proto::import_resource_state::ImportedResource {
                    type_name: req.type_name,
                    state: Some(encode_state(Some(&conform_to_schema(state, &schema)))?),
                    private: vec![],
                }]
            }
            _ => vec![],
        };

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: encode_diagnostics(response.diagnostics),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> RpcResult<proto::read_data_source::Response> {
        let req = request.into_inner();
        let schema = self.data_source_schema(&req.type_name).await?;
        let config = decode_state(&req.config)?.unwrap_or_default();

        let data_source = {
            let provider = self.provider.read().await;
            provider.create_data_source(&req.type_name).await?
        };

        tracing::debug!(type_name = %req.type_name, "reading data source");

        let response = data_source
            .read(DataSourceReadRequest {
                context: self.stop.clone(),
                config,
            })
            .await;

        let state = if response.diagnostics.has_errors() {
            None
        } else {
            response.state.map(|s| conform_to_schema(s, &schema))
        };

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_state(state.as_ref())?),
            diagnostics: encode_diagnostics(response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> RpcResult<proto::stop_provider::Response> {
        tracing::info!("stop requested, cancelling in-flight operations");
        self.stop.cancel();

        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

struct PlannedChange {
    planned_state: State,
    requires_replace: Vec<String>,
    diagnostics: Diagnostics,
}

/// Computes the planned state for a create or update
///
/// Defaults fill null optional+computed attributes, remaining null computed
/// attributes become unknown when anything changes, then plan modifiers run
/// per attribute in name order. Replacement is never requested on create.
fn plan_change(
    schema: &Schema,
    prior_state: Option<&State>,
    proposed_new_state: State,
    config: &Config,
) -> PlannedChange {
    let mut planned_state = proposed_new_state;
    let mut requires_replace = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for attr in schema.sorted_attributes() {
        let Some(default) = &attr.default else {
            continue;
        };
        if attr.optional && attr.computed && config.get(&attr.name).is_null() {
            let response = default.default_value(DefaultRequest {
                attribute_path: attr.name.clone(),
            });
            planned_state.set(attr.name.clone(), response.value);
        }
    }

    let changed = prior_state.map_or(true, |prior| *prior != planned_state);
    if changed {
        for attr in schema.sorted_attributes() {
            if attr.computed && attr.default.is_none() && config.get(&attr.name).is_null() {
                planned_state.set(attr.name.clone(), Dynamic::Unknown);
            }
        }
    }

    for attr in schema.sorted_attributes() {
        if attr.plan_modifiers.is_empty() {
            continue;
        }

        let state_value = prior_state
            .map(|prior| prior.get(&attr.name).clone())
            .unwrap_or(Dynamic::Null);
        let config_value = config.get(&attr.name).clone();
        let mut plan_value = planned_state.get(&attr.name).clone();
        let mut replace = false;

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify_plan(PlanModifyRequest {
                state: state_value.clone(),
                plan: plan_value,
                config: config_value.clone(),
                attribute_path: attr.name.clone(),
            });
            plan_value = response.plan_value;
            replace |= response.requires_replace;
            diagnostics.extend(response.diagnostics);
        }

        if replace && prior_state.is_some() {
            requires_replace.push(attr.name.clone());
        }
        planned_state.set(attr.name.clone(), plan_value);
    }

    PlannedChange {
        planned_state,
        requires_replace,
        diagnostics,
    }
}

/// Checks a configuration object against its schema
fn validate_config(schema: &Schema, config: &Config) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    for attr in schema.sorted_attributes() {
        if attr.required && config.get(&attr.name).is_null() {
            diagnostics.add_attribute_error(
                &attr.name,
                format!("Missing required field: {}", attr.name),
                format!("The field '{}' is required but was not provided", attr.name),
            );
        }
    }

    let mut fields: Vec<(&String, &Dynamic)> = config.values.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, value) in fields {
        match schema.attributes.get(name) {
            Some(attr) => {
                if !attr.r#type.accepts(value) {
                    diagnostics.add_attribute_error(
                        name,
                        format!("Type mismatch for field: {}", name),
                        format!(
                            "Field '{}' expects type {} but got {}",
                            name,
                            attr.r#type.to_json(),
                            value.type_name()
                        ),
                    );
                } else if attr.computed && !attr.optional && !attr.required && !value.is_null() {
                    diagnostics.add_attribute_error(
                        name,
                        format!("Value for unconfigurable attribute: {}", name),
                        format!("The field '{}' is computed and cannot be set", name),
                    );
                }
            }
            None => {
                diagnostics.add_attribute_error(
                    name,
                    format!("Unknown field: {}", name),
                    format!("The field '{}' is not defined in the schema", name),
                );
            }
        }
    }

    diagnostics
}

/// Drops attributes the schema does not know and nulls the missing ones
fn conform_to_schema(state: State, schema: &Schema) -> State {
    let mut values = state.values;
    values.retain(|name, _| schema.attributes.contains_key(name));
    for name in schema.attributes.keys() {
        values.entry(name.clone()).or_insert(Dynamic::Null);
    }
    State { values }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: true,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.version,
            attributes: schema
                .sorted_attributes()
                .into_iter()
                .map(|attr| proto::schema::Attribute {
                    name: attr.name.clone(),
                    r#type: attr.r#type.to_bytes(),
                    description: attr.description.clone(),
                    required: attr.required,
                    optional: attr.optional,
                    computed: attr.computed,
                    sensitive: attr.sensitive,
                    description_kind: proto::StringKind::Plain as i32,
                    deprecated: false,
                })
                .collect(),
            description: schema.description.clone(),
            description_kind: proto::StringKind::Plain as i32,
            deprecated: false,
        }),
    }
}

#[allow(clippy::result_large_err)]
fn decode_state(value: &Option<proto::DynamicValue>) -> std::result::Result<Option<State>, Status> {
    let Some(value) = value else {
        return Ok(None);
    };

    let state = if !value.msgpack.is_empty() {
        State::from_msgpack(&value.msgpack)?
    } else {
        State::from_json(&value.json)?
    };
    Ok(state)
}

/// `None` encodes the null object Terraform expects for absent resources
#[allow(clippy::result_large_err)]
fn encode_state(state: Option<&State>) -> std::result::Result<proto::DynamicValue, Status> {
    let msgpack = match state {
        Some(state) => state.to_msgpack()?,
        None => null_msgpack()?,
    };

    Ok(proto::DynamicValue {
        msgpack,
        json: vec![],
    })
}

fn attribute_path(name: String) -> proto::AttributePath {
    proto::AttributePath {
        steps: vec![Step {
            selector: Some(Selector::AttributeName(name)),
        }],
    }
}

fn encode_diagnostic(diag: Diagnostic, severity: proto::diagnostic::Severity) -> proto::Diagnostic {
    proto::Diagnostic {
        severity: severity as i32,
        summary: diag.summary,
        detail: diag.detail.unwrap_or_default(),
        attribute: diag.attribute.map(attribute_path),
    }
}

fn encode_diagnostics(diags: Diagnostics) -> Vec<proto::Diagnostic> {
    diags
        .errors
        .into_iter()
        .map(|d| encode_diagnostic(d, proto::diagnostic::Severity::Error))
        .chain(
            diags
                .warnings
                .into_iter()
                .map(|d| encode_diagnostic(d, proto::diagnostic::Severity::Warning)),
        )
        .collect()
}

//! Default storage bucket resource
//!
//! The default bucket is provisioned by Firebase alongside the project, so
//! this resource only tracks it: create adopts whatever exists, read refreshes
//! it and delete forgets it without touching the remote side.

use crate::api::{default_bucket_id, ApiError, Client};
use async_trait::async_trait;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ImportRequest, ImportResponse,
    ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
use tfplug::{AttributeBuilder, Diagnostics, Resource, Schema, SchemaBuilder, State};

pub const TYPE_NAME: &str = "firebase_default_bucket";
pub const DEFAULT_LOCATION: &str = "us";

pub struct DefaultBucketResource {
    client: Client,
}

impl DefaultBucketResource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description("Tracks the default Cloud Storage bucket of a Firebase project")
            .attribute(
                AttributeBuilder::string("id")
                    .computed()
                    .description("Identifier of the default bucket, projects/{project}/defaultBucket")
                    .plan_modifier(UseStateForUnknown),
            )
            .attribute(
                AttributeBuilder::string("project")
                    .required()
                    .description("Firebase project ID")
                    .plan_modifier(RequiresReplace),
            )
            .attribute(
                AttributeBuilder::string("bucket_name")
                    .computed()
                    .description("Name reported by Firebase Storage; empty when no default bucket exists")
                    .plan_modifier(UseStateForUnknown),
            )
            .attribute(
                AttributeBuilder::string("location")
                    .optional()
                    .description(
                        "Location of the default bucket; on import, taken from an @{location} suffix of the ID",
                    )
                    .default(StaticDefault::string(DEFAULT_LOCATION))
                    .plan_modifier(RequiresReplace),
            )
            .build()
    }
}

fn api_error(diagnostics: &mut Diagnostics, summary: &str, err: ApiError) {
    diagnostics.add_error(summary, Some(err.to_string()));
}

/// Import ID parts: project and optional location
#[derive(Debug, PartialEq)]
struct ImportId<'a> {
    project: &'a str,
    location: Option<&'a str>,
}

/// Accepts `projects/{project}/defaultBucket` or a bare project ID, either
/// optionally followed by `@{location}`
fn parse_import_id(id: &str) -> Option<ImportId<'_>> {
    let (id, location) = match id.rsplit_once('@') {
        Some((_, "")) => return None,
        Some((id, location)) => (id, Some(location)),
        None => (id, None),
    };

    let project = match id.strip_prefix("projects/") {
        Some(rest) => rest.strip_suffix("/defaultBucket")?,
        None => id,
    };

    if project.is_empty() || project.contains('/') || project.contains('@') {
        None
    } else {
        Some(ImportId { project, location })
    }
}

#[async_trait]
impl Resource for DefaultBucketResource {
    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diagnostics = Diagnostics::new();
        let mut state = request.planned_state;

        let project = match request.config.get_string("project") {
            Some(project) => project.to_string(),
            None => {
                diagnostics.add_attribute_error(
                    "project",
                    "Missing project",
                    "project must be set to a known value",
                );
                return CreateResponse { state, diagnostics };
            }
        };

        let probe = match self
            .client
            .storage()
            .probe_default_bucket(&request.context, &project)
            .await
        {
            Ok(probe) => probe,
            Err(e) => {
                api_error(&mut diagnostics, "Failed to check default bucket", e);
                return CreateResponse { state, diagnostics };
            }
        };

        if !probe.exists {
            // Provisioning needs an API this provider does not call
            tracing::warn!(
                project = %project,
                "default bucket does not exist; tracking it without creating it"
            );
        }

        let location = request
            .config
            .get_string("location")
            .or_else(|| state.get_string("location"))
            .unwrap_or(DEFAULT_LOCATION)
            .to_string();

        state.set_string("id", default_bucket_id(&project));
        state.set_string("project", project);
        state.set_string("bucket_name", probe.remote_name);
        state.set_string("location", location);

        CreateResponse { state, diagnostics }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diagnostics = Diagnostics::new();
        let mut state = request.current_state;

        let project = match state.get_string("project") {
            Some(project) => project.to_string(),
            None => {
                diagnostics.add_error("Missing project in state", None::<String>);
                return ReadResponse {
                    state: Some(state),
                    diagnostics,
                };
            }
        };

        match self
            .client
            .storage()
            .probe_default_bucket(&request.context, &project)
            .await
        {
            Ok(probe) if !probe.exists => {
                tracing::debug!(project = %project, "default bucket gone, removing from state");
                ReadResponse {
                    state: None,
                    diagnostics,
                }
            }
            Ok(probe) => {
                state.set_string("id", default_bucket_id(&project));
                state.set_string("bucket_name", probe.remote_name);
                ReadResponse {
                    state: Some(state),
                    diagnostics,
                }
            }
            Err(e) => {
                api_error(&mut diagnostics, "Failed to check default bucket", e);
                ReadResponse {
                    state: Some(state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        let mut diagnostics = Diagnostics::new();
        diagnostics.add_error(
            "Update not supported",
            Some("Every configurable attribute of firebase_default_bucket forces replacement"),
        );
        UpdateResponse {
            state: request.current_state,
            diagnostics,
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        tracing::debug!(
            id = request.current_state.get_string("id").unwrap_or_default(),
            "removing default bucket from state; remote bucket is left in place"
        );
        DeleteResponse::default()
    }

    async fn import_state(&self, request: ImportRequest) -> ImportResponse {
        let mut diagnostics = Diagnostics::new();

        let Some(import_id) = parse_import_id(&request.id) else {
            diagnostics.add_error(
                "Invalid import ID",
                Some(format!(
                    "Expected projects/{{project}}/defaultBucket or a project ID, optionally followed by @{{location}}, got '{}'",
                    request.id
                )),
            );
            return ImportResponse {
                state: None,
                diagnostics,
            };
        };

        let mut state = State::new();
        state.set_string("id", default_bucket_id(import_id.project));
        state.set_string("project", import_id.project);
        state.set_string("location", import_id.location.unwrap_or(DEFAULT_LOCATION));

        ImportResponse {
            state: Some(state),
            diagnostics,
        }
    }
}

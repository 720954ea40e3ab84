//! Firebase Storage default bucket API

use super::client::Client;
use super::error::ApiError;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tfplug::Context;

const API_VERSION: &str = "v1alpha";

/// Response from GET /v1alpha/projects/{project}/defaultBucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultBucket {
    /// Resource name, `projects/{project}/defaultBucket`
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The underlying Cloud Storage bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<BucketRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketRef {
    #[serde(default)]
    pub name: String,
}

/// Outcome of probing a project for its default bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketProbe {
    pub exists: bool,
    /// Empty when the bucket does not exist
    pub remote_name: String,
}

impl From<Option<DefaultBucket>> for BucketProbe {
    fn from(bucket: Option<DefaultBucket>) -> Self {
        match bucket {
            Some(bucket) => Self {
                exists: true,
                remote_name: bucket.name,
            },
            None => Self::default(),
        }
    }
}

/// Identifier under which a project's default bucket is tracked
pub fn default_bucket_id(project: &str) -> String {
    format!("projects/{}/defaultBucket", project)
}

pub struct StorageApi<'a> {
    client: &'a Client,
}

impl<'a> StorageApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn default_bucket_url(&self, project: &str) -> String {
        format!(
            "{}/{}/projects/{}/defaultBucket",
            self.client.base_url(),
            API_VERSION,
            urlencoding::encode(project)
        )
    }

    /// Fetch the default bucket of `project`
    ///
    /// Returns `Ok(None)` when the API answers 404. Any status other than
    /// 200 or 404 is an error.
    pub async fn get_default_bucket(
        &self,
        ctx: &Context,
        project: &str,
    ) -> Result<Option<DefaultBucket>, ApiError> {
        let url = self.default_bucket_url(project);
        let response = self
            .client
            .request(ctx, Method::GET, &url, None::<&()>)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!(project, "default bucket not found");
                Ok(None)
            }
            StatusCode::OK => {
                let body = response.text().await?;
                let bucket: DefaultBucket =
                    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
                tracing::debug!(project, name = %bucket.name, "default bucket found");
                Ok(Some(bucket))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(project, status = status.as_u16(), body = %body, "unexpected response");
                Err(ApiError::UnexpectedStatus {
                    status: status.as_u16(),
                })
            }
        }
    }

    /// Report whether `project` has a default bucket, without modifying it
    pub async fn probe_default_bucket(
        &self,
        ctx: &Context,
        project: &str,
    ) -> Result<BucketProbe, ApiError> {
        self.get_default_bucket(ctx, project).await.map(BucketProbe::from)
    }
}

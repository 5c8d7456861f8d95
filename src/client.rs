//! User, organization, and project API wrappers.
//!
//! [`AtlasClient`] holds the authenticated transport and exposes the thin
//! request/response calls the project facade builds on: user lookup,
//! organization resolution, and project CRUD. None of these carry client
//! state beyond the transport itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::Credentials;
use crate::error::{AtlasError, Result};
use crate::models::{Modality, ProjectMeta};
use crate::transport::{ApiResponse, HttpTransport, Transport};

/// An authenticated Atlas API client.
#[derive(Clone)]
pub struct AtlasClient {
    transport: Arc<dyn Transport>,
    web_base: String,
}

/// An organization the current user belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub nickname: String,
    pub organization_id: String,
}

/// Request body for `POST /v1/project/create`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest {
    pub organization_id: String,
    pub project_name: String,
    pub description: String,
    pub unique_id_field: String,
    pub modality: Modality,
    pub is_public: bool,
}

impl AtlasClient {
    /// Build a client over HTTPS from credentials.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new(credentials)?),
            web_base: credentials.web_base(),
        })
    }

    /// Build a client over an arbitrary transport. The seam used by tests.
    pub fn with_transport(transport: Arc<dyn Transport>, web_base: impl Into<String>) -> Self {
        Self {
            transport,
            web_base: web_base.into(),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Base URL of the Atlas web frontend (for map links).
    pub fn web_base(&self) -> &str {
        &self.web_base
    }

    /// Fetch the current user, verifying the token along the way.
    pub async fn current_user(&self) -> Result<serde_json::Value> {
        let response = self.transport.get("/v1/user").await?;
        if !response.is_success() {
            return Err(AtlasError::AuthInvalid);
        }
        response.json().ok_or(AtlasError::AuthInvalid)
    }

    /// The current user's default organization: the one they own.
    pub async fn default_organization(&self) -> Result<Organization> {
        let user = self.current_user().await?;
        let sub = user.get("sub").and_then(|s| s.as_str()).unwrap_or_default();
        let organizations = user
            .get("organizations")
            .and_then(|o| o.as_array())
            .cloned()
            .unwrap_or_default();

        for org in &organizations {
            let owned = org.get("user_id").and_then(|u| u.as_str()) == Some(sub)
                && org.get("access_role").and_then(|r| r.as_str()) == Some("OWNER");
            if owned {
                return serde_json::from_value(org.clone()).map_err(AtlasError::from);
            }
        }
        Err(AtlasError::Api {
            status: 200,
            message: "current user has no owned organization".to_string(),
        })
    }

    /// Resolve an organization id by name, falling back to the user's
    /// default organization when no name is given.
    pub async fn resolve_organization(&self, name: Option<&str>) -> Result<Organization> {
        let Some(name) = name else {
            return self.default_organization().await;
        };
        let response = self
            .transport
            .get(&format!("/v1/organization/search/{}", name))
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("no such organization: {}", name),
            });
        }
        let body = response.json().ok_or_else(|| invalid_body(&response))?;
        let organization_id = body
            .get("organization_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid_body(&response))?
            .to_string();
        Ok(Organization {
            nickname: name.to_string(),
            organization_id,
        })
    }

    /// Create a project. The server answers 201 with the new project id.
    pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<String> {
        info!(
            "creating project `{}` in organization `{}`",
            request.project_name, request.organization_id
        );
        let body = serde_json::to_value(request)?;
        let response = self.transport.post_json("/v1/project/create", &body).await?;
        if response.status != 201 {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("failed to create project: {}", response.detail()),
            });
        }
        let body = response.json().ok_or_else(|| invalid_body(&response))?;
        body.get("project_id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| invalid_body(&response))
    }

    /// Fetch a project's current state by id.
    pub async fn project_by_id(&self, project_id: &str) -> Result<ProjectMeta> {
        let response = self
            .transport
            .get(&format!("/v1/project/{}", project_id))
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!(
                    "could not access project {}: {}",
                    project_id,
                    response.detail()
                ),
            });
        }
        let body = response.json().ok_or_else(|| invalid_body(&response))?;
        serde_json::from_value(body).map_err(AtlasError::from)
    }

    /// Look up an existing project by name within an organization. Returns
    /// `None` when no project with that name exists.
    pub async fn find_project_by_name(
        &self,
        project_name: &str,
        organization_name: &str,
    ) -> Result<Option<String>> {
        let body = serde_json::json!({
            "organization_name": organization_name,
            "project_name": project_name,
        });
        let response = self
            .transport
            .post_json("/v1/project/search/name", &body)
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("failed to find project: {}", response.detail()),
            });
        }
        let body = response.json().ok_or_else(|| invalid_body(&response))?;
        let first = body
            .get("results")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|p| p.get("id"))
            .and_then(|id| id.as_str())
            .map(String::from);
        Ok(first)
    }

    /// Delete a project and all of its data.
    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        let body = serde_json::json!({ "project_id": project_id });
        let response = self.transport.post_json("/v1/project/remove", &body).await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("failed to delete project: {}", response.detail()),
            });
        }
        Ok(())
    }

    /// Fetch the state of an index build job.
    pub async fn index_job(&self, job_id: &str) -> Result<serde_json::Value> {
        let response = self
            .transport
            .get(&format!("/v1/project/index/job/{}", job_id))
            .await?;
        if !response.is_success() {
            return Err(AtlasError::Api {
                status: response.status,
                message: format!("could not access job state: {}", response.detail()),
            });
        }
        response.json().ok_or_else(|| invalid_body(&response))
    }
}

pub(crate) fn invalid_body(response: &ApiResponse) -> AtlasError {
    AtlasError::Api {
        status: response.status,
        message: format!("unexpected response body: {}", response.body),
    }
}

//! `reqwest` implementation of [`ProjectsApi`] and [`AuthApi`].

use crate::{ApiError, AuthApi, ModelUpload, ParamsUpdate, ProjectsApi, SessionHooks};
use async_trait::async_trait;
use quote_core::{NewProject, Project, ProjectId, User};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Connection settings for the projects service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Service root, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout. `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: None,
        }
    }
}

/// Error payload produced by the service's exception handlers.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

pub struct HttpProjectsApi {
    base: Url,
    client: reqwest::Client,
    hooks: Arc<dyn SessionHooks>,
}

impl HttpProjectsApi {
    pub fn new(config: &ApiConfig, hooks: Arc<dyn SessionHooks>) -> Result<Self, ApiError> {
        let base = Url::parse(config.base_url.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(format!("client setup failed: {e}")))?;
        Ok(Self {
            base,
            client,
            hooks,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        let req = self.client.request(method, url);
        Ok(match self.hooks.bearer_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    async fn dispatch(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: ErrorBody = resp
            .bytes()
            .await
            .ok()
            .and_then(|b| serde_json::from_slice(&b).ok())
            .unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("session rejected by projects service, clearing local session");
                self.hooks.on_unauthorized();
                Err(ApiError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
            other => Err(ApiError::Status {
                status: other.as_u16(),
                code: body.error_code,
                message,
            }),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.dispatch(req).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(format!("read body failed: {e}")))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProjectsApi for HttpProjectsApi {
    #[instrument(skip(self))]
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let req = self.request(Method::GET, &["projects", ""])?;
        self.send_json(req).await
    }

    #[instrument(skip(self, new), fields(title = %new.title))]
    async fn create_project(&self, new: &NewProject) -> Result<Project, ApiError> {
        let req = self.request(Method::POST, &["projects", ""])?.json(new);
        self.send_json(req).await
    }

    #[instrument(skip(self), fields(project_id = %id))]
    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError> {
        let req = self.request(Method::GET, &["projects", &id.0])?;
        self.send_json(req).await
    }

    #[instrument(skip(self), fields(project_id = %id))]
    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &["projects", &id.0])?;
        self.dispatch(req).await?;
        Ok(())
    }

    #[instrument(skip(self, update), fields(project_id = %id))]
    async fn update_params(&self, id: &ProjectId, update: &ParamsUpdate) -> Result<Project, ApiError> {
        let req = self
            .request(Method::PUT, &["projects", &id.0, "params"])?
            .json(update);
        self.send_json(req).await
    }

    #[instrument(skip(self, file), fields(project_id = %id, file = %file.file_name, size = file.bytes.len()))]
    async fn upload_file(&self, id: &ProjectId, file: ModelUpload) -> Result<Project, ApiError> {
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        let form = Form::new().part("file", part);
        let req = self
            .request(Method::POST, &["projects", &id.0, "upload"])?
            .multipart(form);
        let project: Project = self.send_json(req).await?;
        debug!(status = %project.file_status, "model uploaded");
        Ok(project)
    }

    #[instrument(skip(self), fields(project_id = %id))]
    async fn generate_ai(&self, id: &ProjectId) -> Result<Project, ApiError> {
        let req = self.request(Method::POST, &["projects", &id.0, "generate-ai"])?;
        self.send_json(req).await
    }
}

#[async_trait]
impl AuthApi for HttpProjectsApi {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<User, ApiError> {
        let req = self.request(Method::GET, &["auth", "me"])?;
        self.send_json(req).await
    }
}

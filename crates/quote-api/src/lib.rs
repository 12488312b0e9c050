#![deny(warnings)]

//! Client side of the projects service.
//!
//! The service owns storage, file analysis and AI text generation; this
//! crate only describes the calls the dashboard makes ([`ProjectsApi`]) and
//! provides the HTTP implementation ([`HttpProjectsApi`]).

use async_trait::async_trait;
use quote_core::{CostBreakdown, NewProject, ProductionParameters, Project, ProjectId, User};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod http;

pub use http::{ApiConfig, HttpProjectsApi};

/// Errors returned by projects service calls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// The session is no longer valid. The local session has already been cleared.
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request failed with status {status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Body of `PUT /projects/{id}/params`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamsUpdate {
    pub production_params: ProductionParameters,
    pub calculated_results: CostBreakdown,
}

/// A model file to upload.
#[derive(Clone, Debug)]
pub struct ModelUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ModelUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Lowercase extension without the dot, e.g. "stl".
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Model formats the analysis service accepts.
pub const SUPPORTED_MODEL_EXTENSIONS: [&str; 3] = ["stl", "obj", "3mf"];

/// Remote calls made by the dashboard and the project editor.
#[async_trait]
pub trait ProjectsApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError>;
    async fn create_project(&self, new: &NewProject) -> Result<Project, ApiError>;
    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError>;
    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError>;
    /// Persist parameters together with the breakdown they produced.
    async fn update_params(&self, id: &ProjectId, update: &ParamsUpdate) -> Result<Project, ApiError>;
    /// Upload a model; the returned project is normally in `processing`.
    async fn upload_file(&self, id: &ProjectId, file: ModelUpload) -> Result<Project, ApiError>;
    /// Generate AI texts from the saved figures. Requires `file_status == ready`.
    async fn generate_ai(&self, id: &ProjectId) -> Result<Project, ApiError>;
}

/// Account calls made after a token is known.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// The account the bearer token belongs to (`GET /auth/me`).
    async fn current_user(&self) -> Result<User, ApiError>;
}

/// Session seam used by the HTTP client: credentials out, 401 side effect in.
pub trait SessionHooks: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
    /// Called once per unauthorized response, before the error is returned.
    fn on_unauthorized(&self);
}

/// Hooks for unauthenticated use: no token, nothing to clear.
#[derive(Clone, Copy, Debug, Default)]
pub struct Anonymous;

impl SessionHooks for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }

    fn on_unauthorized(&self) {}
}

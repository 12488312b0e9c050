//! Project list operations: refresh, create, delete, open.

use crate::config::ReactorConfig;
use crate::session::{ProjectSession, SessionError};
use crate::store::AppState;
use quote_api::{ApiError, ProjectsApi};
use quote_core::{NewProject, Project, ProjectId};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Dashboard {
    api: Arc<dyn ProjectsApi>,
    store: AppState,
    config: ReactorConfig,
}

impl Dashboard {
    pub fn new(api: Arc<dyn ProjectsApi>, store: AppState, config: ReactorConfig) -> Self {
        Self { api, store, config }
    }

    /// Replace the cached list with the server's.
    pub async fn refresh(&self) -> Result<Vec<Project>, ApiError> {
        let projects = self.api.list_projects().await?;
        info!(count = projects.len(), "project list refreshed");
        self.store.projects().set_all(projects.clone());
        Ok(projects)
    }

    pub async fn create(&self, new: &NewProject) -> Result<Project, ApiError> {
        let project = self.api.create_project(new).await?;
        info!(project_id = %project.id, title = %project.title, "project created");
        self.store.projects().upsert(project.clone());
        Ok(project)
    }

    /// Default title for the next project, "New Project N".
    pub fn next_title(&self) -> String {
        format!("New Project {}", self.store.projects().len() + 1)
    }

    /// Create a project with only the default title.
    pub async fn create_untitled(&self) -> Result<Project, ApiError> {
        self.create(&NewProject::titled(self.next_title())).await
    }

    /// Delete on the server; the cache entry goes only once the server agrees.
    pub async fn delete(&self, id: &ProjectId) -> Result<(), ApiError> {
        self.api.delete_project(id).await?;
        self.store.projects().remove(id);
        info!(project_id = %id, "project deleted");
        Ok(())
    }

    pub async fn open(&self, id: ProjectId) -> Result<ProjectSession, SessionError> {
        ProjectSession::open(Arc::clone(&self.api), self.store.clone(), self.config, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeApi};
    use quote_core::FileStatus;

    fn dashboard(api: Arc<FakeApi>) -> (Dashboard, AppState) {
        let store = AppState::new();
        (Dashboard::new(api, store.clone(), ReactorConfig::default()), store)
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_cache() {
        let api = Arc::new(FakeApi::with_project(Project {
            id: ProjectId::from("p-1"),
            title: "Gear".into(),
            ..Project::default()
        }));
        let (dash, store) = dashboard(api.clone());
        store.projects().upsert(Project {
            id: ProjectId::from("stale"),
            ..Project::default()
        });
        let listed = dash.refresh().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.projects().list(), listed);
        assert_eq!(api.calls(), vec![Call::List]);
    }

    #[tokio::test(start_paused = true)]
    async fn untitled_projects_are_numbered() {
        let api = Arc::new(FakeApi::default());
        let (dash, store) = dashboard(api);
        let first = dash.create_untitled().await.unwrap();
        let second = dash.create_untitled().await.unwrap();
        assert_eq!(first.title, "New Project 1");
        assert_eq!(second.title, "New Project 2");
        assert_eq!(store.projects().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_from_cache_only_on_success() {
        let api = Arc::new(FakeApi::default());
        let (dash, store) = dashboard(api.clone());
        let created = dash
            .create(&NewProject {
                client_name: Some("Acme".into()),
                ..NewProject::titled("Hinge")
            })
            .await
            .unwrap();
        assert_eq!(created.client_name.as_deref(), Some("Acme"));

        let missing = ProjectId::from("ghost");
        store.projects().upsert(Project {
            id: missing.clone(),
            ..Project::default()
        });
        assert!(matches!(dash.delete(&missing).await, Err(ApiError::NotFound(_))));
        assert!(store.projects().get(&missing).is_some());

        dash.delete(&created.id).await.unwrap();
        assert!(store.projects().get(&created.id).is_none());
        assert_eq!(api.count(&Call::Delete), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn open_marks_current_project() {
        let api = Arc::new(FakeApi::with_project(Project {
            id: ProjectId::from("p-1"),
            file_status: FileStatus::Ready,
            volume_mm3: Some(1_000.0),
            ..Project::default()
        }));
        let (dash, store) = dashboard(api);
        let session = dash.open(ProjectId::from("p-1")).await.unwrap();
        assert_eq!(store.projects().current(), Some(ProjectId::from("p-1")));
        assert!(session.results().is_some());
        drop(session);
        assert_eq!(store.projects().current(), None);
    }
}

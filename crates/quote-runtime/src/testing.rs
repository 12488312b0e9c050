//! In-memory projects service for tests.

use async_trait::async_trait;
use quote_api::{ApiError, ModelUpload, ParamsUpdate, ProjectsApi};
use quote_core::{FileStatus, NewProject, Project, ProjectId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    List,
    Create,
    Get,
    Delete,
    Save(ParamsUpdate),
    Upload(String),
    Generate,
}

#[derive(Default)]
pub struct FakeApi {
    /// Server-side records.
    pub projects: Mutex<Vec<Project>>,
    /// Responses for successive `get_project` calls, before falling back to the record.
    pub scripted_gets: Mutex<VecDeque<Result<Project, ApiError>>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_saves: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_generate: AtomicBool,
    pub save_delay: Mutex<Option<Duration>>,
}

impl FakeApi {
    pub fn with_project(project: Project) -> Self {
        let api = Self::default();
        api.projects.lock().unwrap().push(project);
        api
    }

    pub fn script_get(&self, reply: Result<Project, ApiError>) {
        self.scripted_gets.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<ParamsUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Save(u) => Some(u),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    fn store(&self, project: Project) {
        let mut all = self.projects.lock().unwrap();
        match all.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => *slot = project,
            None => all.push(project),
        }
    }
}

fn server_error(message: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        code: Some("internal_error".into()),
        message: message.into(),
    }
}

#[async_trait]
impl ProjectsApi for FakeApi {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.record(Call::List);
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn create_project(&self, new: &NewProject) -> Result<Project, ApiError> {
        self.record(Call::Create);
        let id = format!("p-{}", self.projects.lock().unwrap().len() + 1);
        let project = Project {
            id: ProjectId(id),
            title: new.title.clone(),
            client_name: new.client_name.clone(),
            ..Project::default()
        };
        self.store(project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.record(Call::Get);
        let scripted = self.scripted_gets.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => self.find(id),
        }
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError> {
        self.record(Call::Delete);
        self.find(id)?;
        self.projects.lock().unwrap().retain(|p| &p.id != id);
        Ok(())
    }

    async fn update_params(&self, id: &ProjectId, update: &ParamsUpdate) -> Result<Project, ApiError> {
        self.record(Call::Save(update.clone()));
        let delay = *self.save_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(server_error("database unavailable"));
        }
        let mut project = self.find(id)?;
        project.set_committed(&update.production_params, &update.calculated_results);
        self.store(project.clone());
        Ok(project)
    }

    async fn upload_file(&self, id: &ProjectId, file: ModelUpload) -> Result<Project, ApiError> {
        self.record(Call::Upload(file.file_name.clone()));
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(server_error("disk full"));
        }
        let mut project = self.find(id)?;
        project.file_path = Some(format!("uploads/{}/{}", id, file.file_name));
        project.file_status = FileStatus::Processing;
        self.store(project.clone());
        Ok(project)
    }

    async fn generate_ai(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.record(Call::Generate);
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 502,
                code: Some("ai_service_error".into()),
                message: "AI Service is not configured".into(),
            });
        }
        let mut project = self.find(id)?;
        let price = project
            .calculated_results
            .as_ref()
            .map(|r| r.total_unit_price)
            .unwrap_or_default();
        project.ai_description = Some(format!("Printed part quoted at {price:.2}"));
        project.ai_commercial_text = Some("Ready for production.".into());
        self.store(project.clone());
        Ok(project)
    }
}

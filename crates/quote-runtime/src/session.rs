//! Project editing session.
//!
//! A [`ProjectSession`] owns the editable parameters of one open project. Every
//! change recomputes the cost breakdown synchronously; persistence trails
//! behind on a debounce timer so a burst of edits becomes one save. While the
//! uploaded model is being analyzed the session polls the service for the
//! geometry. Saves are single-flight: the autosave path and the forced save
//! before AI generation queue on the same lock.
//!
//! Field ownership on the cached project record: polling and uploads write the
//! geometry group, saves write the parameter group, generation writes the AI
//! texts. No writer copies another group from a server response.

use crate::config::ReactorConfig;
use crate::store::AppState;
use quote_api::{ApiError, ModelUpload, ParamsUpdate, ProjectsApi, SUPPORTED_MODEL_EXTENSIONS};
use quote_core::{
    CostBreakdown, FileStatus, ParamField, ProductionParameters, Project, ProjectId,
    ValidationError,
};
use quote_econ::calculate;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 64;

/// Persistence state of the local edits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveState {
    #[default]
    Idle,
    /// Edits not yet saved; a save is scheduled or waiting for a volume.
    Dirty,
    Saving,
    /// Last save was rejected. Local edits are kept.
    SaveFailed,
}

/// Notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    ResultsChanged,
    SaveStarted { revision: u64 },
    Saved { revision: u64 },
    SaveFailed { message: String },
    GeometryUpdated { status: FileStatus },
    UploadFailed { message: String },
    GenerationCompleted,
    GenerationFailed { message: String },
    /// The status poller exited on its own (analysis finished, or it gave up).
    PollingStopped,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load project: {0}")]
    Load(#[source] ApiError),
    #[error("failed to save parameters: {0}")]
    Persistence(#[source] ApiError),
    #[error("upload failed: {0}")]
    Upload(#[source] ApiError),
    #[error("unsupported model file {0:?}; expected .stl, .obj or .3mf")]
    UnsupportedFile(String),
    #[error("AI generation needs an analyzed model (file status is {status})")]
    GenerationPrecondition { status: FileStatus },
    #[error("AI generation is already running")]
    GenerationInProgress,
    #[error("no cost breakdown yet: the model volume is unknown")]
    NotComputable,
    #[error("AI generation failed: {0}")]
    Generation(#[source] ApiError),
    #[error(transparent)]
    Edit(#[from] ValidationError),
    #[error("session is closed")]
    Closed,
}

/// Point-in-time copy of everything the editor view renders.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub project: Project,
    pub params: ProductionParameters,
    pub results: Option<CostBreakdown>,
    pub save_state: SaveState,
    /// Bumped by every parameter edit and every newly arrived volume.
    pub revision: u64,
    /// Highest revision confirmed by the service.
    pub saved_revision: u64,
    pub uploading: bool,
    pub generating: bool,
}

struct EditorState {
    project: Project,
    params: ProductionParameters,
    results: Option<CostBreakdown>,
    save: SaveState,
    revision: u64,
    saved_revision: u64,
    uploading: bool,
    generating: bool,
}

impl EditorState {
    fn recompute(&mut self) {
        self.results = calculate(&self.params, self.project.volume_mm3);
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.save = SaveState::Dirty;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            project: self.project.clone(),
            params: self.params.clone(),
            results: self.results.clone(),
            save_state: self.save,
            revision: self.revision,
            saved_revision: self.saved_revision,
            uploading: self.uploading,
            generating: self.generating,
        }
    }
}

#[derive(Default)]
struct Timers {
    debounce: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    closed: bool,
}

struct Shared {
    id: ProjectId,
    api: Arc<dyn ProjectsApi>,
    store: AppState,
    config: ReactorConfig,
    // Never held together with `timers`.
    state: Mutex<EditorState>,
    timers: Mutex<Timers>,
    save_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&self, project: Project) {
        self.store.projects().upsert(project);
    }

    fn is_closed(&self) -> bool {
        lock(&self.timers).closed
    }

    fn schedule_save(self: &Arc<Self>) {
        let mut timers = lock(&self.timers);
        if timers.closed {
            return;
        }
        let shared = Arc::clone(self);
        let delay = self.config.autosave_debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so a later reschedule cannot cancel a request in flight.
            tokio::spawn(shared.autosave());
        });
        if let Some(previous) = timers.debounce.replace(timer) {
            previous.abort();
        }
    }

    fn cancel_debounce(&self) {
        if let Some(timer) = lock(&self.timers).debounce.take() {
            timer.abort();
        }
    }

    async fn autosave(self: Arc<Self>) {
        match self.persist(false).await {
            Ok(Some(revision)) => debug!(project_id = %self.id, revision, "autosave complete"),
            Ok(None) => debug!(project_id = %self.id, "autosave skipped, no breakdown yet"),
            Err(e) => debug!(project_id = %self.id, error = %e, "autosave failed"),
        }
    }

    /// Save parameters with the breakdown they produce.
    ///
    /// Returns the saved revision, or `None` when there is no breakdown to
    /// save. Without `force`, an already saved revision is not sent again.
    async fn persist(&self, force: bool) -> Result<Option<u64>, SessionError> {
        let _flight = self.save_lock.lock().await;
        let (update, revision) = {
            let mut st = lock(&self.state);
            let Some(results) = st.results.clone() else {
                return Ok(None);
            };
            if !force && st.saved_revision == st.revision {
                st.save = SaveState::Idle;
                return Ok(Some(st.revision));
            }
            st.save = SaveState::Saving;
            let update = ParamsUpdate {
                production_params: st.params.clone(),
                calculated_results: results,
            };
            (update, st.revision)
        };
        self.emit(SessionEvent::SaveStarted { revision });

        match self.api.update_params(&self.id, &update).await {
            Ok(_) => {
                let project = {
                    let mut st = lock(&self.state);
                    st.project
                        .set_committed(&update.production_params, &update.calculated_results);
                    st.saved_revision = st.saved_revision.max(revision);
                    st.save = if st.revision == revision {
                        SaveState::Idle
                    } else {
                        SaveState::Dirty
                    };
                    st.project.clone()
                };
                self.publish(project);
                info!(project_id = %self.id, revision, "parameters saved");
                self.emit(SessionEvent::Saved { revision });
                Ok(Some(revision))
            }
            Err(e) => {
                {
                    let mut st = lock(&self.state);
                    st.save = if st.revision == revision {
                        SaveState::SaveFailed
                    } else {
                        SaveState::Dirty
                    };
                }
                warn!(project_id = %self.id, revision, error = %e, "saving parameters failed");
                self.emit(SessionEvent::SaveFailed {
                    message: e.to_string(),
                });
                Err(SessionError::Persistence(e))
            }
        }
    }

    /// Merge the geometry group from a server record. Returns true while still processing.
    fn apply_geometry(self: &Arc<Self>, remote: &Project) -> bool {
        let (status, status_changed, volume_changed, volume_arrived, project) = {
            let mut st = lock(&self.state);
            let previous_status = st.project.file_status;
            let volume_changed = st.project.merge_geometry(remote);
            if volume_changed {
                st.recompute();
            }
            let volume_arrived = volume_changed && st.project.volume_mm3.is_some();
            if volume_arrived {
                st.touch();
            }
            (
                st.project.file_status,
                previous_status != st.project.file_status,
                volume_changed,
                volume_arrived,
                st.project.clone(),
            )
        };
        self.publish(project);
        if status_changed {
            info!(project_id = %self.id, %status, "model status changed");
            self.emit(SessionEvent::GeometryUpdated { status });
        }
        if volume_changed {
            self.emit(SessionEvent::ResultsChanged);
        }
        if volume_arrived {
            self.schedule_save();
        }
        status == FileStatus::Processing
    }

    fn ensure_polling(self: &Arc<Self>) {
        if !lock(&self.state).project.is_processing() {
            return;
        }
        let mut timers = lock(&self.timers);
        if timers.closed || timers.poller.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let shared = Arc::clone(self);
        let every = self.config.poll_interval;
        timers.poller = Some(tokio::spawn(shared.poll(every)));
    }

    async fn poll(self: Arc<Self>, every: Duration) {
        match Instant::now().checked_add(every) {
            Some(start) if !every.is_zero() => self.poll_from(start, every).await,
            _ => warn!(project_id = %self.id, ?every, "unusable poll interval, not polling"),
        }
        lock(&self.timers).poller = None;
        debug!(project_id = %self.id, "polling stopped");
        self.emit(SessionEvent::PollingStopped);
    }

    async fn poll_from(self: &Arc<Self>, start: Instant, every: Duration) {
        debug!(project_id = %self.id, ?every, "polling model status");
        let mut ticker = tokio::time::interval_at(start, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.api.get_project(&self.id).await {
                Ok(remote) => {
                    if !self.apply_geometry(&remote) {
                        return;
                    }
                }
                Err(ApiError::Unauthorized) => {
                    warn!(project_id = %self.id, "status poll unauthorized");
                    return;
                }
                Err(e) => warn!(project_id = %self.id, error = %e, "status poll failed"),
            }
        }
    }

    fn shutdown(&self) {
        {
            let mut timers = lock(&self.timers);
            if timers.closed {
                return;
            }
            timers.closed = true;
            if let Some(h) = timers.debounce.take() {
                h.abort();
            }
            if let Some(h) = timers.poller.take() {
                h.abort();
            }
        }
        let cache = self.store.projects();
        if cache.current().as_ref() == Some(&self.id) {
            cache.set_current(None);
        }
        debug!(project_id = %self.id, "session closed");
    }
}

/// Editing session for one open project.
///
/// Create and use it inside a tokio runtime. Dropping the session closes it.
pub struct ProjectSession {
    shared: Arc<Shared>,
}

impl ProjectSession {
    /// Fetch the project and start a session on it.
    pub async fn open(
        api: Arc<dyn ProjectsApi>,
        store: AppState,
        config: ReactorConfig,
        id: ProjectId,
    ) -> Result<Self, SessionError> {
        let project = api.get_project(&id).await.map_err(SessionError::Load)?;
        Ok(Self::from_project(api, store, config, project))
    }

    /// Start a session from an already fetched record.
    ///
    /// Stored parameters are merged over the defaults; polling starts when the
    /// model is still processing.
    pub fn from_project(
        api: Arc<dyn ProjectsApi>,
        store: AppState,
        config: ReactorConfig,
        project: Project,
    ) -> Self {
        let params = ProductionParameters::from_stored(project.production_params.as_ref());
        let results = calculate(&params, project.volume_mm3);
        let id = project.id.clone();

        let cache = store.projects();
        cache.upsert(project.clone());
        cache.set_current(Some(id.clone()));

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Shared {
            id,
            api,
            store,
            config,
            state: Mutex::new(EditorState {
                project,
                params,
                results,
                save: SaveState::Idle,
                revision: 0,
                saved_revision: 0,
                uploading: false,
                generating: false,
            }),
            timers: Mutex::new(Timers::default()),
            save_lock: tokio::sync::Mutex::new(()),
            events,
        });
        shared.ensure_polling();
        info!(project_id = %shared.id, "project session opened");
        Self { shared }
    }

    pub fn id(&self) -> &ProjectId {
        &self.shared.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.shared.state).snapshot()
    }

    pub fn params(&self) -> ProductionParameters {
        lock(&self.shared.state).params.clone()
    }

    /// Latest breakdown; `None` means "awaiting calculation", not zero.
    pub fn results(&self) -> Option<CostBreakdown> {
        lock(&self.shared.state).results.clone()
    }

    pub fn project(&self) -> Project {
        lock(&self.shared.state).project.clone()
    }

    pub fn save_state(&self) -> SaveState {
        lock(&self.shared.state).save
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.shared.timers)
            .poller
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Wait until the model leaves `processing` or status polling stops.
    ///
    /// Returns the last known status; `Processing` means polling gave up.
    pub async fn wait_for_analysis(&self) -> FileStatus {
        let mut events = self.subscribe();
        loop {
            let status = lock(&self.shared.state).project.file_status;
            if status != FileStatus::Processing || !self.is_polling() {
                return status;
            }
            if let Err(broadcast::error::RecvError::Closed) = events.recv().await {
                return status;
            }
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.shared.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn mutate<F>(&self, f: F) -> Result<Option<CostBreakdown>, SessionError>
    where
        F: FnOnce(&mut ProductionParameters) -> Result<(), ValidationError>,
    {
        self.ensure_open()?;
        let (results, revision, advisory) = {
            let mut st = lock(&self.shared.state);
            f(&mut st.params)?;
            st.recompute();
            st.touch();
            (st.results.clone(), st.revision, st.params.validate().err())
        };
        if let Some(issue) = advisory {
            debug!(project_id = %self.shared.id, %issue, "parameters outside nominal range");
        }
        debug!(project_id = %self.shared.id, revision, "parameters edited");
        self.shared.emit(SessionEvent::ResultsChanged);
        self.shared.schedule_save();
        Ok(results)
    }

    /// Edit parameters in place. Returns the recomputed breakdown.
    pub fn update_params<F>(&self, f: F) -> Result<Option<CostBreakdown>, SessionError>
    where
        F: FnOnce(&mut ProductionParameters),
    {
        self.mutate(|p| {
            f(p);
            Ok(())
        })
    }

    pub fn set_params(&self, params: ProductionParameters) -> Result<Option<CostBreakdown>, SessionError> {
        self.update_params(|p| *p = params)
    }

    /// Apply a raw form value to one field. Rejected values change nothing.
    pub fn edit_field(&self, field: ParamField, raw: &str) -> Result<Option<CostBreakdown>, SessionError> {
        self.mutate(|p| p.apply_edit(field, raw))
    }

    /// Save now instead of waiting for the quiet period.
    pub async fn flush(&self) -> Result<Option<u64>, SessionError> {
        self.ensure_open()?;
        self.shared.cancel_debounce();
        self.shared.persist(true).await
    }

    /// Upload a model file. On success the session starts polling for the analysis.
    pub async fn upload(&self, file: ModelUpload) -> Result<(), SessionError> {
        self.ensure_open()?;
        let supported = file
            .extension()
            .is_some_and(|ext| SUPPORTED_MODEL_EXTENSIONS.contains(&ext.as_str()));
        if !supported {
            let err = SessionError::UnsupportedFile(file.file_name.clone());
            self.shared.emit(SessionEvent::UploadFailed {
                message: err.to_string(),
            });
            return Err(err);
        }

        lock(&self.shared.state).uploading = true;
        let result = self.shared.api.upload_file(&self.shared.id, file).await;
        lock(&self.shared.state).uploading = false;

        match result {
            Ok(remote) => {
                self.shared.apply_geometry(&remote);
                self.shared.ensure_polling();
                Ok(())
            }
            Err(e) => {
                warn!(project_id = %self.shared.id, error = %e, "model upload failed");
                self.shared.emit(SessionEvent::UploadFailed {
                    message: e.to_string(),
                });
                Err(SessionError::Upload(e))
            }
        }
    }

    /// Save the current figures, then ask the service for AI texts.
    ///
    /// Refused without any network call unless the model is `ready` and a
    /// breakdown exists.
    pub async fn generate_ai(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        {
            let mut st = lock(&self.shared.state);
            if st.project.file_status != FileStatus::Ready {
                return Err(SessionError::GenerationPrecondition {
                    status: st.project.file_status,
                });
            }
            if st.results.is_none() {
                return Err(SessionError::NotComputable);
            }
            if st.generating {
                return Err(SessionError::GenerationInProgress);
            }
            st.generating = true;
        }

        let outcome = self.save_then_generate().await;
        lock(&self.shared.state).generating = false;

        match outcome {
            Ok(remote) => {
                let project = {
                    let mut st = lock(&self.shared.state);
                    st.project.merge_ai_texts(&remote);
                    st.project.clone()
                };
                self.shared.publish(project);
                info!(project_id = %self.shared.id, "AI texts generated");
                self.shared.emit(SessionEvent::GenerationCompleted);
                Ok(())
            }
            Err(e) => {
                warn!(project_id = %self.shared.id, error = %e, "AI generation failed");
                self.shared.emit(SessionEvent::GenerationFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn save_then_generate(&self) -> Result<Project, SessionError> {
        self.shared.cancel_debounce();
        if self.shared.persist(true).await?.is_none() {
            return Err(SessionError::NotComputable);
        }
        self.shared
            .api
            .generate_ai(&self.shared.id)
            .await
            .map_err(SessionError::Generation)
    }

    /// Cancel the autosave timer and the status poller. A save already in flight completes.
    pub fn close(&self) {
        self.shared.shutdown();
    }
}

impl Drop for ProjectSession {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

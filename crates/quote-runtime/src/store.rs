//! Application state shared by the dashboard and the project editor.
//!
//! Consumers never touch the state directly: they get an [`AuthSession`]
//! for credentials or a [`ProjectCache`] for the project list, each a cheap
//! handle onto the same [`AppState`].

use quote_api::{ApiError, AuthApi, SessionHooks};
use quote_core::{Project, ProjectId, User};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

#[derive(Debug, Default)]
struct StoreInner {
    token: Option<String>,
    user: Option<User>,
    projects: Vec<Project>,
    current_project: Option<ProjectId>,
}

#[derive(Clone, Debug, Default)]
pub struct AppState {
    inner: Arc<RwLock<StoreInner>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth(&self) -> AuthSession {
        AuthSession {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn projects(&self) -> ProjectCache {
        ProjectCache {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Drop credentials, user and every cached project.
    pub fn logout(&self) {
        clear_session(&self.inner);
    }
}

fn read(inner: &RwLock<StoreInner>) -> RwLockReadGuard<'_, StoreInner> {
    inner.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(inner: &RwLock<StoreInner>) -> RwLockWriteGuard<'_, StoreInner> {
    inner.write().unwrap_or_else(PoisonError::into_inner)
}

fn clear_session(inner: &RwLock<StoreInner>) {
    let mut st = write(inner);
    st.token = None;
    st.user = None;
    st.projects.clear();
    st.current_project = None;
    info!("session cleared");
}

/// Credentials and current user.
#[derive(Clone, Debug)]
pub struct AuthSession {
    inner: Arc<RwLock<StoreInner>>,
}

impl AuthSession {
    pub fn sign_in(&self, token: impl Into<String>, user: Option<User>) {
        let mut st = write(&self.inner);
        st.token = Some(token.into());
        st.user = user;
    }

    pub fn set_user(&self, user: Option<User>) {
        write(&self.inner).user = user;
    }

    /// Fetch the account behind the current token and remember it.
    pub async fn load_user(&self, api: &dyn AuthApi) -> Result<User, ApiError> {
        let user = api.current_user().await?;
        info!(user_id = %user.id, "signed in");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    pub fn token(&self) -> Option<String> {
        read(&self.inner).token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        read(&self.inner).user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        read(&self.inner).token.is_some()
    }

    pub fn logout(&self) {
        clear_session(&self.inner);
    }
}

impl SessionHooks for AuthSession {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn on_unauthorized(&self) {
        self.logout();
    }
}

/// Cached project list. Entries are keyed by project id; writes replace in place.
#[derive(Clone, Debug)]
pub struct ProjectCache {
    inner: Arc<RwLock<StoreInner>>,
}

impl ProjectCache {
    pub fn set_all(&self, projects: Vec<Project>) {
        write(&self.inner).projects = projects;
    }

    pub fn list(&self) -> Vec<Project> {
        read(&self.inner).projects.clone()
    }

    pub fn len(&self) -> usize {
        read(&self.inner).projects.len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.inner).projects.is_empty()
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        read(&self.inner)
            .projects
            .iter()
            .find(|p| &p.id == id)
            .cloned()
    }

    /// Replace the entry with the same id, or append when absent.
    pub fn upsert(&self, project: Project) {
        let mut st = write(&self.inner);
        match st.projects.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => *slot = project,
            None => st.projects.push(project),
        }
    }

    /// Replace the entry with the same id. Returns false when it is not cached.
    pub fn update(&self, project: Project) -> bool {
        let mut st = write(&self.inner);
        match st.projects.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => {
                *slot = project;
                true
            }
            None => false,
        }
    }

    /// Remove an entry and forget it as the current project.
    pub fn remove(&self, id: &ProjectId) -> bool {
        let mut st = write(&self.inner);
        let before = st.projects.len();
        st.projects.retain(|p| &p.id != id);
        if st.current_project.as_ref() == Some(id) {
            st.current_project = None;
        }
        st.projects.len() != before
    }

    pub fn clear(&self) {
        let mut st = write(&self.inner);
        st.projects.clear();
        st.current_project = None;
    }

    pub fn set_current(&self, id: Option<ProjectId>) {
        write(&self.inner).current_project = id;
    }

    pub fn current(&self) -> Option<ProjectId> {
        read(&self.inner).current_project.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_api::{ApiConfig, HttpProjectsApi, ProjectsApi};
    use quote_core::FileStatus;

    fn project(id: &str, title: &str) -> Project {
        Project {
            id: ProjectId::from(id),
            title: title.to_string(),
            ..Project::default()
        }
    }

    #[test]
    fn upsert_replaces_by_identity() {
        let state = AppState::new();
        let cache = state.projects();
        cache.set_all(vec![project("a", "A"), project("b", "B")]);
        cache.upsert(Project {
            file_status: FileStatus::Ready,
            ..project("a", "A2")
        });
        cache.upsert(project("c", "C"));
        let list = cache.list();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].title, "A2");
        assert!(list[0].is_ready());
        assert_eq!(list[2].id, ProjectId::from("c"));
    }

    #[test]
    fn update_ignores_unknown_projects() {
        let cache = AppState::new().projects();
        assert!(!cache.update(project("x", "X")));
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_is_immediate_and_clears_current() {
        let cache = AppState::new().projects();
        cache.set_all(vec![project("a", "A"), project("b", "B")]);
        cache.set_current(Some(ProjectId::from("a")));
        assert!(cache.remove(&ProjectId::from("a")));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&ProjectId::from("a")).is_none());
        assert_eq!(cache.current(), None);
        assert!(!cache.remove(&ProjectId::from("a")));
    }

    async fn serve_auth() -> String {
        use axum::http::{header, HeaderMap, StatusCode};
        use axum::routing::get;
        use axum::{Json, Router};

        async fn me(headers: HeaderMap) -> Result<Json<User>, StatusCode> {
            match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                Some("Bearer tok") => Ok(Json(User {
                    id: "u1".into(),
                    email: "maker@example.test".into(),
                })),
                _ => Err(StatusCode::UNAUTHORIZED),
            }
        }
        // token revoked server-side after sign in
        async fn projects() -> StatusCode {
            StatusCode::UNAUTHORIZED
        }

        let app = Router::new()
            .route("/auth/me", get(me))
            .route("/projects/", get(projects));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn http_client(state: &AppState, base_url: String) -> HttpProjectsApi {
        let config = ApiConfig {
            base_url,
            timeout: Some(std::time::Duration::from_secs(5)),
        };
        HttpProjectsApi::new(&config, Arc::new(state.auth())).unwrap()
    }

    #[tokio::test]
    async fn load_user_fills_current_user() {
        let state = AppState::new();
        let auth = state.auth();
        auth.sign_in("tok", None);
        let api = http_client(&state, serve_auth().await);

        let user = auth.load_user(&api).await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(auth.current_user(), Some(user));
    }

    #[tokio::test]
    async fn rejected_token_clears_whole_session() {
        let state = AppState::new();
        let auth = state.auth();
        auth.sign_in("tok", None);
        let api = http_client(&state, serve_auth().await);
        auth.load_user(&api).await.unwrap();
        state.projects().set_all(vec![project("a", "A"), project("b", "B")]);
        state.projects().set_current(Some(ProjectId::from("a")));

        let err = api.list_projects().await.unwrap_err();

        assert_eq!(err, ApiError::Unauthorized);
        assert_eq!(auth.token(), None);
        assert_eq!(auth.current_user(), None);
        assert!(state.projects().is_empty());
        assert_eq!(state.projects().current(), None);

        // no token left, so the account lookup is refused too
        assert_eq!(auth.load_user(&api).await.unwrap_err(), ApiError::Unauthorized);
        assert_eq!(auth.current_user(), None);
    }

    #[test]
    fn unauthorized_hook_logs_out_everywhere() {
        let state = AppState::new();
        let auth = state.auth();
        auth.sign_in(
            "tok",
            Some(User {
                id: "u1".into(),
                email: "maker@example.test".into(),
            }),
        );
        state.projects().upsert(project("a", "A"));
        assert_eq!(auth.bearer_token().as_deref(), Some("tok"));

        auth.on_unauthorized();

        assert!(!auth.is_authenticated());
        assert!(auth.current_user().is_none());
        assert!(state.projects().is_empty());
    }
}

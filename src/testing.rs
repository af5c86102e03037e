//! In-process fake of the shortening backend, served with axum on an
//! ephemeral port. Keeps just enough state to behave like the real thing and
//! records every request it receives.

use crate::{
    api::ApiClient,
    config::ClientConfig,
    models::{Identity, LinkRecord},
};
use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct BackendState {
    requests: Mutex<Vec<Recorded>>,
    users: Mutex<HashMap<String, (String, Identity)>>,
    links: Mutex<Vec<(Option<i64>, LinkRecord)>>,
    owned_delays: Mutex<HashMap<i64, Duration>>,
    health_delay: Mutex<Duration>,
    next_id: AtomicI64,
    unhealthy: AtomicBool,
    fail_popular: AtomicBool,
    fail_owned: AtomicBool,
    fail_delete: AtomicBool,
    hide_profiles: AtomicBool,
}

impl BackendState {
    fn record(&self, method: Method, uri: &Uri, body: Option<Value>) {
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_owned(),
            body,
        });
    }
}

pub struct FakeBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            next_id: AtomicI64::new(100),
            ..BackendState::default()
        });

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/users/username/:username", get(user_by_username))
            .route("/api/users/:id/urls", get(user_links))
            .route("/api/urls", post(create_link))
            .route("/api/urls/custom", post(create_custom_link))
            .route("/api/urls/stats/popular", get(popular_links))
            .route("/api/urls/:key", get(get_link).delete(delete_link))
            .route("/actuator/health", get(health))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config()).unwrap()
    }

    pub fn client_with(&self, tweak: impl FnOnce(&mut ClientConfig)) -> ApiClient {
        let mut config = self.config();
        tweak(&mut config);
        ApiClient::new(&config).unwrap()
    }

    // ── Seeding ────────────────────────────────────────────────────────────

    pub fn add_user(&self, id: i64, username: &str, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id,
            username: username.into(),
            email: email.into(),
        };
        self.state
            .users
            .lock()
            .unwrap()
            .insert(username.into(), (password.into(), identity.clone()));
        identity
    }

    pub fn add_link(&self, owner: Option<i64>, short_code: &str, hits: u64) -> LinkRecord {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let link = link_record(id, &self.base_url, short_code, "https://example.com", None);
        let link = LinkRecord { hits, ..link };
        self.state.links.lock().unwrap().push((owner, link.clone()));
        link
    }

    pub fn set_hits(&self, short_code: &str, hits: u64) {
        for (_, link) in self.state.links.lock().unwrap().iter_mut() {
            if link.short_code == short_code {
                link.hits = hits;
            }
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn set_health_delay(&self, delay: Duration) {
        *self.state.health_delay.lock().unwrap() = delay;
    }

    pub fn delay_owned_fetch(&self, user_id: i64, delay: Duration) {
        self.state.owned_delays.lock().unwrap().insert(user_id, delay);
    }

    pub fn fail_popular(&self, fail: bool) {
        self.state.fail_popular.store(fail, Ordering::SeqCst);
    }

    pub fn fail_owned(&self, fail: bool) {
        self.state.fail_owned.store(fail, Ordering::SeqCst);
    }

    pub fn hide_profiles(&self, hide: bool) {
        self.state.hide_profiles.store(hide, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.fail_delete.store(fail, Ordering::SeqCst);
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.state.requests.lock().unwrap().clear();
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn link_record(
    id: i64,
    base_url: &str,
    short_code: &str,
    original_url: &str,
    expire_at: Option<DateTime<Utc>>,
) -> LinkRecord {
    LinkRecord {
        id,
        short_code: short_code.into(),
        short_url: format!("{base_url}/{short_code}"),
        original_url: original_url.into(),
        hits: 0,
        created_at: Utc::now(),
        expire_at,
    }
}

fn error(status: StatusCode, field: &str, text: &str) -> Response {
    let mut body = serde_json::Map::new();
    body.insert(field.to_owned(), Value::from(text));
    (status, Json(Value::Object(body))).into_response()
}

// ── Handlers ───────────────────────────────────────────────────────────────

type Shared = State<Arc<BackendState>>;

async fn login(State(state): Shared, uri: Uri, Json(body): Json<Value>) -> Response {
    state.record(Method::POST, &uri, Some(body.clone()));
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let users = state.users.lock().unwrap();
    match users.get(username) {
        Some((stored, _)) if stored == password => {
            Json(json!({ "message": "Login successful" })).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "message", "Invalid username or password"),
    }
}

async fn register(State(state): Shared, uri: Uri, Json(body): Json<Value>) -> Response {
    state.record(Method::POST, &uri, Some(body.clone()));
    let username = body["username"].as_str().unwrap_or_default().to_owned();
    let email = body["email"].as_str().unwrap_or_default().to_owned();
    let password = body["password"].as_str().unwrap_or_default().to_owned();

    let mut users = state.users.lock().unwrap();
    if users.contains_key(&username) {
        return error(StatusCode::BAD_REQUEST, "message", "Username is already taken");
    }
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let identity = Identity {
        id,
        username: username.clone(),
        email,
    };
    users.insert(username, (password, identity));
    (StatusCode::CREATED, Json(json!({ "message": "User registered" }))).into_response()
}

async fn user_by_username(
    State(state): Shared,
    uri: Uri,
    Path(username): Path<String>,
) -> Response {
    state.record(Method::GET, &uri, None);
    if state.hide_profiles.load(Ordering::SeqCst) {
        return error(StatusCode::NOT_FOUND, "error", "User not found");
    }
    match state.users.lock().unwrap().get(&username) {
        Some((_, identity)) => Json(identity.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "error", "User not found"),
    }
}

async fn user_links(State(state): Shared, uri: Uri, Path(id): Path<i64>) -> Response {
    state.record(Method::GET, &uri, None);
    let delay = state.owned_delays.lock().unwrap().get(&id).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if state.fail_owned.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "message", "boom");
    }
    let links: Vec<LinkRecord> = state
        .links
        .lock()
        .unwrap()
        .iter()
        .filter(|(owner, _)| *owner == Some(id))
        .map(|(_, link)| link.clone())
        .collect();
    Json(links).into_response()
}

async fn popular_links(State(state): Shared, uri: Uri) -> Response {
    state.record(Method::GET, &uri, None);
    if state.fail_popular.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "message", "boom");
    }
    let mut links: Vec<LinkRecord> = state
        .links
        .lock()
        .unwrap()
        .iter()
        .map(|(_, link)| link.clone())
        .collect();
    links.sort_by(|a, b| b.hits.cmp(&a.hits));
    Json(links).into_response()
}

async fn create_link(State(state): Shared, uri: Uri, Json(body): Json<Value>) -> Response {
    state.record(Method::POST, &uri, Some(body.clone()));
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    store_created(&state, id, &format!("gen{id}"), &body)
}

async fn create_custom_link(State(state): Shared, uri: Uri, Json(body): Json<Value>) -> Response {
    state.record(Method::POST, &uri, Some(body.clone()));
    let code = body["customShortCode"].as_str().unwrap_or_default().to_owned();
    let taken = state
        .links
        .lock()
        .unwrap()
        .iter()
        .any(|(_, link)| link.short_code == code);
    if taken {
        return error(StatusCode::CONFLICT, "message", "Custom short code already in use");
    }
    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    store_created(&state, id, &code, &body)
}

fn store_created(state: &BackendState, id: i64, code: &str, body: &Value) -> Response {
    let original_url = body["originalUrl"].as_str().unwrap_or_default();
    if original_url.is_empty() {
        return error(StatusCode::BAD_REQUEST, "message", "originalUrl is required");
    }
    let expire_at = body["expireAt"]
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let link = link_record(id, "http://sho.rt", code, original_url, expire_at);
    let owner = body["userId"].as_i64();
    state.links.lock().unwrap().push((owner, link.clone()));
    (StatusCode::CREATED, Json(link)).into_response()
}

async fn get_link(State(state): Shared, uri: Uri, Path(key): Path<String>) -> Response {
    state.record(Method::GET, &uri, None);
    let links = state.links.lock().unwrap();
    match links.iter().find(|(_, link)| link.short_code == key) {
        Some((_, link)) => Json(link.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "message", "Short URL not found"),
    }
}

async fn delete_link(State(state): Shared, uri: Uri, Path(key): Path<String>) -> Response {
    state.record(Method::DELETE, &uri, None);
    if state.fail_delete.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "message", "boom");
    }
    let Ok(id) = key.parse::<i64>() else {
        return error(StatusCode::BAD_REQUEST, "message", "bad id");
    };
    let mut links = state.links.lock().unwrap();
    let before = links.len();
    links.retain(|(_, link)| link.id != id);
    if links.len() == before {
        error(StatusCode::NOT_FOUND, "message", "Short URL not found")
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn health(State(state): Shared, uri: Uri) -> Response {
    state.record(Method::GET, &uri, None);
    let delay = *state.health_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if state.unhealthy.load(Ordering::SeqCst) {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "DOWN" }))).into_response()
    } else {
        Json(json!({ "status": "UP" })).into_response()
    }
}

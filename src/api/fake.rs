//! In-process stand-in for the remote devotee API, used by the gateway and
//! client tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const LOGIN_ACCESS: &str = "login-access";
pub const VALID_REFRESH: &str = "refresh-token";
pub const REFRESHED_ACCESS: &str = "fresh-access";

#[derive(Default)]
pub struct FakeApi {
    pub refresh_calls: AtomicUsize,
    authorization: Mutex<HashMap<String, Vec<Option<String>>>>,
    uploads: Mutex<Vec<String>>,
    devotees: Mutex<Vec<Value>>,
    duplicates: Mutex<Vec<Value>>,
    deleted: Mutex<Vec<String>>,
    next_id: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let fake = Self {
            next_id: AtomicUsize::new(100),
            ..Self::default()
        };
        Arc::new(fake)
    }

    pub fn with_devotees(self: Arc<Self>, rows: Vec<Value>) -> Arc<Self> {
        *lock(&self.devotees) = rows;
        self
    }

    pub fn with_duplicates(self: Arc<Self>, rows: Vec<Value>) -> Arc<Self> {
        *lock(&self.duplicates) = rows;
        self
    }

    /// Authorization headers seen by an endpoint, in arrival order.
    pub fn seen_authorization(&self, endpoint: &str) -> Vec<Option<String>> {
        lock(&self.authorization)
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn uploaded_files(&self) -> Vec<String> {
        lock(&self.uploads).clone()
    }

    pub fn deleted_paths(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }

    pub fn devotee_count(&self) -> usize {
        lock(&self.devotees).len()
    }

    fn record(&self, endpoint: &str, headers: &HeaderMap) {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        lock(&self.authorization)
            .entry(endpoint.to_string())
            .or_default()
            .push(value);
    }

    fn authorized(headers: &HeaderMap) -> bool {
        let expected = [
            format!("Bearer {LOGIN_ACCESS}"),
            format!("Bearer {REFRESHED_ACCESS}"),
        ];
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|value| expected.iter().any(|e| e == value))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type", "code": "token_not_valid" })),
    )
        .into_response()
}

/// Serve the fake on an ephemeral port and return its API base URL.
pub async fn spawn_fake_api(fake: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/api/token/", post(login))
        .route("/api/token/refresh/", post(refresh))
        .route("/api/register/", post(register))
        .route("/api/devotees/", get(list_devotees).post(create_devotee))
        .route("/api/devotees/:id/", put(update_devotee).delete(delete_devotee))
        .route("/api/delete-nakshatra/:name/", delete(delete_nakshatra))
        .route("/api/duplicates/", get(list_duplicates))
        .route("/api/duplicates/:id/", delete(delete_duplicate))
        .route("/api/delete-all-duplicates/", delete(delete_all_duplicates))
        .route("/api/bulk-upload/", post(bulk_upload))
        .route("/api/always-unauthorized/", get(always_unauthorized))
        .layer(DefaultBodyLimit::disable())
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/")
}

/// Base URL of a port nothing is listening on.
pub async fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/")
}

async fn login(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.record("token/", &headers);
    if body["password"] == "secret" {
        Json(json!({ "access": LOGIN_ACCESS, "refresh": VALID_REFRESH })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response()
    }
}

async fn refresh(State(fake): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    fake.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Long enough for concurrent callers to queue behind this exchange.
    tokio::time::sleep(Duration::from_millis(50)).await;
    if body["refresh"] == VALID_REFRESH {
        Json(json!({ "access": REFRESHED_ACCESS })).into_response()
    } else {
        unauthorized()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Username already exists" })),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully" })),
    )
        .into_response()
}

async fn list_devotees(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.record("devotees/", &headers);
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    let rows = lock(&fake.devotees).clone();
    let rows: Vec<Value> = match params.get("nakshatra") {
        Some(star) => rows
            .into_iter()
            .filter(|row| row["nakshatra"] == star.to_uppercase())
            .collect(),
        None => rows,
    };
    Json(rows).into_response()
}

async fn create_devotee(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    let exists = lock(&fake.devotees).iter().any(|row| {
        row["phone"] == body["phone"]
            && row["name"] == body["name"]
            && row["nakshatra"] == body["nakshatra"]
    });
    if exists {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "duplicate": ["This devotee is already registered under this Nakshatra."] })),
        )
            .into_response();
    }
    let id = fake.next_id.fetch_add(1, Ordering::SeqCst);
    body["id"] = json!(id);
    body["created_at"] = json!("2026-10-18T09:30:00Z");
    lock(&fake.devotees).push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn update_devotee(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    let mut rows = lock(&fake.devotees);
    let Some(row) = rows.iter_mut().find(|row| row["id"] == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "No Devotee matches the given query." })))
            .into_response();
    };
    for key in ["name", "country_code", "phone", "nakshatra"] {
        row[key] = body[key].clone();
    }
    Json(row.clone()).into_response()
}

async fn delete_devotee(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    lock(&fake.deleted).push(format!("devotees/{id}/"));
    lock(&fake.devotees).retain(|row| row["id"] != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_nakshatra(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    let mut rows = lock(&fake.devotees);
    let before = rows.len();
    rows.retain(|row| row["nakshatra"] != name.to_uppercase());
    let deleted = before - rows.len();
    if deleted == 0 {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "No devotees found" })))
            .into_response();
    }
    Json(json!({ "message": format!("{deleted} devotees deleted successfully"), "deleted": deleted }))
        .into_response()
}

async fn list_duplicates(State(fake): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    Json(lock(&fake.duplicates).clone()).into_response()
}

async fn delete_duplicate(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    lock(&fake.deleted).push(format!("duplicates/{id}/"));
    lock(&fake.duplicates).retain(|row| row["id"] != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_all_duplicates(State(fake): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    let mut rows = lock(&fake.duplicates);
    let deleted = rows.len();
    rows.clear();
    Json(json!({ "message": "All duplicates deleted", "deleted": deleted })).into_response()
}

async fn bulk_upload(
    State(fake): State<Arc<FakeApi>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !FakeApi::authorized(&headers) {
        return unauthorized();
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if let Some(name) = field.file_name() {
            lock(&fake.uploads).push(name.to_string());
        }
        if field.bytes().await.is_err() {
            break;
        }
    }
    Json(json!({
        "message": "Bulk upload completed",
        "created": 7,
        "duplicates": 2,
        "invalid": 1,
    }))
    .into_response()
}

async fn always_unauthorized(State(fake): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    fake.record("always-unauthorized/", &headers);
    unauthorized()
}

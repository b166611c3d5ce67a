use reqwest::{
    Client, Method, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{
    error::ApiError,
    session::{Credentials, Session},
};

pub const TOKEN_PATH: &str = "token/";
pub const TOKEN_REFRESH_PATH: &str = "token/refresh/";
pub const REGISTER_PATH: &str = "register/";

/// Endpoints that must never carry a bearer token.
pub fn is_public_endpoint(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    path.starts_with(TOKEN_PATH) || path.starts_with(REGISTER_PATH)
}

/// Body of an outbound call. Kept as plain data so the call can be replayed.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Upload(FileUpload),
}

/// A single file sent as `multipart/form-data`, plus any text fields.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

impl FileUpload {
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    fn to_form(&self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes.clone())
            .file_name(self.filename.clone())
            .mime_str(&self.content_type)
            .map_err(|_| {
                ApiError::Validation(format!("unsupported content type: {}", self.content_type))
            })?;

        let form = self
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
            .part(self.field_name.clone(), part);
        Ok(form)
    }
}

/// Description of a call against the remote API, relative to its base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::Decode(format!("failed to encode request body: {err}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn with_upload(mut self, upload: FileUpload) -> Self {
        self.body = RequestBody::Upload(upload);
        self
    }

    pub fn is_public(&self) -> bool {
        is_public_endpoint(&self.path)
    }
}

/// Where a request stands in the refresh protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Attempt {
    First,
    Retried,
}

/// Fully buffered response from the remote API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Turn any non-2xx status into the matching error.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|err| {
            let preview: String = self.body.chars().take(200).collect();
            ApiError::Decode(format!("{err}; body: {preview}"))
        })
    }
}

#[derive(Deserialize)]
struct IssuedTokens {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct RegisterReply {
    #[serde(default)]
    message: Option<String>,
}

/// The single chokepoint for calls to the remote API.
///
/// Attaches the session's access token, and on a 401 performs at most one
/// refresh-and-resend cycle per request.
#[derive(Clone)]
pub struct Gateway {
    http: Client,
    base_url: String,
}

impl Gateway {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { http, base_url }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send `request` on behalf of `session`.
    pub async fn send(&self, session: &Session, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        if request.is_public() {
            return self.dispatch(request, None).await;
        }

        let snapshot = session.snapshot().await;
        let mut access = snapshot.access;
        let mut attempt = Attempt::First;

        loop {
            let response = self.dispatch(request, access.as_deref()).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            match attempt {
                Attempt::Retried => {
                    warn!(path = %request.path, "request still unauthorized after token refresh");
                    return Err(ApiError::Unauthorized);
                }
                Attempt::First => {
                    attempt = Attempt::Retried;
                    debug!(path = %request.path, "access token rejected; refreshing");
                    let rotated = session
                        .rotate(snapshot.epoch, |refresh| self.exchange_refresh(refresh))
                        .await?;
                    access = Some(rotated);
                }
            }
        }
    }

    /// Exchange username and password for a token pair.
    pub async fn obtain_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credentials, ApiError> {
        let request = ApiRequest::post(TOKEN_PATH)
            .with_json(&json!({ "username": username, "password": password }))?;
        let response = self.dispatch(&request, None).await?.error_for_status()?;
        let issued: IssuedTokens = response.json()?;
        Ok(Credentials {
            access: Some(issued.access),
            refresh: issued.refresh,
        })
    }

    /// Create an operator account. Returns the server's confirmation message.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).with_json(&json!({
            "username": username,
            "email": email,
            "password": password,
        }))?;
        let response = self.dispatch(&request, None).await?.error_for_status()?;
        let reply: RegisterReply = response.json()?;
        Ok(reply
            .message
            .unwrap_or_else(|| "User registered successfully".to_string()))
    }

    async fn exchange_refresh(&self, refresh: String) -> Result<Credentials, ApiError> {
        let request =
            ApiRequest::post(TOKEN_REFRESH_PATH).with_json(&json!({ "refresh": refresh }))?;
        let response = self.dispatch(&request, None).await?.error_for_status()?;
        let issued: IssuedTokens = response.json()?;
        Ok(Credentials {
            access: Some(issued.access),
            refresh: issued.refresh,
        })
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url_for(&request.path));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Upload(upload) => builder.multipart(upload.to_form()?),
        };

        let response = builder.send().await.map_err(ApiError::Connectivity)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiError::Connectivity)?;
        debug!(method = %request.method, path = %request.path, %status, "remote API call");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use super::*;
    use crate::api::fake::{FakeApi, REFRESHED_ACCESS, VALID_REFRESH, spawn_fake_api, unused_base_url};

    fn gateway(base_url: &str) -> Gateway {
        Gateway::new(Client::new(), base_url)
    }

    #[test]
    fn public_endpoints_are_recognised() {
        assert!(is_public_endpoint("token/"));
        assert!(is_public_endpoint("/token/refresh/"));
        assert!(is_public_endpoint("register/"));
        assert!(!is_public_endpoint("devotees/"));
        assert!(!is_public_endpoint("bulk-upload/"));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let gateway = gateway("http://127.0.0.1:8000/api");
        assert_eq!(gateway.url_for("/devotees/"), "http://127.0.0.1:8000/api/devotees/");
    }

    #[tokio::test]
    async fn valid_access_token_is_attached() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials::new(REFRESHED_ACCESS, VALID_REFRESH));

        let response = gateway(&base)
            .send(&session, &ApiRequest::get("devotees/"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            fake.seen_authorization("devotees/"),
            vec![Some(format!("Bearer {REFRESHED_ACCESS}"))]
        );
    }

    #[tokio::test]
    async fn login_never_carries_authorization() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;

        let credentials = gateway(&base)
            .obtain_credentials("priest", "secret")
            .await
            .unwrap();

        assert_eq!(credentials.refresh.as_deref(), Some(VALID_REFRESH));
        assert_eq!(fake.seen_authorization("token/"), vec![None]);
    }

    #[tokio::test]
    async fn bad_login_is_unauthorized_not_session_expired() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;

        let err = gateway(&base)
            .obtain_credentials("priest", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.user_message(), "Invalid username or password");
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_access_token_is_recovered_by_one_refresh() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials {
            access: None,
            refresh: Some(VALID_REFRESH.to_string()),
        });

        let response = gateway(&base)
            .send(&session, &ApiRequest::get("devotees/"))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fake.seen_authorization("devotees/"),
            vec![None, Some(format!("Bearer {REFRESHED_ACCESS}"))]
        );
        assert_eq!(
            session.credentials().await.access.as_deref(),
            Some(REFRESHED_ACCESS)
        );
    }

    #[tokio::test]
    async fn no_tokens_at_all_ends_session_without_refresh_call() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials::default());

        let err = gateway(&base)
            .send(&session, &ApiRequest::get("devotees/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert!(err.requires_login());
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fake.seen_authorization("devotees/"), vec![None]);
    }

    #[tokio::test]
    async fn rejected_refresh_clears_credentials() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials::new("expired-access", "expired-refresh"));

        let err = gateway(&base)
            .send(&session, &ApiRequest::get("devotees/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.credentials().await, Credentials::default());
    }

    #[tokio::test]
    async fn second_unauthorized_is_not_retried() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials::new("stale", VALID_REFRESH));

        let err = gateway(&base)
            .send(&session, &ApiRequest::get("always-unauthorized/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.seen_authorization("always-unauthorized/").len(), 2);
        // The refresh itself succeeded, so the session stays usable.
        assert_eq!(
            session.credentials().await.access.as_deref(),
            Some(REFRESHED_ACCESS)
        );
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Arc::new(Session::new(Credentials::new("stale", VALID_REFRESH)));
        let gateway = gateway(&base);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let gateway = gateway.clone();
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                gateway.send(&session, &ApiRequest::get("devotees/")).await
            }));
        }
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status, StatusCode::OK);
        }

        assert_eq!(fake.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upload_is_replayed_after_refresh() {
        let fake = FakeApi::new();
        let base = spawn_fake_api(fake.clone()).await;
        let session = Session::new(Credentials::new("stale", VALID_REFRESH));
        let upload = FileUpload::new("file", "rows.csv", "text/csv", b"name\nA\n".to_vec())
            .with_field("nakshatra", "ROHINI");

        let response = gateway(&base)
            .send(&session, &ApiRequest::post("bulk-upload/").with_upload(upload))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(fake.uploaded_files(), vec!["rows.csv".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connectivity_error() {
        let base = unused_base_url().await;
        let session = Session::new(Credentials::new("a", "r"));

        let err = gateway(&base)
            .send(&session, &ApiRequest::get("devotees/"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Connectivity(_)));
        assert!(!err.requires_login());
        assert!(session.is_active().await);
    }
}

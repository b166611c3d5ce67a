use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api::{ApiError, TempleApi},
    web::{
        AppState,
        flash::{Flash, FlashQuery},
        templates::{render_login_page, render_register_page},
    },
};

pub const SESSION_COOKIE: &str = "devotee_session";

/// A signed-in operator resolved from the session cookie.
pub struct Operator {
    pub session_id: Uuid,
    pub api: TempleApi,
    jar: CookieJar,
}

impl Operator {
    /// Tear the session down and send the browser back to the login page.
    pub async fn expire(self, state: &AppState) -> Response {
        state.sessions().remove(self.session_id).await;
        info!(session = %self.session_id, "session expired; login required");
        let jar = self.jar.remove(removal_cookie());
        (jar, Redirect::to("/login?error=session_expired")).into_response()
    }

    /// Turn an API failure into either a flash for the current page or, when
    /// the session is gone, a redirect to the login page.
    pub async fn recover(self, state: &AppState, err: ApiError) -> Result<(Self, Flash), Response> {
        if err.requires_login() {
            return Err(self.expire(state).await);
        }
        warn!(?err, session = %self.session_id, "API request failed");
        let flash = Flash::error(err.user_message());
        Ok((self, flash))
    }
}

/// Resolve the operator behind `jar`, if the cookie names a live session.
pub async fn current_operator(state: &AppState, jar: &CookieJar) -> Option<Operator> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let session_id = Uuid::parse_str(cookie.value()).ok()?;
    let session = state.sessions().get(session_id).await?;
    Some(Operator {
        session_id,
        api: state.api_for(session),
        jar: jar.clone(),
    })
}

/// Where pages send visitors without a session.
pub fn login_redirect() -> Response {
    Redirect::to("/login").into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Response {
    if current_operator(&state, &jar).await.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(render_login_page(params.flash().as_ref(), "")).into_response()
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        let flash = Flash::error("Please enter username and password");
        return (StatusCode::BAD_REQUEST, Html(render_login_page(Some(&flash), username)))
            .into_response();
    }

    let credentials = match state.gateway().obtain_credentials(username, &form.password).await {
        Ok(credentials) => credentials,
        Err(err) => {
            let status = match err {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::Connectivity(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::BAD_REQUEST,
            };
            warn!(?err, username, "login failed");
            let flash = Flash::error(login_failure_message(&err));
            return (status, Html(render_login_page(Some(&flash), username))).into_response();
        }
    };

    let (session_id, _) = state.sessions().create(credentials).await;
    info!(session = %session_id, username, "operator logged in");

    let jar = jar.add(session_cookie(session_id, state.config().session_ttl_days));
    (jar, Redirect::to("/")).into_response()
}

fn login_failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Connectivity(_) => err.user_message(),
        _ => "Invalid username or password".to_string(),
    }
}

pub async fn register_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if current_operator(&state, &jar).await.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(render_register_page(None, "", "")).into_response()
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let username = form.username.trim();
    let email = form.email.trim();
    let rerender = |message: String| {
        let flash = Flash::error(message);
        (
            StatusCode::BAD_REQUEST,
            Html(render_register_page(Some(&flash), username, email)),
        )
            .into_response()
    };

    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return rerender("Please fill in every field".to_string());
    }
    if form.password != form.confirm_password {
        return rerender("Passwords do not match".to_string());
    }

    match state.gateway().register(username, email, &form.password).await {
        Ok(_) => {
            info!(username, "operator registered");
            Redirect::to("/login?status=registered").into_response()
        }
        Err(err) => {
            warn!(?err, username, "registration failed");
            rerender(register_failure_message(&err))
        }
    }
}

fn register_failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Connectivity(_) => err.user_message(),
        ApiError::Server { .. } => "Server error. Please check backend register API.".to_string(),
        ApiError::Rejected(message) | ApiError::Conflict(message) => message.clone(),
        _ => "Registration failed".to_string(),
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(id) = Uuid::parse_str(cookie.value()) {
            state.sessions().remove(id).await;
            info!(session = %id, "operator logged out");
        }
    }

    let jar = jar.remove(removal_cookie());
    (jar, Redirect::to("/login?status=logged_out"))
}

fn session_cookie(id: Uuid, ttl_days: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(ttl_days));
    cookie
}

fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    removal
}

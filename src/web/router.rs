use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, entries, landing, nakshatras, uploads::UPLOAD_BODY_LIMIT};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::landing_page))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/devotees", post(landing::create_devotee))
        .route(
            "/bulk-upload",
            post(landing::bulk_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/nakshatras", get(nakshatras::nakshatra_grid))
        .route("/nakshatras/:name", get(nakshatras::nakshatra_table))
        .route(
            "/nakshatras/:name/devotees/:id",
            post(nakshatras::update_devotee),
        )
        .route(
            "/nakshatras/:name/devotees/:id/delete",
            post(nakshatras::delete_devotee),
        )
        .route("/nakshatras/:name/delete", post(nakshatras::delete_nakshatra))
        .route(
            "/nakshatras/:name/export/:format",
            get(nakshatras::export_nakshatra),
        )
        .merge(entries::router())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

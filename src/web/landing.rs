use std::borrow::Cow;

use axum::{
    extract::{Form, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    api::NewDevotee,
    upload::preflight,
    web::{
        AppState,
        auth,
        flash::{Flash, FlashQuery},
        templates::{PageLayout, escape_html, nakshatra_options, render_login_page, render_page},
        uploads::read_upload_form,
    },
};

const DEFAULT_COUNTRY_CODE: &str = "+91";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DevoteeForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub nakshatra: String,
}

impl DevoteeForm {
    pub fn to_new_devotee(&self) -> NewDevotee {
        NewDevotee::normalized(&self.name, &self.country_code, &self.phone, &self.nakshatra)
    }
}

pub async fn landing_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Html<String> {
    let flash = params.flash();
    match auth::current_operator(&state, &jar).await {
        Some(_) => Html(render_dashboard(flash.as_ref(), &DevoteeForm::default(), None)),
        None => Html(render_login_page(flash.as_ref(), "")),
    }
}

pub async fn create_devotee(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<DevoteeForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };

    match operator.api.create_devotee(&form.to_new_devotee()).await {
        Ok(_) => Redirect::to("/?status=devotee_added").into_response(),
        Err(err) => match operator.recover(&state, err).await {
            Ok((_, flash)) => dashboard_with(StatusCode::BAD_REQUEST, &flash, &form, None),
            Err(response) => response,
        },
    }
}

pub async fn bulk_upload(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let blank = DevoteeForm::default();

    let form = match read_upload_form(multipart, "file").await {
        Ok(form) => form,
        Err(err) => {
            warn!(error = %err, "failed to read bulk upload form");
            return dashboard_with(StatusCode::BAD_REQUEST, &Flash::error(err.message()), &blank, None);
        }
    };
    let selected = form.text("nakshatra").map(str::to_string);

    let upload = match preflight(form.file, selected.as_deref()) {
        Ok(upload) => upload,
        Err(err) => {
            let flash = Flash::error(err.user_message());
            return dashboard_with(StatusCode::BAD_REQUEST, &flash, &blank, selected.as_deref());
        }
    };

    info!(
        file = %upload.file.original_name,
        nakshatra = %upload.nakshatra,
        rows = upload.data_rows,
        "forwarding bulk upload"
    );

    let result = operator
        .api
        .bulk_upload(
            &upload.file.original_name,
            &upload.file.content_type,
            upload.file.bytes,
            Some(upload.nakshatra),
        )
        .await;

    match result {
        Ok(summary) => {
            let flash = Flash::success(format!("Upload Completed Successfully!\n{summary}"));
            Html(render_dashboard(Some(&flash), &blank, None)).into_response()
        }
        Err(err) => match operator.recover(&state, err).await {
            Ok((_, flash)) => {
                dashboard_with(StatusCode::BAD_REQUEST, &flash, &blank, selected.as_deref())
            }
            Err(response) => response,
        },
    }
}

fn dashboard_with(
    status: StatusCode,
    flash: &Flash,
    form: &DevoteeForm,
    bulk_nakshatra: Option<&str>,
) -> Response {
    (status, Html(render_dashboard(Some(flash), form, bulk_nakshatra))).into_response()
}

fn render_dashboard(flash: Option<&Flash>, form: &DevoteeForm, bulk_nakshatra: Option<&str>) -> String {
    let country_code = if form.country_code.trim().is_empty() {
        DEFAULT_COUNTRY_CODE
    } else {
        form.country_code.as_str()
    };

    let body = format!(
        r#"        <section class="panel">
            <h2>Add Devotee</h2>
            <form method="post" action="/devotees">
                <div class="form-grid">
                    <div>
                        <label for="name">Name</label>
                        <input id="name" name="name" value="{name}" placeholder="Devotee name">
                    </div>
                    <div>
                        <label for="country_code">Country Code</label>
                        <input id="country_code" name="country_code" value="{country_code}">
                    </div>
                    <div>
                        <label for="phone">Phone</label>
                        <input id="phone" name="phone" value="{phone}" inputmode="tel" placeholder="Phone number">
                    </div>
                    <div>
                        <label for="nakshatra">Nakshatra</label>
                        <select id="nakshatra" name="nakshatra">{single_options}</select>
                    </div>
                </div>
                <div class="form-actions">
                    <button type="submit" data-busy-label="Adding...">Add Devotee</button>
                </div>
            </form>
        </section>
        <section class="panel">
            <h2>Bulk Upload</h2>
            <p class="note">Upload a CSV or Excel (.xlsx) file with name, country code, phone and nakshatra columns. Rows that already exist are set aside as duplicates and rows that fail validation as invalid entries.</p>
            <form method="post" action="/bulk-upload" enctype="multipart/form-data">
                <div class="form-grid">
                    <div>
                        <label for="file">File</label>
                        <input id="file" type="file" name="file" accept=".xlsx,.csv">
                    </div>
                    <div>
                        <label for="bulk_nakshatra">Nakshatra</label>
                        <select id="bulk_nakshatra" name="nakshatra">{bulk_options}</select>
                    </div>
                </div>
                <div class="form-actions">
                    <button type="submit" data-busy-label="Uploading...">Upload</button>
                </div>
            </form>
        </section>"#,
        name = escape_html(&form.name),
        country_code = escape_html(country_code),
        phone = escape_html(&form.phone),
        single_options = nakshatra_options(Some(form.nakshatra.as_str())),
        bulk_options = nakshatra_options(bulk_nakshatra),
    );

    render_page(PageLayout {
        title: "Add Devotee",
        heading: "Temple Devotee Registry",
        note_html: Cow::Borrowed(""),
        flash,
        body_html: Cow::Owned(body),
    })
}

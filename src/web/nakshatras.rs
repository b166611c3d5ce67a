use std::borrow::Cow;

use axum::{
    extract::{Form, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Local;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    api::{Devotee, NewDevotee},
    export::{ExportFormat, export_roster, format_timestamp},
    nakshatra::Nakshatra,
    roster::{RosterQuery, RosterSort},
    web::{
        AppState,
        auth::{self, Operator},
        flash::{Flash, FlashQuery},
        templates::{
            ConfirmForm, ConfirmPrompt, PageLayout, escape_html, render_confirm_page, render_page,
        },
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    #[serde(flatten)]
    pub roster: RosterQuery,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub phone: String,
}

fn table_path(star: Nakshatra) -> String {
    format!("/nakshatras/{}", star.as_str())
}

fn unknown_star() -> Response {
    Redirect::to("/nakshatras?error=unknown_nakshatra").into_response()
}

pub async fn nakshatra_grid(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Response {
    if auth::current_operator(&state, &jar).await.is_none() {
        return auth::login_redirect();
    }

    let cards = Nakshatra::all()
        .map(|star| {
            format!(
                r#"<a class="star-card" href="{href}">{label}</a>"#,
                href = table_path(star),
                label = escape_html(&star.display_name()),
            )
        })
        .collect::<String>();
    let body = format!(r#"        <div class="star-grid">{cards}</div>"#);

    let flash = params.flash();
    Html(render_page(PageLayout {
        title: "Nakshatras",
        heading: "Nakshatras",
        note_html: Cow::Borrowed("Select a nakshatra to view, edit or export its devotees."),
        flash: flash.as_ref(),
        body_html: Cow::Owned(body),
    }))
    .into_response()
}

pub async fn nakshatra_table(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
    Query(params): Query<TableQuery>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let Ok(star) = name.parse::<Nakshatra>() else {
        return unknown_star();
    };

    let flash = params.flash.flash();
    table_response(&state, operator, star, &params.roster, flash, StatusCode::OK).await
}

/// Fetch the roster and render the table. A failed fetch replaces `flash`.
async fn table_response(
    state: &AppState,
    operator: Operator,
    star: Nakshatra,
    query: &RosterQuery,
    flash: Option<Flash>,
    status: StatusCode,
) -> Response {
    match operator.api.list_devotees(star).await {
        Ok(rows) => {
            (status, Html(render_table(star, &rows, query, flash.as_ref()))).into_response()
        }
        Err(err) => match operator.recover(state, err).await {
            Ok((_, flash)) => (
                StatusCode::BAD_GATEWAY,
                Html(render_table(star, &[], query, Some(&flash))),
            )
                .into_response(),
            Err(response) => response,
        },
    }
}

pub async fn update_devotee(
    State(state): State<AppState>,
    jar: CookieJar,
    Path((name, id)): Path<(String, i64)>,
    Form(form): Form<EditForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let Ok(star) = name.parse::<Nakshatra>() else {
        return unknown_star();
    };

    let update = NewDevotee::normalized(&form.name, &form.country_code, &form.phone, star.as_str());
    match operator.api.update_devotee(id, &update).await {
        Ok(_) => {
            Redirect::to(&format!("{}?status=devotee_updated", table_path(star))).into_response()
        }
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                let query = RosterQuery::default();
                table_response(&state, operator, star, &query, Some(flash), StatusCode::BAD_REQUEST)
                    .await
            }
            Err(response) => response,
        },
    }
}

pub async fn delete_devotee(
    State(state): State<AppState>,
    jar: CookieJar,
    Path((name, id)): Path<(String, i64)>,
    Form(confirm): Form<ConfirmForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let Ok(star) = name.parse::<Nakshatra>() else {
        return unknown_star();
    };

    if !confirm.is_confirmed() {
        let action = format!("{}/devotees/{id}/delete", table_path(star));
        let cancel = table_path(star);
        return Html(render_confirm_page(ConfirmPrompt {
            heading: "Delete devotee",
            message: "Delete this devotee?",
            action: &action,
            confirm_label: "Delete",
            cancel_href: &cancel,
        }))
        .into_response();
    }

    match operator.api.delete_devotee(id).await {
        Ok(()) => {
            Redirect::to(&format!("{}?status=devotee_deleted", table_path(star))).into_response()
        }
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                let query = RosterQuery::default();
                table_response(&state, operator, star, &query, Some(flash), StatusCode::BAD_REQUEST)
                    .await
            }
            Err(response) => response,
        },
    }
}

pub async fn delete_nakshatra(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
    Form(confirm): Form<ConfirmForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let Ok(star) = name.parse::<Nakshatra>() else {
        return unknown_star();
    };

    if !confirm.is_confirmed() {
        let action = format!("{}/delete", table_path(star));
        let cancel = table_path(star);
        let message = format!(
            "Delete every devotee under {}? This cannot be undone.",
            star.as_str()
        );
        return Html(render_confirm_page(ConfirmPrompt {
            heading: "Delete table",
            message: &message,
            action: &action,
            confirm_label: "Yes, delete all",
            cancel_href: &cancel,
        }))
        .into_response();
    }

    let query = RosterQuery::default();
    match operator.api.delete_nakshatra(star).await {
        Ok(summary) => {
            let flash = Flash::success(summary.describe("All devotees deleted"));
            table_response(&state, operator, star, &query, Some(flash), StatusCode::OK).await
        }
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                table_response(&state, operator, star, &query, Some(flash), StatusCode::OK).await
            }
            Err(response) => response,
        },
    }
}

pub async fn export_nakshatra(
    State(state): State<AppState>,
    jar: CookieJar,
    Path((name, format)): Path<(String, String)>,
    Query(query): Query<RosterQuery>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };
    let Ok(star) = name.parse::<Nakshatra>() else {
        return unknown_star();
    };
    let Some(format) = ExportFormat::from_param(&format) else {
        return Redirect::to(&format!("{}?error=unknown_format", table_path(star))).into_response();
    };

    let rows = match operator.api.list_devotees(star).await {
        Ok(rows) => query.apply(&rows),
        Err(err) => {
            return match operator.recover(&state, err).await {
                Ok(_) => Redirect::to(&format!("{}?error=export_failed", table_path(star)))
                    .into_response(),
                Err(response) => response,
            };
        }
    };

    let count = rows.len();
    let today = Local::now().date_naive();
    match export_roster(format, star, rows, today, &state.pdf_settings()).await {
        Ok(file) => {
            info!(nakshatra = %star, format = format.extension(), rows = count, "roster exported");
            attachment(file.filename, file.content_type, file.bytes)
        }
        Err(err) => {
            error!(?err, nakshatra = %star, format = format.extension(), "export failed");
            Redirect::to(&format!("{}?error=export_failed", table_path(star))).into_response()
        }
    }
}

fn attachment(filename: String, content_type: &'static str, bytes: Vec<u8>) -> Response {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

fn render_table(star: Nakshatra, rows: &[Devotee], query: &RosterQuery, flash: Option<&Flash>) -> String {
    let visible = query.apply(rows);
    let base = table_path(star);
    let term = escape_html(query.term());
    let current_sort = query.sort();

    let sort_options = RosterSort::ALL
        .iter()
        .map(|sort| {
            let marker = if *sort == current_sort { " selected" } else { "" };
            format!(
                r#"<option value="{value}"{marker}>{label}</option>"#,
                value = sort.as_param(),
                label = sort.label(),
            )
        })
        .collect::<String>();

    let export_forms = [ExportFormat::Csv, ExportFormat::Xlsx, ExportFormat::Pdf]
        .iter()
        .map(|format| {
            format!(
                r#"<form method="get" action="{base}/export/{ext}" data-allow-repeat>
                    <input type="hidden" name="q" value="{term}">
                    <input type="hidden" name="sort" value="{sort}">
                    <button type="submit" class="secondary">Export {label}</button>
                </form>"#,
                ext = format.extension(),
                sort = current_sort.as_param(),
                label = format.extension().to_uppercase(),
            )
        })
        .collect::<String>();

    let body_rows = if visible.is_empty() {
        r#"<tr><td colspan="6">No devotees found</td></tr>"#.to_string()
    } else {
        visible
            .iter()
            .enumerate()
            .map(|(index, devotee)| render_row(&base, index, devotee))
            .collect::<String>()
    };

    let body = format!(
        r#"        <section class="panel">
            <div class="toolbar">
                <form method="get" action="{base}" class="toolbar">
                    <div>
                        <label for="q">Search</label>
                        <input id="q" type="search" name="q" value="{term}" placeholder="Search by name or phone...">
                    </div>
                    <div>
                        <label for="sort">Sort</label>
                        <select id="sort" name="sort">{sort_options}</select>
                    </div>
                    <button type="submit">Apply</button>
                </form>
            </div>
            <div class="toolbar">
                {export_forms}
                <form method="post" action="{base}/delete">
                    <button type="submit" class="danger">Delete Table</button>
                </form>
            </div>
            <p class="note">Showing {shown} of {total} devotees</p>
            <table>
                <thead>
                    <tr><th>No</th><th>Name</th><th>Country Code</th><th>Phone</th><th>Date &amp; Time</th><th>Actions</th></tr>
                </thead>
                <tbody>
{body_rows}
                </tbody>
            </table>
        </section>"#,
        shown = visible.len(),
        total = rows.len(),
    );

    let heading = format!("{} Nakshatra", star.as_str());
    render_page(PageLayout {
        title: &heading,
        heading: &heading,
        note_html: Cow::Borrowed(""),
        flash,
        body_html: Cow::Owned(body),
    })
}

fn render_row(base: &str, index: usize, devotee: &Devotee) -> String {
    let id = devotee.id;
    format!(
        r#"                    <tr>
                        <td>{number}</td>
                        <td><input form="edit-{id}" name="name" value="{name}" aria-label="Name"></td>
                        <td><input form="edit-{id}" name="country_code" value="{country_code}" aria-label="Country Code"></td>
                        <td><input form="edit-{id}" name="phone" value="{phone}" aria-label="Phone"></td>
                        <td>{created}</td>
                        <td class="row-actions">
                            <form id="edit-{id}" method="post" action="{base}/devotees/{id}">
                                <button type="submit" data-busy-label="Saving...">Save</button>
                            </form>
                            <form method="post" action="{base}/devotees/{id}/delete">
                                <button type="submit" class="danger">Delete</button>
                            </form>
                        </td>
                    </tr>
"#,
        number = index + 1,
        name = escape_html(&devotee.name),
        country_code = escape_html(&devotee.country_code),
        phone = escape_html(&devotee.phone),
        created = escape_html(&format_timestamp(devotee.created_at)),
    )
}

use std::borrow::Cow;

use axum::{
    Router,
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    api::{EntryKind, PendingEntry},
    export::format_timestamp,
    web::{
        AppState,
        auth::{self, Operator},
        flash::{Flash, FlashQuery},
        landing::DevoteeForm,
        templates::{
            ConfirmForm, ConfirmPrompt, PageLayout, escape_html, nakshatra_options,
            render_confirm_page, render_page,
        },
    },
};

fn noun(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Duplicate => "duplicate",
        EntryKind::Invalid => "invalid",
    }
}

fn list_path(kind: EntryKind) -> String {
    format!("/{}", kind.slug())
}

/// Routes for both holding areas, each bound to its kind.
pub fn router() -> Router<AppState> {
    [EntryKind::Duplicate, EntryKind::Invalid]
        .into_iter()
        .fold(Router::new(), |router, kind| {
            let base = list_path(kind);
            router
                .route(
                    &base,
                    get(
                        move |state: State<AppState>, jar: CookieJar, query: Query<FlashQuery>| {
                            entry_list(kind, state, jar, query)
                        },
                    ),
                )
                .route(
                    &format!("{base}/:id/convert"),
                    post(
                        move |state: State<AppState>,
                              jar: CookieJar,
                              id: Path<i64>,
                              form: Form<DevoteeForm>| {
                            convert_entry(kind, state, jar, id, form)
                        },
                    ),
                )
                .route(
                    &format!("{base}/:id/delete"),
                    post(
                        move |state: State<AppState>,
                              jar: CookieJar,
                              id: Path<i64>,
                              confirm: Form<ConfirmForm>| {
                            delete_entry(kind, state, jar, id, confirm)
                        },
                    ),
                )
                .route(
                    &format!("{base}/delete-all"),
                    post(
                        move |state: State<AppState>, jar: CookieJar, confirm: Form<ConfirmForm>| {
                            delete_all_entries(kind, state, jar, confirm)
                        },
                    ),
                )
        })
}

async fn entry_list(
    kind: EntryKind,
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FlashQuery>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };

    entries_response(&state, operator, kind, params.flash(), StatusCode::OK).await
}

async fn entries_response(
    state: &AppState,
    operator: Operator,
    kind: EntryKind,
    flash: Option<Flash>,
    status: StatusCode,
) -> Response {
    match operator.api.list_entries(kind).await {
        Ok(entries) => (status, Html(render_entries(kind, &entries, flash.as_ref()))).into_response(),
        Err(err) => match operator.recover(state, err).await {
            Ok((_, flash)) => (
                StatusCode::BAD_GATEWAY,
                Html(render_entries(kind, &[], Some(&flash))),
            )
                .into_response(),
            Err(response) => response,
        },
    }
}

async fn convert_entry(
    kind: EntryKind,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<DevoteeForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };

    match operator.api.convert_entry(kind, id, &form.to_new_devotee()).await {
        Ok(_) => Redirect::to(&format!("{}?status=entry_converted", list_path(kind))).into_response(),
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                entries_response(&state, operator, kind, Some(flash), StatusCode::BAD_REQUEST).await
            }
            Err(response) => response,
        },
    }
}

async fn delete_entry(
    kind: EntryKind,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(confirm): Form<ConfirmForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };

    if !confirm.is_confirmed() {
        let action = format!("{}/{id}/delete", list_path(kind));
        let message = format!("Delete this {} entry?", noun(kind));
        let cancel = list_path(kind);
        return Html(render_confirm_page(ConfirmPrompt {
            heading: "Delete entry",
            message: &message,
            action: &action,
            confirm_label: "Delete",
            cancel_href: &cancel,
        }))
        .into_response();
    }

    match operator.api.delete_entry(kind, id).await {
        Ok(()) => Redirect::to(&format!("{}?status=entry_deleted", list_path(kind))).into_response(),
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                entries_response(&state, operator, kind, Some(flash), StatusCode::BAD_REQUEST).await
            }
            Err(response) => response,
        },
    }
}

async fn delete_all_entries(
    kind: EntryKind,
    State(state): State<AppState>,
    jar: CookieJar,
    Form(confirm): Form<ConfirmForm>,
) -> Response {
    let Some(operator) = auth::current_operator(&state, &jar).await else {
        return auth::login_redirect();
    };

    if !confirm.is_confirmed() {
        let action = format!("{}/delete-all", list_path(kind));
        let message = format!("Delete all {} entries? This cannot be undone.", noun(kind));
        let cancel = list_path(kind);
        return Html(render_confirm_page(ConfirmPrompt {
            heading: "Delete all entries",
            message: &message,
            action: &action,
            confirm_label: "Yes, delete all",
            cancel_href: &cancel,
        }))
        .into_response();
    }

    match operator.api.delete_all_entries(kind).await {
        Ok(summary) => {
            let flash = Flash::success(summary.describe("All entries deleted"));
            entries_response(&state, operator, kind, Some(flash), StatusCode::OK).await
        }
        Err(err) => match operator.recover(&state, err).await {
            Ok((operator, flash)) => {
                entries_response(&state, operator, kind, Some(flash), StatusCode::BAD_REQUEST).await
            }
            Err(response) => response,
        },
    }
}

fn render_entries(kind: EntryKind, entries: &[PendingEntry], flash: Option<&Flash>) -> String {
    let base = list_path(kind);
    let with_reason = kind == EntryKind::Invalid;
    let reason_header = if with_reason { "<th>Reason</th>" } else { "" };
    let columns = if with_reason { 7 } else { 6 };

    let rows = if entries.is_empty() {
        format!(r#"<tr><td colspan="{columns}">No {} entries</td></tr>"#, noun(kind))
    } else {
        entries
            .iter()
            .map(|entry| render_entry_row(&base, entry, with_reason))
            .collect::<String>()
    };

    let delete_all = if entries.is_empty() {
        String::new()
    } else {
        format!(
            r#"<form method="post" action="{base}/delete-all">
                <button type="submit" class="danger">Delete All</button>
            </form>"#
        )
    };

    let body = format!(
        r#"        <section class="panel">
            <div class="toolbar">
                <p class="note">{count} {noun} entries. Correct a row and save it to register the devotee.</p>
                {delete_all}
            </div>
            <table>
                <thead>
                    <tr><th>Name</th><th>Country Code</th><th>Phone</th><th>Nakshatra</th>{reason_header}<th>Received</th><th>Action</th></tr>
                </thead>
                <tbody>
{rows}
                </tbody>
            </table>
        </section>"#,
        count = entries.len(),
        noun = noun(kind),
    );

    render_page(PageLayout {
        title: kind.title(),
        heading: kind.title(),
        note_html: Cow::Borrowed(""),
        flash,
        body_html: Cow::Owned(body),
    })
}

fn render_entry_row(base: &str, entry: &PendingEntry, with_reason: bool) -> String {
    let id = entry.id;
    let reason = if with_reason {
        format!(
            "<td>{}</td>",
            escape_html(entry.reason.as_deref().unwrap_or(""))
        )
    } else {
        String::new()
    };

    format!(
        r#"                    <tr>
                        <td><input form="convert-{id}" name="name" value="{name}" aria-label="Name"></td>
                        <td><input form="convert-{id}" name="country_code" value="{country_code}" aria-label="Country Code"></td>
                        <td><input form="convert-{id}" name="phone" value="{phone}" aria-label="Phone"></td>
                        <td><select form="convert-{id}" name="nakshatra" aria-label="Nakshatra">{options}</select></td>
                        {reason}
                        <td>{received}</td>
                        <td class="row-actions">
                            <form id="convert-{id}" method="post" action="{base}/{id}/convert">
                                <button type="submit" data-busy-label="Saving...">Save as devotee</button>
                            </form>
                            <form method="post" action="{base}/{id}/delete">
                                <button type="submit" class="danger">Delete</button>
                            </form>
                        </td>
                    </tr>
"#,
        name = escape_html(&entry.name),
        country_code = escape_html(&entry.country_code),
        phone = escape_html(&entry.phone),
        options = nakshatra_options(Some(entry.nakshatra.as_str())),
        received = escape_html(&format_timestamp(entry.created_at)),
    )
}

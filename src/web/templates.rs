use std::borrow::Cow;

use chrono::{Datelike, Utc};
use serde::Deserialize;

use crate::{
    nakshatra::Nakshatra,
    web::flash::{Flash, render_flash},
};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #fdf8f3; color: #1c1917; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #f1e4d6; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; max-width: 1100px; margin: 0 auto; }
        .header-bar h1 { margin: 0; font-size: 1.6rem; }
        nav { display: flex; gap: 0.5rem; flex-wrap: wrap; align-items: center; }
        nav a { color: #9a3412; text-decoration: none; font-weight: 600; background: #ffedd5; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #fed7aa; }
        nav a:hover { background: #fed7aa; }
        nav form { margin: 0; }
        nav button { padding: 0.45rem 0.9rem; border-radius: 999px; background: #1c1917; }
        main { padding: 2rem 1.5rem; max-width: 1100px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #f1e4d6; padding: 1.5rem; box-shadow: 0 18px 40px rgba(28, 25, 23, 0.06); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin: 0.75rem 0 0.35rem; font-weight: 600; }
        input, select { width: 100%; padding: 0.65rem; border-radius: 8px; border: 1px solid #e7d7c6; background: #fffdfa; color: #1c1917; box-sizing: border-box; font-size: 0.95rem; }
        input:focus, select:focus { outline: none; border-color: #ea580c; box-shadow: 0 0 0 3px rgba(234, 88, 12, 0.12); }
        button { padding: 0.7rem 1.1rem; border: none; border-radius: 8px; background: #ea580c; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #c2410c; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        button.danger { background: #b91c1c; }
        button.danger:hover { background: #991b1b; }
        button.secondary { background: #57534e; }
        .form-grid { display: grid; gap: 0 1rem; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); }
        .form-actions { margin-top: 1.25rem; display: flex; gap: 0.75rem; flex-wrap: wrap; align-items: center; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        table { width: 100%; border-collapse: collapse; background: #ffffff; border: 1px solid #f1e4d6; }
        th, td { padding: 0.55rem 0.75rem; border-bottom: 1px solid #f1e4d6; text-align: left; vertical-align: middle; }
        th { background: #fff7ed; font-weight: 600; }
        td input { padding: 0.4rem; }
        td form { margin: 0; }
        .row-actions { display: flex; gap: 0.4rem; }
        .row-actions button { padding: 0.4rem 0.7rem; font-size: 0.85rem; }
        .toolbar { display: flex; gap: 0.75rem; flex-wrap: wrap; align-items: end; margin-bottom: 1rem; }
        .toolbar > * { flex: 0 0 auto; }
        .toolbar input[type="search"] { min-width: 260px; }
        .note { color: #57534e; font-size: 0.95rem; line-height: 1.6; }
        .star-grid { display: grid; gap: 1rem; grid-template-columns: repeat(auto-fill, minmax(160px, 1fr)); }
        .star-card { display: block; padding: 1.1rem; border-radius: 12px; background: #ffffff; border: 1px solid #f1e4d6; text-decoration: none; color: inherit; font-weight: 600; text-align: center; }
        .star-card:hover { border-color: #fb923c; box-shadow: 0 12px 30px rgba(28, 25, 23, 0.08); }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #a8a29e; }
        @media (max-width: 768px) {
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            table { font-size: 0.88rem; }
        }
"#;

/// Disables submit buttons while their form is in flight and ignores repeat submits.
const SUBMIT_GUARD_SCRIPT: &str = r#"
<script>
document.addEventListener('submit', function (event) {
    var form = event.target;
    if (form.hasAttribute('data-allow-repeat')) {
        return;
    }
    if (form.dataset.submitting === 'true') {
        event.preventDefault();
        return;
    }
    form.dataset.submitting = 'true';
    form.querySelectorAll('button[type="submit"]').forEach(function (button) {
        button.disabled = true;
        if (button.dataset.busyLabel) {
            button.textContent = button.dataset.busyLabel;
        }
    });
});
window.addEventListener('pageshow', function () {
    document.querySelectorAll('form[data-submitting="true"]').forEach(function (form) {
        delete form.dataset.submitting;
        form.querySelectorAll('button[type="submit"]').forEach(function (button) {
            button.disabled = false;
        });
    });
});
</script>
"#;

pub struct PageLayout<'a> {
    pub title: &'a str,
    pub heading: &'a str,
    pub note_html: Cow<'a, str>,
    pub flash: Option<&'a Flash>,
    pub body_html: Cow<'a, str>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        heading,
        note_html,
        flash,
        body_html,
    } = layout;

    let note = if note_html.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="note">{note_html}</p>"#)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · Devotee Console</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{heading}</h1>
            <nav>
                <a href="/">Add Devotee</a>
                <a href="/nakshatras">Nakshatras</a>
                <a href="/duplicates">Duplicates</a>
                <a href="/invalids">Invalids</a>
                <form method="post" action="/logout">
                    <button type="submit">Logout</button>
                </form>
            </nav>
        </div>
    </header>
    <main>
        {note}
        {flash}
{body_html}
        {footer}
    </main>
{script}
</body>
</html>"#,
        title = escape_html(title),
        heading = escape_html(heading),
        styles = PAGE_BASE_STYLES,
        flash = render_flash(flash),
        footer = render_footer(),
        script = SUBMIT_GUARD_SCRIPT,
    )
}

/// Body of every destructive POST; anything but `confirmed=yes` asks first.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmForm {
    #[serde(default)]
    pub confirmed: Option<String>,
}

impl ConfirmForm {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.as_deref() == Some("yes")
    }
}

/// A destructive action waiting for an explicit yes.
pub struct ConfirmPrompt<'a> {
    pub heading: &'a str,
    pub message: &'a str,
    pub action: &'a str,
    pub confirm_label: &'a str,
    pub cancel_href: &'a str,
}

pub fn render_confirm_page(prompt: ConfirmPrompt<'_>) -> String {
    let body = format!(
        r#"        <section class="panel">
            <h2>{heading}</h2>
            <p>{message}</p>
            <form method="post" action="{action}">
                <input type="hidden" name="confirmed" value="yes">
                <div class="form-actions">
                    <button type="submit" class="danger" data-busy-label="Deleting...">{confirm_label}</button>
                    <a href="{cancel}">Cancel</a>
                </div>
            </form>
        </section>"#,
        heading = escape_html(prompt.heading),
        message = escape_html(prompt.message),
        action = escape_html(prompt.action),
        confirm_label = escape_html(prompt.confirm_label),
        cancel = escape_html(prompt.cancel_href),
    );

    render_page(PageLayout {
        title: "Confirm",
        heading: "Please confirm",
        note_html: Cow::Borrowed(""),
        flash: None,
        body_html: Cow::Owned(body),
    })
}

const AUTH_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #fdf8f3; color: #1c1917; padding: 1.5rem; box-sizing: border-box; }
        main { width: 100%; max-width: 440px; display: flex; flex-direction: column; gap: 1.5rem; }
        .panel { background: #ffffff; padding: 2.25rem 2rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(28, 25, 23, 0.08); border: 1px solid #f1e4d6; }
        h1 { margin: 0 0 1.5rem; font-size: 1.7rem; text-align: center; }
        label { display: block; margin-top: 1.1rem; font-weight: 600; }
        input { width: 100%; padding: 0.8rem; margin-top: 0.5rem; border-radius: 10px; border: 1px solid #e7d7c6; background: #fffdfa; font-size: 1rem; box-sizing: border-box; }
        button { margin-top: 1.75rem; width: 100%; padding: 0.9rem; border: none; border-radius: 10px; background: #ea580c; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        .switch { margin-top: 1.25rem; text-align: center; }
        .switch a { color: #9a3412; font-weight: 600; }
        .flash { padding: 0.85rem 1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; }
        .flash.success { background: #ecfdf3; color: #166534; }
        .flash.error { background: #fef2f2; color: #b91c1c; }
        .app-footer { text-align: center; font-size: 0.85rem; color: #a8a29e; }
"#;

fn render_auth_page(title: &str, flash: Option<&Flash>, form_html: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} · Devotee Console</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>{title}</h1>
            {flash}
{form_html}
        </section>
        {footer}
    </main>
{script}
</body>
</html>"#,
        title = escape_html(title),
        styles = AUTH_STYLES,
        flash = render_flash(flash),
        footer = render_footer(),
        script = SUBMIT_GUARD_SCRIPT,
    )
}

pub fn render_login_page(flash: Option<&Flash>, username: &str) -> String {
    let form = format!(
        r#"            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" name="username" placeholder="Enter username" value="{username}" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" placeholder="Enter password" required>
                <button type="submit" data-busy-label="Logging in...">Login</button>
            </form>
            <p class="switch">No account? <a href="/register">Register</a></p>"#,
        username = escape_html(username),
    );
    render_auth_page("Temple Login", flash, &form)
}

pub fn render_register_page(flash: Option<&Flash>, username: &str, email: &str) -> String {
    let form = format!(
        r#"            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" name="username" value="{username}" required>
                <label for="email">Email</label>
                <input id="email" type="email" name="email" value="{email}" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <label for="confirm_password">Confirm Password</label>
                <input id="confirm_password" type="password" name="confirm_password" required>
                <button type="submit" data-busy-label="Registering...">Register</button>
            </form>
            <p class="switch">Already registered? <a href="/login">Login</a></p>"#,
        username = escape_html(username),
        email = escape_html(email),
    );
    render_auth_page("Create Account", flash, &form)
}

/// `<option>` list of every nakshatra, with a leading placeholder.
pub fn nakshatra_options(selected: Option<&str>) -> String {
    let selected = selected.map(str::to_uppercase);
    let mut html = String::from(r#"<option value="">Select Nakshatra</option>"#);
    for star in Nakshatra::all() {
        let marker = if selected.as_deref() == Some(star.as_str()) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            r#"<option value="{value}"{marker}>{label}</option>"#,
            value = star.as_str(),
            label = escape_html(&star.display_name()),
        ));
    }
    html
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} Temple Devotee Registry · staff use only</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

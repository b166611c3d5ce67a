use serde::Deserialize;

use crate::web::escape_html;

/// `?status=` / `?error=` codes carried across a redirect.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    pub fn flash(&self) -> Option<Flash> {
        compose_flash_message(self.status.as_deref(), self.error.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flash {
    Success(String),
    Error(String),
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Flash::Success(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Flash::Error(message.into())
    }

    pub fn render(&self) -> String {
        let (class, message) = match self {
            Flash::Success(message) => ("success", message),
            Flash::Error(message) => ("error", message),
        };
        let body = escape_html(message).replace('\n', "<br>");
        format!(r#"<div class="flash {class}" role="status">{body}</div>"#)
    }
}

pub fn render_flash(flash: Option<&Flash>) -> String {
    flash.map(Flash::render).unwrap_or_default()
}

/// Map known status or error codes to a message. Status wins when both are set.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> Option<Flash> {
    if let Some(status) = status {
        let message = match status {
            "logged_out" => "You have been logged out.",
            "registered" => "Registration successful! Please log in.",
            "devotee_added" => "Devotee added successfully!",
            "devotee_updated" => "Devotee updated successfully.",
            "devotee_deleted" => "Devotee deleted.",
            "entry_converted" => "Entry saved as a devotee.",
            "entry_deleted" => "Entry deleted.",
            _ => "",
        };

        if !message.is_empty() {
            return Some(Flash::success(message));
        }
    }

    let error = error?;
    let message = match error {
        "session_expired" => "Your session has expired. Please log in again.",
        "unknown_nakshatra" => "Unknown Nakshatra.",
        "unknown_format" => "Unsupported export format.",
        "export_failed" => "Export failed",
        _ => "Something went wrong. Please try again.",
    };
    Some(Flash::error(message))
}

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub const CONNECTIVITY_MESSAGE: &str = "Cannot connect to server. Is backend running?";
pub const OPERATION_FAILED_MESSAGE: &str = "Operation failed. Please try again.";

/// Everything that can go wrong between the console and the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caught locally, before any network call.
    #[error("{0}")]
    Validation(String),

    /// The API refused a create/update because the record already exists.
    #[error("{0}")]
    Conflict(String),

    /// Any other 400 from the API.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// 401 that survived the refresh cycle, or bad login credentials.
    #[error("authentication failed")]
    Unauthorized,

    /// No usable refresh token; the session has been cleared.
    #[error("session expired")]
    SessionExpired,

    #[error("cannot reach server: {0}")]
    Connectivity(#[source] reqwest::Error),

    #[error("not found")]
    NotFound(Option<String>),

    #[error("server responded with {status}")]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("unexpected response payload: {0}")]
    Decode(String),

    /// Convert created the devotee but the entry removal failed afterwards.
    #[error("devotee {devotee} created but entry could not be removed: {source}")]
    EntryNotRemoved {
        devotee: i64,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Errors after which the browser must go back to the login page.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::SessionExpired)
    }

    /// Message shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(message)
            | ApiError::Conflict(message)
            | ApiError::Rejected(message) => message.clone(),
            ApiError::Unauthorized => "Invalid username or password".to_string(),
            ApiError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            ApiError::Connectivity(_) => CONNECTIVITY_MESSAGE.to_string(),
            ApiError::NotFound(Some(message)) => message.clone(),
            ApiError::NotFound(None) => "Record not found".to_string(),
            ApiError::Server {
                message: Some(message),
                ..
            } => format!("{OPERATION_FAILED_MESSAGE} ({message})"),
            ApiError::Server { message: None, .. } | ApiError::Decode(_) => {
                OPERATION_FAILED_MESSAGE.to_string()
            }
            ApiError::EntryNotRemoved { source, .. } => format!(
                "Devotee was saved, but the entry could not be removed ({}). Delete the entry instead of saving it again.",
                source.user_message()
            ),
        }
    }

    /// Classify a non-success response from the API.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let payload: Option<Value> = serde_json::from_str(body).ok();
        let message = payload.as_ref().and_then(server_message);

        match status {
            StatusCode::BAD_REQUEST => {
                let duplicate = payload
                    .as_ref()
                    .and_then(|value| value.get("duplicate"))
                    .and_then(first_text);
                match duplicate {
                    Some(message) => ApiError::Conflict(message),
                    None => ApiError::Rejected(
                        message.unwrap_or_else(|| "Request was rejected".to_string()),
                    ),
                }
            }
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ => ApiError::Server { status, message },
        }
    }
}

/// Pull the most useful human-readable message out of an error payload.
///
/// Prefers `error`, `detail` and `message`; otherwise takes the first field,
/// unwrapping a list of field errors to its first element.
pub fn server_message(payload: &Value) -> Option<String> {
    let object = match payload {
        Value::Object(map) => map,
        Value::String(text) => return non_empty(text),
        _ => return None,
    };

    for key in ["error", "detail", "message"] {
        if let Some(text) = object.get(key).and_then(first_text) {
            return Some(text);
        }
    }

    object.values().find_map(first_text)
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Array(items) => items.iter().find_map(first_text),
        Value::Object(_) => server_message(value),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

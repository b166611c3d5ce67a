use std::collections::HashMap;

use axum::extract::Multipart;

use crate::upload::UploadedFile;

/// Largest spreadsheet accepted for bulk upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Request body cap for upload routes: the file plus room for multipart framing
/// and the text fields.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when the multipart body itself cannot be read.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Text fields plus the first file posted under `file_field`.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub text_fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(String::as_str)
    }
}

/// Read a multipart form into memory. Files under other field names are
/// rejected; an empty file input (no filename) counts as no file.
pub async fn read_upload_form(mut multipart: Multipart, file_field: &str) -> UploadResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("Could not read the upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|err| UploadError::new(format!("Could not read field `{field_name}`: {err}")))?;
            form.text_fields.insert(field_name, value);
            continue;
        };

        if field_name != file_field {
            return Err(UploadError::new(format!("Unexpected file field `{field_name}`")));
        }
        if file_name.trim().is_empty() || form.file.is_some() {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| UploadError::new(format!("Could not read the uploaded file: {err}")))?
        {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(UploadError::new("The selected file is too large (limit 10 MB)"));
            }
            bytes.extend_from_slice(&chunk);
        }

        form.file = Some(UploadedFile {
            original_name: sanitize_filename::sanitize(&file_name),
            content_type,
            bytes,
        });
    }

    Ok(form)
}

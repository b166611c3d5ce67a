//! Checks run on a bulk upload before it is forwarded to the API.

use std::{io::Cursor, path::Path};

use calamine::{DataType, Reader, Xlsx};

use crate::{
    api::ApiError,
    nakshatra::{Nakshatra, UnknownNakshatra},
};

pub const ALLOWED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

/// A file held in memory after the multipart body was read.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> String {
        Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// A bulk upload that passed every local check.
#[derive(Debug)]
pub struct BulkUpload {
    pub file: UploadedFile,
    pub nakshatra: Nakshatra,
    pub data_rows: usize,
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

pub fn preflight(file: Option<UploadedFile>, nakshatra: Option<&str>) -> Result<BulkUpload, ApiError> {
    let file = file
        .filter(|file| !file.original_name.trim().is_empty())
        .ok_or_else(|| invalid("Please select a CSV or Excel file"))?;

    let nakshatra: Nakshatra = nakshatra
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("Please select Nakshatra for bulk upload"))?
        .parse()
        .map_err(|err: UnknownNakshatra| invalid(err.to_string()))?;

    let extension = file.extension();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid("Upload CSV or XLSX file only"));
    }
    if file.bytes.is_empty() {
        return Err(invalid("The selected file is empty"));
    }

    let data_rows = match extension.as_str() {
        "csv" => count_csv_rows(&file.bytes),
        _ => count_xlsx_rows(&file.bytes)?,
    };
    if data_rows == 0 {
        return Err(invalid("The selected file has no data rows"));
    }

    Ok(BulkUpload {
        file,
        nakshatra,
        data_rows,
    })
}

/// Non-blank lines after the header.
fn count_csv_rows(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes)
        .lines()
        .skip(1)
        .filter(|line| !line.trim().trim_matches(',').trim().is_empty())
        .count()
}

fn count_xlsx_rows(bytes: &[u8]) -> Result<usize, ApiError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|_| invalid("Could not read the Excel file"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| invalid("The Excel file has no sheets"))?
        .map_err(|_| invalid("Could not read the Excel file"))?;

    let rows = range
        .rows()
        .skip(1)
        .filter(|row| row.iter().any(|cell| !matches!(cell, DataType::Empty)))
        .count();
    Ok(rows)
}

//! Downloadable copies of a nakshatra roster.

mod pdf;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_xlsxwriter::{Format, Workbook};
use sanitize_filename::sanitize;
use tokio::task;

use crate::{api::Devotee, nakshatra::Nakshatra};

pub const COLUMNS: [&str; 5] = ["No", "Name", "Country Code", "Phone", "Date & Time"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Where PDF conversion happens and which converter to run.
#[derive(Clone, Debug)]
pub struct PdfSettings {
    pub work_dir: PathBuf,
    pub libreoffice_bin: String,
}

pub fn export_filename(nakshatra: Nakshatra, format: ExportFormat, date: NaiveDate) -> String {
    sanitize(format!(
        "{}_devotees_{}.{}",
        nakshatra.as_str(),
        date.format("%Y-%m-%d"),
        format.extension()
    ))
}

/// Cell values for one devotee, numbered from 1.
fn row_values(index: usize, devotee: &Devotee) -> [String; 5] {
    [
        (index + 1).to_string(),
        devotee.name.clone(),
        devotee.country_code.clone(),
        devotee.phone.clone(),
        format_timestamp(devotee.created_at),
    ]
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%d/%m/%Y, %I:%M:%S %p")
        .to_string()
}

/// Render `rows` in `format`. Blocking work runs off the async runtime.
pub async fn export_roster(
    format: ExportFormat,
    nakshatra: Nakshatra,
    rows: Vec<Devotee>,
    date: NaiveDate,
    pdf: &PdfSettings,
) -> Result<ExportFile> {
    let filename = export_filename(nakshatra, format, date);
    let bytes = match format {
        ExportFormat::Csv => render_csv(&rows).into_bytes(),
        ExportFormat::Xlsx => task::spawn_blocking(move || render_xlsx(nakshatra, &rows))
            .await
            .context("XLSX export task failed")??,
        ExportFormat::Pdf => pdf::render_pdf(nakshatra, rows, pdf).await?,
    };

    Ok(ExportFile {
        filename,
        content_type: format.content_type(),
        bytes,
    })
}

pub fn render_csv(rows: &[Devotee]) -> String {
    let mut out = String::new();
    push_csv_line(&mut out, COLUMNS.iter().copied());
    for (index, devotee) in rows.iter().enumerate() {
        let values = row_values(index, devotee);
        push_csv_line(&mut out, values.iter().map(String::as_str));
    }
    out
}

fn push_csv_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells.map(csv_cell).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

// Spreadsheet apps execute cells starting with these.
const FORMULA_PREFIXES: [char; 4] = ['=', '+', '-', '@'];

fn csv_cell(value: &str) -> String {
    let neutral = if value.starts_with(FORMULA_PREFIXES) && !looks_like_phone_prefix(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };

    if neutral.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", neutral.replace('"', "\"\""))
    } else {
        neutral
    }
}

// "+91" style country codes are data, not formulas.
fn looks_like_phone_prefix(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next() == Some('+')
        && value.len() > 1
        && chars.all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
}

pub fn render_xlsx(nakshatra: Nakshatra, rows: &[Devotee]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(nakshatra.as_str())
        .context("failed to name worksheet")?;

    for (col, title) in COLUMNS.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| anyhow!("too many export columns"))?;
        worksheet
            .write_string_with_format(0, col, *title, &header)
            .context("failed to write header")?;
    }

    for (index, devotee) in rows.iter().enumerate() {
        let row = u32::try_from(index + 1).map_err(|_| anyhow!("too many rows for a worksheet"))?;
        let values = row_values(index, devotee);
        worksheet
            .write_number(row, 0, (index + 1) as f64)
            .context("failed to write row number")?;
        for (col, value) in values.iter().enumerate().skip(1) {
            worksheet
                .write_string(row, col as u16, value)
                .context("failed to write cell")?;
        }
    }

    worksheet
        .set_column_width(1, 28)
        .and_then(|sheet| sheet.set_column_width(3, 16))
        .and_then(|sheet| sheet.set_column_width(4, 24))
        .context("failed to size columns")?;

    workbook
        .save_to_buffer()
        .context("failed to serialize workbook")
}

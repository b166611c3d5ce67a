use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, anyhow};
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use super::{COLUMNS, PdfSettings, row_values};
use crate::{api::Devotee, nakshatra::Nakshatra};

/// Build a DOCX table of the roster and let LibreOffice turn it into a PDF.
pub(super) async fn render_pdf(
    nakshatra: Nakshatra,
    rows: Vec<Devotee>,
    settings: &PdfSettings,
) -> Result<Vec<u8>> {
    let job_dir = settings.work_dir.join(Uuid::new_v4().to_string());
    let binary = settings.libreoffice_bin.clone();

    let dir = job_dir.clone();
    let outcome = task::spawn_blocking(move || -> Result<Vec<u8>> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let docx_path = dir.join(format!("{}_devotees.docx", nakshatra.as_str()));
        write_roster_docx(&docx_path, nakshatra, &rows)?;
        let pdf_path = convert_docx_to_pdf(&binary, &docx_path)?;
        fs::read(&pdf_path).with_context(|| format!("failed to read {}", pdf_path.display()))
    })
    .await
    .context("PDF export task failed")?;

    if let Err(err) = tokio::fs::remove_dir_all(&job_dir).await {
        warn!(?err, dir = %job_dir.display(), "failed to remove export scratch directory");
    }

    outcome
}

fn header_cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text).bold()))
}

fn body_cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
}

pub(super) fn write_roster_docx(path: &Path, nakshatra: Nakshatra, rows: &[Devotee]) -> Result<()> {
    let mut table_rows = vec![TableRow::new(COLUMNS.iter().map(|c| header_cell(c)).collect())];
    for (index, devotee) in rows.iter().enumerate() {
        let cells = row_values(index, devotee)
            .iter()
            .map(|value| body_cell(value))
            .collect();
        table_rows.push(TableRow::new(cells));
    }

    let title = Paragraph::new().add_run(
        Run::new()
            .add_text(format!("{} Devotees", nakshatra.display_name()))
            .bold()
            .size(32),
    );
    let doc = Docx::new()
        .add_paragraph(title)
        .add_table(Table::new(table_rows));

    let file = fs::File::create(path)
        .with_context(|| format!("failed to create DOCX at {}", path.display()))?;
    doc.build()
        .pack(file)
        .with_context(|| format!("failed to pack DOCX to {}", path.display()))?;
    Ok(())
}

fn convert_docx_to_pdf(binary: &str, docx_path: &Path) -> Result<PathBuf> {
    let output_dir = docx_path
        .parent()
        .ok_or_else(|| anyhow!("Invalid DOCX path: missing parent directory"))?;

    let output = Command::new(binary)
        .args([
            "--headless",
            "--convert-to",
            "pdf:writer_pdf_Export",
            "--outdir",
            &output_dir.to_string_lossy(),
            &docx_path.to_string_lossy(),
        ])
        .output()
        .with_context(|| format!("failed to execute {binary}"))?;

    if !output.status.success() {
        return Err(anyhow!(
            "LibreOffice conversion failed with status {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let stem = docx_path
        .file_stem()
        .ok_or_else(|| anyhow!("Invalid DOCX filename"))?
        .to_string_lossy();
    let pdf_path = output_dir.join(format!("{stem}.pdf"));

    if !pdf_path.exists() {
        return Err(anyhow!(
            "PDF file was not created at expected path: {}",
            pdf_path.display()
        ));
    }

    Ok(pdf_path)
}

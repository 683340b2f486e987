use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use triage_core::ReportRow;

pub const REPORT_HEADER: [&str; 4] = ["Image Filename", "Prediction", "Confidence Score", "Status"];

/// Field quoting applied when rendering the report.
///
/// `None` joins raw fields with commas, so a filename containing a comma,
/// quote or line break shifts the columns of its row. `Minimal` quotes such
/// fields the RFC 4180 way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quoting {
    #[default]
    None,
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub quoting: Quoting,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            quoting: Quoting::None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("report filename stem must not be empty")]
    EmptyStem,
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Renders the header line followed by one line per row, joined by `\n`.
/// There is no terminator after the last line.
pub fn render_csv(rows: &[ReportRow], options: &ExportOptions) -> Result<String, ExportError> {
    let quote_style = match options.quoting {
        Quoting::None => QuoteStyle::Never,
        Quoting::Minimal => QuoteStyle::Necessary,
    };
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(quote_style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.write_record([
            row.filename.as_str(),
            row.prediction.as_deref().unwrap_or(""),
            row.confidence.as_deref().unwrap_or(""),
            row.status.as_str(),
        ])?;
    }
    writer.flush()?;
    let data = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;

    let mut text = String::from_utf8(data)
        .map_err(|err| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// `{stem}-{YYYY-MM-DD}.csv`
pub fn report_filename(stem: &str, date: NaiveDate) -> String {
    format!("{stem}-{}.csv", date.format("%Y-%m-%d"))
}

/// Writes the rendered report into `dir`, replacing any report of the same
/// name, and returns its path. The file appears atomically.
pub fn export_report(
    rows: &[ReportRow],
    dir: &Path,
    stem: &str,
    date: NaiveDate,
    options: &ExportOptions,
) -> Result<PathBuf, ExportError> {
    let stem = stem.trim();
    if stem.is_empty() {
        return Err(ExportError::EmptyStem);
    }
    let content = render_csv(rows, options)?;
    write_atomically(dir, &report_filename(stem, date), content.as_bytes())
}

fn ensure_output_dir(dir: &Path) -> Result<(), ExportError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ExportError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| ExportError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes to a temp file in `dir`, syncs it, then renames it over `filename`.
fn write_atomically(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, ExportError> {
    ensure_output_dir(dir)?;

    let target = dir.join(filename);
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| ExportError::OutputDir(e.to_string()))?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&target).map_err(|e| ExportError::Io(e.error))?;
    Ok(target)
}

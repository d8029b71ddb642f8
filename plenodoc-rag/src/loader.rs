//! File loading.
//!
//! [`FileLoader`] turns a file into [`Document`]s, choosing a parser from the
//! file extension (case-insensitive):
//!
//! | Extension | Documents | Unit metadata |
//! |-----------|-----------|---------------|
//! | `.txt`, `.md` | one | - |
//! | `.csv` | one per data row | `row` |
//! | `.pdf` (feature `pdf`) | one per page | `page` |
//! | `.docx` (feature `docx`) | one | - |
//!
//! Parsing is synchronous; async callers should run it on the blocking pool.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::document::{Document, ROW_KEY};
use crate::error::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Csv,
    #[cfg(feature = "pdf")]
    Pdf,
    #[cfg(feature = "docx")]
    Docx,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "md" => Some(Format::Text),
            "csv" => Some(Format::Csv),
            #[cfg(feature = "pdf")]
            "pdf" => Some(Format::Pdf),
            #[cfg(feature = "docx")]
            "docx" => Some(Format::Docx),
            _ => None,
        }
    }
}

/// Documents loaded from a batch of files plus the per-file failures.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// [`RagError::UnsupportedFormat`] and [`RagError::LoadFailed`] entries
    /// for the files that contributed nothing.
    pub warnings: Vec<RagError>,
}

/// Extension-dispatched document loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    /// Extensions this build can parse.
    pub fn supported_extensions() -> Vec<&'static str> {
        let mut extensions = vec!["txt", "md", "csv"];
        if cfg!(feature = "pdf") {
            extensions.push("pdf");
        }
        if cfg!(feature = "docx") {
            extensions.push("docx");
        }
        extensions
    }

    pub fn is_supported(path: &Path) -> bool {
        Format::from_path(path).is_some()
    }

    /// Load one file.
    ///
    /// Each document's `source` is the file name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::UnsupportedFormat`] for an unknown extension and
    /// [`RagError::LoadFailed`] if reading or parsing fails.
    pub fn load(path: &Path) -> Result<Vec<Document>> {
        let format = Format::from_path(path).ok_or_else(|| RagError::UnsupportedFormat { path: path.to_path_buf() })?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| failed(path, "path has no file name"))?;
        let bytes = std::fs::read(path).map_err(|err| failed(path, err))?;

        let documents = match format {
            Format::Text => vec![Document::new(source, String::from_utf8_lossy(&bytes).into_owned())],
            Format::Csv => parse_csv(&source, &bytes).map_err(|err| failed(path, err))?,
            #[cfg(feature = "pdf")]
            Format::Pdf => parse_pdf(&source, &bytes).map_err(|err| failed(path, err))?,
            #[cfg(feature = "docx")]
            Format::Docx => parse_docx(&source, &bytes).map_err(|err| failed(path, err))?,
        };

        debug!(path = %path.display(), documents = documents.len(), "loaded file");
        Ok(documents)
    }

    /// Load every file, collecting failures instead of stopping at the first.
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> LoadReport {
        let mut report = LoadReport::default();
        for path in paths {
            match Self::load(path.as_ref()) {
                Ok(documents) => report.documents.extend(documents),
                Err(err) => {
                    warn!(path = %path.as_ref().display(), error = %err, "skipping file");
                    report.warnings.push(err);
                }
            }
        }
        report
    }
}

fn failed(path: &Path, err: impl std::fmt::Display) -> RagError {
    RagError::LoadFailed { path: PathBuf::from(path), message: err.to_string() }
}

/// One document per data row, each cell rendered as a `header: value` line.
fn parse_csv(source: &str, bytes: &[u8]) -> std::result::Result<Vec<Document>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut documents = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(column, value)| match headers.get(column) {
                Some(header) if !header.trim().is_empty() => format!("{}: {}", header.trim(), value.trim()),
                _ => format!("column {}: {}", column + 1, value.trim()),
            })
            .collect();
        if !lines.is_empty() {
            documents.push(Document::unit(source, ROW_KEY, position + 1, lines.join("\n")));
        }
    }
    Ok(documents)
}

/// One document per page. Pages are separated by form feeds in the
/// extracted text.
#[cfg(feature = "pdf")]
fn parse_pdf(source: &str, bytes: &[u8]) -> std::result::Result<Vec<Document>, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|err| err.to_string())?;
    let text = text.replace('\0', "");
    Ok(text
        .split('\x0c')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(position, page)| Document::unit(source, crate::document::PAGE_KEY, position + 1, page.trim()))
        .collect())
}

#[cfg(feature = "docx")]
fn parse_docx(source: &str, bytes: &[u8]) -> std::result::Result<Vec<Document>, String> {
    let docx = docx_rs::read_docx(bytes).map_err(|err| err.to_string())?;

    let mut text = String::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }
    Ok(vec![Document::new(source, text)])
}

//! Plain-text extraction from uploaded context documents.
//!
//! Text and markdown are decoded directly, PDFs go through `pdf-extract`, DOCX
//! paragraphs are read with `docx-rs`, and images are OCR'd by the `tesseract`
//! CLI.

use std::path::Path;
use std::process::Command;

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use thiserror::Error;
use tracing::{debug, warn};

pub mod form;

/// Separator placed between the texts of individual uploaded files.
pub const FILE_SEPARATOR: &str = "\n\n--- File Separator ---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Pdf,
    Docx,
    Image,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("Could not read DOCX: {0}")]
    Docx(String),

    #[error("OCR failed: {0}. Ensure tesseract is installed and on PATH")]
    Ocr(String),

    #[error("Failed to extract any text from the uploaded files")]
    NoText,
}

impl DocumentFormat {
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "txt" | "md" => Some(DocumentFormat::Text),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "png" | "jpg" | "jpeg" => Some(DocumentFormat::Image),
            _ => None,
        }
    }
}

/// Extracts the text content of one document. Blocking; call from
/// `spawn_blocking` inside async handlers.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, DocumentError> {
    match format {
        DocumentFormat::Text => Ok(decode_text(bytes)),
        DocumentFormat::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))
        }
        DocumentFormat::Docx => extract_docx_text(bytes),
        DocumentFormat::Image => ocr_image(bytes),
    }
}

/// An uploaded file: its name and raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Extracts and joins the text of every upload. Unsupported or unreadable files
/// are skipped with a warning; fails only if no text remains.
pub fn combine_uploads(uploads: &[Upload]) -> Result<String, DocumentError> {
    let mut texts = Vec::new();
    for upload in uploads {
        let Some(format) = DocumentFormat::from_filename(&upload.file_name) else {
            warn!("Skipping unsupported file {}", upload.file_name);
            continue;
        };
        match extract_text(&upload.bytes, format) {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Extracted {} chars from {}", text.len(), upload.file_name);
                texts.push(text);
            }
            Ok(_) => warn!("No text found in {}", upload.file_name),
            Err(e) => warn!("Could not extract text from {}: {e}", upload.file_name),
        }
    }
    if texts.is_empty() {
        return Err(DocumentError::NoText);
    }
    Ok(texts.join(FILE_SEPARATOR))
}

/// UTF-8, falling back to Latin-1 byte-for-char decoding.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            warn!("Text is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocumentError::Docx(e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

/// Run text in order, with tabs and line breaks kept as whitespace.
fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        let ParagraphChild::Run(run) = child else {
            continue;
        };
        for part in &run.children {
            match part {
                RunChild::Text(t) => text.push_str(&t.text),
                RunChild::Tab(_) => text.push('\t'),
                RunChild::Break(_) => text.push('\n'),
                _ => {}
            }
        }
    }
    text
}

fn ocr_image(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut file = tempfile::NamedTempFile::new().map_err(|e| DocumentError::Ocr(e.to_string()))?;
    std::io::Write::write_all(&mut file, bytes).map_err(|e| DocumentError::Ocr(e.to_string()))?;

    let output = Command::new("tesseract")
        .arg(file.path())
        .arg("stdout")
        .output()
        .map_err(|e| DocumentError::Ocr(e.to_string()))?;
    if !output.status.success() {
        return Err(DocumentError::Ocr(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

use crate::error::IngestError;
use crate::models::DocumentKind;
use lopdf::Document as PdfDocument;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// A unit of raw text in source order: the whole file, or one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub page: Option<u32>,
    pub text: String,
}

impl DocumentKind {
    pub fn extract(self, path: &Path) -> Result<Vec<TextUnit>, IngestError> {
        match self {
            Self::PlainText => extract_plain_text(path),
            Self::PaginatedText => extract_pdf_pages(path),
        }
    }
}

fn extract_plain_text(path: &Path) -> Result<Vec<TextUnit>, IngestError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|error| {
        IngestError::Decode(format!(
            "{} is not valid utf-8: {}",
            path.display(),
            error.utf8_error()
        ))
    })?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![TextUnit { page: None, text }])
}

fn extract_pdf_pages(path: &Path) -> Result<Vec<TextUnit>, IngestError> {
    let document =
        PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(TextUnit {
                page: Some(page_no),
                text,
            });
        }
    }

    Ok(pages)
}

pub fn stage_upload(bytes: &[u8], kind: DocumentKind) -> Result<NamedTempFile, IngestError> {
    stage_upload_in(&std::env::temp_dir(), bytes, kind)
}

fn stage_upload_in(
    dir: &Path,
    bytes: &[u8],
    kind: DocumentKind,
) -> Result<NamedTempFile, IngestError> {
    let mut staged = tempfile::Builder::new()
        .prefix("docchat-upload-")
        .suffix(&format!(".{}", kind.extension()))
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}

/// The staged file never outlives the call, whether extraction succeeds or not.
pub fn extract_upload(bytes: &[u8], kind: DocumentKind) -> Result<Vec<TextUnit>, IngestError> {
    extract_upload_in(&std::env::temp_dir(), bytes, kind)
}

fn extract_upload_in(
    dir: &Path,
    bytes: &[u8],
    kind: DocumentKind,
) -> Result<Vec<TextUnit>, IngestError> {
    let staged = stage_upload_in(dir, bytes, kind)?;
    kind.extract(staged.path())
}

use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    PlainText,
    PaginatedText,
}

impl DocumentKind {
    pub fn from_file_name(name: &str) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                IngestError::UnsupportedFormat(format!("file has no extension: {name}"))
            })?;

        if extension.eq_ignore_ascii_case("txt") {
            Ok(Self::PlainText)
        } else if extension.eq_ignore_ascii_case("pdf") {
            Ok(Self::PaginatedText)
        } else {
            Err(IngestError::UnsupportedFormat(format!(".{extension}")))
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::PaginatedText => "pdf",
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::PaginatedText => "paginated-text",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain-text" | "txt" | "text" => Ok(Self::PlainText),
            "paginated-text" | "pdf" => Ok(Self::PaginatedText),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, kind: DocumentKind) -> Self {
        Self {
            name: name.into(),
            bytes,
            kind,
        }
    }

    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, IngestError> {
        let name = name.into();
        let kind = DocumentKind::from_file_name(&name)?;
        Ok(Self { name, bytes, kind })
    }

    pub fn with_tag(
        name: impl Into<String>,
        bytes: Vec<u8>,
        tag: &str,
    ) -> Result<Self, IngestError> {
        Ok(Self::new(name, bytes, tag.parse()?))
    }

    pub fn fingerprint(&self) -> DocumentFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        DocumentFingerprint {
            name: self.name.clone(),
            kind: self.kind,
            checksum: format!("{:x}", hasher.finalize()),
            ingested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentFingerprint {
    pub name: String,
    pub kind: DocumentKind,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Contiguous slice of a document's extracted text.
///
/// `start_char..end_char` are character offsets into the extracted text,
/// i.e. all text units concatenated in source order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub document: String,
    pub start_char: usize,
    pub end_char: usize,
    pub page: Option<u32>,
    pub text: String,
}

impl Segment {
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }

    /// First `max_chars` characters, with `...` appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub loaded: bool,
    pub name: Option<String>,
    pub segment_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document: DocumentFingerprint,
    pub segment_count: usize,
}

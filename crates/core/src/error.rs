use thiserror::Error;

/// Failures reported by an external provider (embedding or generation).
///
/// Response bodies are never carried in the error; they are logged at debug
/// level by the client that saw them.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{provider} rejected the credentials")]
    Auth { provider: String },

    #[error("{provider} quota exhausted or rate limited")]
    Quota { provider: String },

    #[error("network failure reaching {provider}: {details}")]
    Network { provider: String, details: String },

    #[error("{provider} returned status {status}")]
    Status { provider: String, status: u16 },

    #[error("malformed response from {provider}: {details}")]
    MalformedResponse { provider: String, details: String },

    #[error("provider not configured: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn from_status(provider: &str, status: reqwest::StatusCode) -> Self {
        let provider = provider.to_string();
        match status.as_u16() {
            401 | 403 => Self::Auth { provider },
            429 => Self::Quota { provider },
            code => Self::Status {
                provider,
                status: code,
            },
        }
    }

    pub fn network(provider: &str, error: &reqwest::Error) -> Self {
        let details = if error.is_timeout() {
            "request timed out"
        } else if error.is_connect() {
            "connection failed"
        } else if error.is_decode() {
            "response body could not be decoded"
        } else {
            "request failed"
        };
        Self::Network {
            provider: provider.to_string(),
            details: details.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector dimension {found} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("{vectors} vectors supplied for {segments} segments")]
    CountMismatch { segments: usize, vectors: usize },

    #[error("index is empty")]
    Empty,

    #[error("index storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index snapshot error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("text decode error: {0}")]
    Decode(String),

    #[error("document has no extractable text: {0}")]
    EmptyDocument(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding service error: {0}")]
    EmbeddingService(#[source] ServiceError),

    #[error("index build error: {0}")]
    IndexBuild(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("no document loaded; upload a document first")]
    NoDocumentLoaded,

    #[error("embedding service error: {0}")]
    EmbeddingService(#[source] ServiceError),

    #[error("index is empty")]
    IndexEmpty,

    #[error("index error: {0}")]
    Index(#[source] IndexError),

    #[error("generation error: {0}")]
    Generation(#[source] ServiceError),
}

impl AskError {
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::NoDocumentLoaded | Self::IndexEmpty)
    }
}

impl From<IndexError> for AskError {
    fn from(value: IndexError) -> Self {
        match value {
            IndexError::Empty => Self::IndexEmpty,
            other => Self::Index(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum SessionOpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

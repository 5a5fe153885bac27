pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod models;
pub mod openai;
pub mod retriever;
pub mod session;
pub mod stores;
pub mod synthesizer;
pub mod traits;

pub use chunking::{chunk_units, ChunkingConfig};
pub use config::RagSettings;
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AskError, ConfigError, IndexError, IngestError, ServiceError, SessionOpenError};
pub use extractor::{extract_upload, stage_upload, TextUnit};
pub use models::{
    Answer, Document, DocumentFingerprint, DocumentKind, IngestionReport, ScoredSegment, Segment,
    SessionStatus,
};
pub use openai::{OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};
pub use retriever::retrieve;
pub use session::{DocumentSession, SessionState};
pub use stores::{DiskIndex, InMemoryIndex, IndexEntry};
pub use synthesizer::{build_prompt, AnswerSynthesizer};
pub use traits::{LanguageModel, VectorIndex};

use crate::chunking::{chunk_units, ChunkingConfig};
use crate::config::RagSettings;
use crate::embeddings::Embedder;
use crate::error::{AskError, ConfigError, IndexError, IngestError, SessionOpenError};
use crate::extractor::extract_upload;
use crate::models::{Answer, Document, IngestionReport, SessionStatus};
use crate::retriever::retrieve;
use crate::stores::DiskIndex;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{LanguageModel, VectorIndex};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Ready {
        document_name: String,
        segment_count: usize,
    },
}

struct Inner {
    index: Box<dyn VectorIndex>,
    state: SessionState,
}

impl Inner {
    fn status(&self) -> SessionStatus {
        match &self.state {
            SessionState::Empty => SessionStatus::default(),
            SessionState::Ready { document_name, .. } => SessionStatus {
                loaded: true,
                name: Some(document_name.clone()),
                segment_count: Some(self.index.len()),
            },
        }
    }
}

/// The single active document, its index, and the providers used to query it.
///
/// `ingest` and `reset` hold the write lock until they commit or roll back;
/// `ask` and `status` share the read lock.
pub struct DocumentSession {
    inner: RwLock<Inner>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    settings: RagSettings,
}

impl DocumentSession {
    pub fn new(
        index: Box<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        settings: RagSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        // an index restored from disk makes the session ready again
        let restorable = !index.is_empty() && built_with(index.as_ref(), embedder.as_ref());
        let state = match index.document() {
            Some(name) if restorable => SessionState::Ready {
                document_name: name.to_string(),
                segment_count: index.len(),
            },
            _ => SessionState::Empty,
        };

        Ok(Self {
            inner: RwLock::new(Inner { index, state }),
            embedder,
            model,
            settings,
        })
    }

    pub async fn open(
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        settings: RagSettings,
    ) -> Result<Self, SessionOpenError> {
        let mut index = DiskIndex::open(&settings.index_path)
            .await?
            .with_embedder(embedder.name());

        if !index.is_empty() && !built_with(&index, embedder.as_ref()) {
            warn!(
                path = %settings.index_path.display(),
                stored_embedder = index.built_by().unwrap_or("unknown"),
                stored_dimensions = index.dimensions(),
                embedder = embedder.name(),
                "persisted index was built by another embedder; discarding it"
            );
            index.clear().await?;
        }

        Ok(Self::new(Box::new(index), embedder, model, settings)?)
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// An unsupported format is rejected before the session is touched.
    pub async fn ingest_upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        format: Option<&str>,
    ) -> Result<IngestionReport, IngestError> {
        let document = match format {
            Some(tag) => Document::with_tag(name, bytes, tag)?,
            None => Document::from_upload(name, bytes)?,
        };
        self.ingest(document).await
    }

    /// Replaces the active document. On any failure the session ends up empty.
    pub async fn ingest(&self, document: Document) -> Result<IngestionReport, IngestError> {
        let mut inner = self.inner.write().await;
        let fingerprint = document.fingerprint();

        info!(
            document = %fingerprint.name,
            kind = document.kind.as_tag(),
            bytes = document.bytes.len(),
            "ingesting document"
        );

        match self.build_index(&mut *inner, document).await {
            Ok(segment_count) => {
                inner.state = SessionState::Ready {
                    document_name: fingerprint.name.clone(),
                    segment_count,
                };
                info!(document = %fingerprint.name, segment_count, "document ready");
                Ok(IngestionReport {
                    document: fingerprint,
                    segment_count,
                })
            }
            Err(error) => {
                warn!(document = %fingerprint.name, %error, "ingestion failed; clearing session");
                inner.state = SessionState::Empty;
                if let Err(clear_error) = inner.index.clear().await {
                    warn!(%clear_error, "failed to clear index after ingestion failure");
                }
                Err(error)
            }
        }
    }

    async fn build_index(&self, inner: &mut Inner, document: Document) -> Result<usize, IngestError> {
        // the previous document is gone as soon as a new one is submitted
        inner.state = SessionState::Empty;
        inner.index.clear().await?;

        let Document { name, bytes, kind } = document;
        let units = tokio::task::spawn_blocking(move || extract_upload(&bytes, kind))
            .await
            .map_err(|error| IngestError::Io(std::io::Error::other(error)))??;

        let config: ChunkingConfig = self.settings.chunking();
        let segments = chunk_units(&name, &units, config)?;
        if segments.is_empty() {
            return Err(IngestError::EmptyDocument(name));
        }

        let texts: Vec<&str> = segments.iter().map(|segment| segment.text.as_str()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(IngestError::EmbeddingService)?;

        let segment_count = segments.len();
        inner.index.build(segments, vectors).await?;
        Ok(segment_count)
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let inner = self.inner.read().await;
        if inner.state == SessionState::Empty {
            return Err(AskError::NoDocumentLoaded);
        }

        let retrieved = retrieve(
            self.embedder.as_ref(),
            inner.index.as_ref(),
            question,
            self.settings.top_k,
        )
        .await?;

        let answer = AnswerSynthesizer::new(self.model.as_ref(), self.settings.preview_chars)
            .answer(question, &retrieved)
            .await?;

        info!(
            top_k = self.settings.top_k,
            sources = answer.sources.len(),
            "answered question"
        );
        Ok(answer)
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.read().await.status()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state.clone()
    }

    pub async fn reset(&self) -> Result<(), IndexError> {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Empty;
        if let Err(error) = inner.index.clear().await {
            warn!(%error, "reset could not clear the index");
            return Err(error);
        }
        info!("session reset");
        Ok(())
    }
}

fn built_with(index: &dyn VectorIndex, embedder: &dyn Embedder) -> bool {
    let same_name = index.built_by().map_or(true, |name| name == embedder.name());
    let same_dimensions = match (index.dimensions(), embedder.dimensions()) {
        (Some(stored), Some(produced)) => stored == produced,
        _ => true,
    };
    same_name && same_dimensions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::ServiceError;
    use crate::extractor::tests::pdf_with_pages;
    use crate::models::DocumentKind;
    use crate::stores::InMemoryIndex;
    use async_trait::async_trait;

    struct CannedModel;

    #[async_trait]
    impl LanguageModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
            Ok("canned".to_string())
        }
    }

    fn session() -> DocumentSession {
        DocumentSession::new(
            Box::new(InMemoryIndex::new()),
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(CannedModel),
            RagSettings::default(),
        )
        .expect("default settings are valid")
    }

    #[tokio::test]
    async fn paginated_segments_carry_their_page() -> Result<(), Box<dyn std::error::Error>> {
        let session = session();
        let bytes = pdf_with_pages(&["Reactor cooling overview", "Turbine maintenance schedule"]);

        let report = session
            .ingest(Document::new("plant.pdf", bytes, DocumentKind::PaginatedText))
            .await?;
        assert_eq!(report.segment_count, 2);

        let inner = session.inner.read().await;
        let query = CharacterNgramEmbedder::default().embed_text("anything");
        let mut hits = inner.index.search(&query, 10).await?;
        hits.sort_by_key(|hit| hit.segment.index);

        assert_eq!(hits[0].segment.page, Some(1));
        assert!(hits[0].segment.text.contains("Reactor"));
        assert_eq!(hits[1].segment.page, Some(2));
        assert!(hits[1].segment.text.contains("Turbine"));
        assert!(hits.iter().all(|hit| hit.segment.document == "plant.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_pdf_rolls_back() {
        let session = session();
        let result = session
            .ingest(Document::new(
                "broken.pdf",
                b"%PDF-1.4\n%broken".to_vec(),
                DocumentKind::PaginatedText,
            ))
            .await;

        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        assert_eq!(session.state().await, SessionState::Empty);
        assert!(session.inner.read().await.index.is_empty());
    }

    #[tokio::test]
    async fn new_document_replaces_previous_entries() -> Result<(), Box<dyn std::error::Error>> {
        let session = session();
        session
            .ingest(Document::new(
                "first.txt",
                "first ".repeat(400).into_bytes(),
                DocumentKind::PlainText,
            ))
            .await?;
        session
            .ingest(Document::new(
                "second.txt",
                b"second document".to_vec(),
                DocumentKind::PlainText,
            ))
            .await?;

        let inner = session.inner.read().await;
        assert_eq!(inner.index.len(), 1);
        assert_eq!(inner.index.document(), Some("second.txt"));
        assert_eq!(
            inner.state,
            SessionState::Ready {
                document_name: "second.txt".to_string(),
                segment_count: 1,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn index_from_another_embedder_is_not_restored() -> Result<(), Box<dyn std::error::Error>> {
        let mut index = InMemoryIndex::new();
        let segment = crate::stores::memory::tests::segment(0, "stored text");
        index.build(vec![segment], vec![vec![0.5; 16]]).await?;

        let session = DocumentSession::new(
            Box::new(index),
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(CannedModel),
            RagSettings::default(),
        )?;
        assert_eq!(session.state().await, SessionState::Empty);
        assert!(matches!(
            session.ask("what is stored?").await,
            Err(AskError::NoDocumentLoaded)
        ));
        Ok(())
    }

    struct StuckIndex(InMemoryIndex);

    #[async_trait]
    impl VectorIndex for StuckIndex {
        async fn build(
            &mut self,
            segments: Vec<crate::models::Segment>,
            vectors: Vec<Vec<f32>>,
        ) -> Result<(), IndexError> {
            self.0.build(segments, vectors).await
        }

        async fn search(
            &self,
            query: &[f32],
            k: usize,
        ) -> Result<Vec<crate::models::ScoredSegment>, IndexError> {
            self.0.search(query, k).await
        }

        async fn clear(&mut self) -> Result<(), IndexError> {
            Err(IndexError::Io(std::io::Error::other("read-only volume")))
        }

        fn len(&self) -> usize {
            self.0.len()
        }

        fn document(&self) -> Option<&str> {
            self.0.document()
        }

        fn dimensions(&self) -> Option<usize> {
            self.0.dimensions()
        }
    }

    #[tokio::test]
    async fn reset_reports_clear_failure_and_stays_empty() -> Result<(), Box<dyn std::error::Error>> {
        let mut index = InMemoryIndex::new();
        let embedder = CharacterNgramEmbedder::default();
        let segment = crate::stores::memory::tests::segment(0, "kept on disk");
        index.build(vec![segment], vec![embedder.embed_text("kept on disk")]).await?;

        let session = DocumentSession::new(
            Box::new(StuckIndex(index)),
            Arc::new(embedder),
            Arc::new(CannedModel),
            RagSettings::default(),
        )?;
        assert!(session.status().await.loaded);

        assert!(matches!(session.reset().await, Err(IndexError::Io(_))));
        assert_eq!(session.state().await, SessionState::Empty);
        assert!(matches!(
            session.ask("anything").await,
            Err(AskError::NoDocumentLoaded)
        ));
        Ok(())
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let result = DocumentSession::new(
            Box::new(InMemoryIndex::new()),
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(CannedModel),
            RagSettings {
                chunk_overlap: 2_000,
                ..RagSettings::default()
            },
        );
        assert!(result.is_err());
    }
}

use crate::embeddings::Embedder;
use crate::error::AskError;
use crate::models::ScoredSegment;
use crate::traits::VectorIndex;
use tracing::debug;

pub async fn retrieve(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    question: &str,
    top_k: usize,
) -> Result<Vec<ScoredSegment>, AskError> {
    let query_vector = embedder
        .embed(question)
        .await
        .map_err(AskError::EmbeddingService)?;

    let hits = index.search(&query_vector, top_k).await?;
    debug!(
        top_k,
        hits = hits.len(),
        nearest = hits.first().map(|hit| hit.distance),
        "retrieved segments"
    );
    Ok(hits)
}

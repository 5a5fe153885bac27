use crate::error::{IndexError, ServiceError};
use crate::models::{ScoredSegment, Segment};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn build(&mut self, segments: Vec<Segment>, vectors: Vec<Vec<f32>>)
        -> Result<(), IndexError>;

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, IndexError>;

    async fn clear(&mut self) -> Result<(), IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn document(&self) -> Option<&str>;

    fn dimensions(&self) -> Option<usize>;

    fn built_by(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

use crate::error::IndexError;
use crate::models::{ScoredSegment, Segment};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub segment: Segment,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.vector.len())
    }

    /// Validates `segments`/`vectors` and pairs them without touching the index.
    pub fn prepare_entries(
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<IndexEntry>, IndexError> {
        if segments.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                segments: segments.len(),
                vectors: vectors.len(),
            });
        }

        if let Some(expected) = vectors.first().map(Vec::len) {
            if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    found: bad.len(),
                });
            }
        }

        Ok(segments
            .into_iter()
            .zip(vectors)
            .map(|(segment, vector)| IndexEntry { segment, vector })
            .collect())
    }

    pub fn replace_entries(&mut self, entries: Vec<IndexEntry>) {
        self.entries = entries;
    }

    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, IndexError> {
        let expected = self.dimensions().ok_or(IndexError::Empty)?;
        if query.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                found: query.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (squared_distance(&entry.vector, query), entry))
            .collect();

        scored.sort_by(|(left_distance, left), (right_distance, right)| {
            match left_distance.total_cmp(right_distance) {
                Ordering::Equal => left.segment.index.cmp(&right.segment.index),
                other => other,
            }
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, entry)| ScoredSegment {
                segment: entry.segment.clone(),
                distance,
            })
            .collect())
    }
}

fn squared_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn build(
        &mut self,
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        let entries = Self::prepare_entries(segments, vectors)?;
        self.replace_entries(entries);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, IndexError> {
        self.nearest(query, k)
    }

    async fn clear(&mut self) -> Result<(), IndexError> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn document(&self) -> Option<&str> {
        self.entries
            .first()
            .map(|entry| entry.segment.document.as_str())
    }

    fn dimensions(&self) -> Option<usize> {
        InMemoryIndex::dimensions(self)
    }
}

use crate::error::IndexError;
use crate::models::{ScoredSegment, Segment};
use crate::stores::memory::{InMemoryIndex, IndexEntry};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_VERSION: u32 = 2;

/// [`InMemoryIndex`] mirrored to `<root>/index.json` so it survives restarts.
///
/// `clear` deletes `root` entirely.
#[derive(Debug)]
pub struct DiskIndex {
    root: PathBuf,
    memory: InMemoryIndex,
    built_at: Option<DateTime<Utc>>,
    embedder: Option<String>,
    built_by: Option<String>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    built_at: DateTime<Utc>,
    embedder: Option<&'a str>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    built_at: DateTime<Utc>,
    embedder: Option<String>,
    entries: Vec<IndexEntry>,
}

impl DiskIndex {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let root = root.into();
        let mut index = Self {
            root,
            memory: InMemoryIndex::new(),
            built_at: None,
            embedder: None,
            built_by: None,
        };

        let path = index.snapshot_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(index),
            Err(error) => return Err(error.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Io(std::io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            )));
        }

        // re-validate: a hand-edited snapshot must not bypass the build checks
        let (segments, vectors): (Vec<Segment>, Vec<Vec<f32>>) = snapshot
            .entries
            .into_iter()
            .map(|entry| (entry.segment, entry.vector))
            .unzip();
        let entries = InMemoryIndex::prepare_entries(segments, vectors)?;

        info!(
            path = %path.display(),
            entries = entries.len(),
            built_at = %snapshot.built_at.to_rfc3339(),
            embedder = snapshot.embedder.as_deref().unwrap_or("unknown"),
            "loaded persisted index"
        );
        index.memory.replace_entries(entries);
        index.built_at = Some(snapshot.built_at);
        index.built_by = snapshot.embedder;
        Ok(index)
    }

    /// Name recorded in every snapshot written from now on.
    pub fn with_embedder(mut self, embedder: impl Into<String>) -> Self {
        self.embedder = Some(embedder.into());
        self
    }

    pub async fn purge(root: &Path) -> Result<(), IndexError> {
        match tokio::fs::remove_dir_all(root).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    async fn persist(&self, entries: &[IndexEntry], built_at: DateTime<Utc>) -> Result<(), IndexError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let data = serde_json::to_vec(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            built_at,
            embedder: self.embedder.as_deref(),
            entries,
        })?;

        let staging = self.root.join(format!("{SNAPSHOT_FILE}.tmp"));
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, self.snapshot_path()).await?;
        debug!(path = %self.snapshot_path().display(), entries = entries.len(), "persisted index");
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for DiskIndex {
    async fn build(
        &mut self,
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<(), IndexError> {
        let entries = InMemoryIndex::prepare_entries(segments, vectors)?;
        let built_at = Utc::now();
        self.persist(&entries, built_at).await?;
        self.memory.replace_entries(entries);
        self.built_at = Some(built_at);
        self.built_by = self.embedder.clone();
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredSegment>, IndexError> {
        self.memory.nearest(query, k)
    }

    async fn clear(&mut self) -> Result<(), IndexError> {
        self.memory.replace_entries(Vec::new());
        self.built_at = None;
        self.built_by = None;
        Self::purge(&self.root).await.map_err(|error| {
            warn!(path = %self.root.display(), %error, "failed to remove persisted index");
            error
        })
    }

    fn len(&self) -> usize {
        self.memory.entries().len()
    }

    fn document(&self) -> Option<&str> {
        self.memory.document()
    }

    fn dimensions(&self) -> Option<usize> {
        self.memory.dimensions()
    }

    fn built_by(&self) -> Option<&str> {
        self.built_by.as_deref()
    }
}

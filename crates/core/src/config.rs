use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_PREVIEW_CHARS: usize = 100;
pub const DEFAULT_INDEX_PATH: &str = "./vector_db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Length of each source excerpt returned with an answer.
    pub preview_chars: usize,
    pub index_path: PathBuf,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
        }
    }
}

impl RagSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid {
                field: "chunk_overlap",
                reason: format!(
                    "{} must be less than chunk_size {}",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "top_k",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RagSettings::default().validate().is_ok());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let settings = RagSettings {
            chunk_overlap: 1_000,
            ..RagSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                field: "chunk_overlap",
                ..
            })
        ));
    }

    #[test]
    fn top_k_must_be_positive() {
        let settings = RagSettings {
            top_k: 0,
            ..RagSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}

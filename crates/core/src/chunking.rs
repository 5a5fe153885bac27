use crate::error::IngestError;
use crate::extractor::TextUnit;
use crate::models::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be less than chunk size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    pub fn expected_segments(&self, chars: usize) -> usize {
        if chars == 0 {
            0
        } else if chars <= self.chunk_size {
            1
        } else {
            (chars - self.overlap).div_ceil(self.step())
        }
    }
}

/// Splits each unit into overlapping windows of at most `chunk_size` characters.
///
/// Windows never cross unit boundaries so every segment keeps the page it came
/// from. Offsets are counted across all units in order, so the spans of the
/// returned segments tile the concatenated text.
pub fn chunk_units(
    document: &str,
    units: &[TextUnit],
    config: ChunkingConfig,
) -> Result<Vec<Segment>, IngestError> {
    config.validate()?;

    let mut segments = Vec::new();
    let mut unit_offset = 0usize;

    for unit in units {
        let chars: Vec<char> = unit.text.chars().collect();
        let mut start = 0usize;

        while start < chars.len() {
            let end = (start + config.chunk_size).min(chars.len());
            segments.push(Segment {
                index: segments.len(),
                document: document.to_string(),
                start_char: unit_offset + start,
                end_char: unit_offset + end,
                page: unit.page,
                text: chars[start..end].iter().collect(),
            });
            if end == chars.len() {
                break;
            }
            start = end - config.overlap;
        }

        unit_offset += chars.len();
    }

    Ok(segments)
}

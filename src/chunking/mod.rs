//! Text chunking: recursive separator-based splitting with overlap.
//! Fenced code blocks stay whole when they fit in one chunk.

pub mod fences;
pub mod recursive;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Chunk, ChunkMetadata, NormalizedRecord};

use self::recursive::RecursiveSplitter;

const TITLE_PREFIX: &str = "Title: ";
const ANSWER_DELIMITER: &str = "\nAnswer: ";

/// Chunk size bounds, counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkConfigError {
    #[error("chunk max_size must be at least 1")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than max_size ({max_size})")]
    OverlapTooLarge { overlap: usize, max_size: usize },
}

impl ChunkConfig {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        let config = Self { max_size, overlap };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChunkConfigError> {
        if self.max_size == 0 {
            return Err(ChunkConfigError::ZeroSize);
        }
        if self.overlap >= self.max_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                overlap: self.overlap,
                max_size: self.max_size,
            });
        }
        Ok(())
    }
}

/// Split text into overlapping chunks of at most `config.max_size` characters.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let segments = fences::segments(text);
    RecursiveSplitter::new(*config).split_segments(&segments)
}

/// The stored text of a record: title and answer joined with the fixed delimiters.
pub fn compose_document(title: &str, answer: &str) -> String {
    format!("{TITLE_PREFIX}{title}{ANSWER_DELIMITER}{answer}")
}

/// Split stored chunk text back into `(title, answer)`.
/// Chunks cut after the delimiter carry no answer part; that's not an error.
pub fn split_document(text: &str) -> (String, String) {
    let (head, answer) = match text.split_once(ANSWER_DELIMITER) {
        Some((head, answer)) => (head, answer),
        None => (text, ""),
    };
    let title = head.strip_prefix(TITLE_PREFIX).unwrap_or(head);
    (title.to_string(), answer.to_string())
}

/// Chunk a normalized record. Records missing a title or answer yield nothing.
pub fn chunk_record(record: &NormalizedRecord, config: &ChunkConfig) -> Vec<Chunk> {
    let (Some(title), Some(body)) = (&record.title, &record.accepted_answer_body) else {
        return Vec::new();
    };

    let metadata = Arc::new(ChunkMetadata {
        question_id: record.id,
        title: title.clone(),
        link: record.link.clone(),
        answer_count: record.answer_count,
        answer_score: record.accepted_answer_score,
        answer_body: body.clone(),
    });

    chunk_text(&compose_document(title, body), config)
        .into_iter()
        .map(|text| Chunk {
            text,
            metadata: Arc::clone(&metadata),
        })
        .collect()
}

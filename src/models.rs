use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::conversation::ConversationTurn;

/// A question with its accepted answer, as fetched from the content source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: u64,
    pub title: Option<String>,
    pub link: String,
    #[serde(default)]
    pub answer_count: u32,
    #[serde(default)]
    pub accepted_answer_score: i64,
    pub accepted_answer_body: Option<String>,
}

/// A record whose title and answer body went through the normalizer.
/// `None` marks a field that was absent or normalized to nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: u64,
    pub title: Option<String>,
    pub link: String,
    pub answer_count: u32,
    pub accepted_answer_score: i64,
    pub accepted_answer_body: Option<String>,
}

/// Back-references from a chunk to the record it was cut from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub question_id: u64,
    pub title: String,
    pub link: String,
    pub answer_count: u32,
    pub answer_score: i64,
    /// Full, un-chunked accepted answer
    pub answer_body: String,
}

/// A bounded text segment, the unit stored in the index.
/// All chunks of one record share the same metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub metadata: Arc<ChunkMetadata>,
}

/// A ranked answer returned by the retrieval pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Question ID")]
    pub question_id: u64,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "Answer Chunks")]
    pub answer_text: String,
    #[serde(rename = "Answer Count")]
    pub answer_count: u32,
    #[serde(rename = "Answer Score")]
    pub answer_score: i64,
    /// Cross-encoder score; orders results but is not part of the wire shape
    #[serde(skip)]
    pub relevance_score: f32,
}

/// Ask request
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub query: String,
    /// Dataset tag; the configured default when absent
    pub dataset: Option<String>,
    /// Caller-chosen conversation key the turns are appended to
    pub context_id: Option<String>,
    pub top_k: Option<usize>,
}

/// Ask response
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub results: Vec<RetrievalResult>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub dataset: Option<String>,
    pub top_k: Option<usize>,
}

/// Search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<RetrievalResult>,
}

/// Ingest request carrying already-fetched records
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<RawRecord>,
}

/// Fetch-then-ingest request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchRequest {
    pub max_pages: Option<u32>,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub dataset: String,
    pub records: usize,
    /// Records left out because their title or answer was absent
    pub skipped: usize,
    pub chunks: usize,
}

/// Dataset listing entry
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub dataset: String,
    /// Whether the index is currently held in memory
    pub loaded: bool,
    pub entries: usize,
}

/// Conversation listing
#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub context_id: String,
    pub turns: Vec<TurnView>,
}

/// A turn with its display label resolved
#[derive(Debug, Clone, Serialize)]
pub struct TurnView {
    pub role: String,
    pub label: String,
    pub content: String,
}

impl From<&ConversationTurn> for TurnView {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            label: turn.role.display_label().to_string(),
            content: turn.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> RetrievalResult {
        RetrievalResult {
            title: "How do I reverse a vector?".to_string(),
            question_id: 42,
            link: "https://stackoverflow.com/q/42".to_string(),
            answer_text: "Use std::reverse".to_string(),
            answer_count: 3,
            answer_score: 17,
            relevance_score: 0.9,
        }
    }

    #[test]
    fn test_retrieval_result_wire_field_names() {
        let json = serde_json::to_value(sample_result()).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "Answer Chunks",
                "Answer Count",
                "Answer Score",
                "Link",
                "Question ID",
                "Title"
            ]
        );
        assert_eq!(obj["Question ID"], 42);
        assert_eq!(obj["Answer Chunks"], "Use std::reverse");
    }

    #[test]
    fn test_raw_record_defaults_missing_counts() {
        let json = r#"{"id": 7, "title": "t", "link": "l", "accepted_answer_body": null}"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.answer_count, 0);
        assert_eq!(record.accepted_answer_score, 0);
        assert!(record.accepted_answer_body.is_none());
    }
}

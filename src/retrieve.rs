//! Two-stage retrieval: vector recall over the translated query, then
//! cross-encoder reranking against the original one.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::chunking::split_document;
use crate::config::{RetrievalConfig, TranslationConfig, TranslationFallback};
use crate::error::{CapabilityError, IndexError, RetrievalError};
use crate::index::{IndexRegistry, VectorHit, VectorIndex};
use crate::llm::translate::translate;
use crate::llm::{Embedder, Reranker, Translator};
use crate::models::RetrievalResult;

pub struct Retriever {
    indexes: Arc<IndexRegistry>,
    embedder: Arc<dyn Embedder>,
    translator: Arc<dyn Translator>,
    reranker: Arc<dyn Reranker>,
    translation: TranslationConfig,
    candidate_pool: usize,
}

impl Retriever {
    pub fn new(
        indexes: Arc<IndexRegistry>,
        embedder: Arc<dyn Embedder>,
        translator: Arc<dyn Translator>,
        reranker: Arc<dyn Reranker>,
        translation: TranslationConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            indexes,
            embedder,
            translator,
            reranker,
            translation,
            candidate_pool: retrieval.candidate_pool,
        }
    }

    /// The `top_k` most relevant answers for `query` in `dataset`, best first.
    pub async fn retrieve(
        &self,
        dataset: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let index = self.load_index(dataset).await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let search_query = self.translate_query(query).await?;
        tracing::debug!("Searching '{dataset}' for: {search_query}");

        let query_embedding = self
            .embedder
            .embed(&search_query)
            .await
            .map_err(RetrievalError::Embedding)?;

        let pool = self.candidate_pool.max(top_k);
        let candidates = index.search(&query_embedding, pool);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // the cross-encoder sees the user's own wording
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = self
            .reranker
            .score(query, &texts)
            .await
            .map_err(RetrievalError::Rerank)?;

        if scores.len() != candidates.len() {
            return Err(RetrievalError::Rerank(CapabilityError::permanent(
                "rerank",
                format!(
                    "returned {} scores for {} candidates",
                    scores.len(),
                    candidates.len()
                ),
            )));
        }

        Ok(rank(candidates, scores, top_k))
    }

    /// Like [`retrieve`](Self::retrieve), but any failure is logged and
    /// reported as no results.
    pub async fn retrieve_or_empty(
        &self,
        dataset: &str,
        query: &str,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        match self.retrieve(dataset, query, top_k).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Retrieval failed for dataset '{dataset}': {e:#}");
                Vec::new()
            }
        }
    }

    async fn load_index(&self, dataset: &str) -> Result<Arc<VectorIndex>, RetrievalError> {
        let indexes = Arc::clone(&self.indexes);
        let dataset = dataset.to_string();
        let index = tokio::task::spawn_blocking(move || indexes.get(&dataset))
            .await
            .map_err(|e| IndexError::Io(std::io::Error::other(e.to_string())))??;
        Ok(index)
    }

    async fn translate_query(&self, query: &str) -> Result<String, RetrievalError> {
        let TranslationConfig {
            source_lang,
            target_lang,
            on_failure,
        } = &self.translation;

        match translate(self.translator.as_ref(), query, source_lang, target_lang).await {
            Ok(translated) => Ok(translated),
            Err(e) => match on_failure {
                TranslationFallback::Fail => Err(RetrievalError::Translation(e)),
                TranslationFallback::UseOriginal => {
                    tracing::warn!(
                        "Query translation failed ({e}); searching with the untranslated query"
                    );
                    Ok(query.to_string())
                }
            },
        }
    }
}

/// Stable sort by reranker score (ties keep recall order), keep `top_k`.
fn rank(candidates: Vec<VectorHit>, scores: Vec<f32>, top_k: usize) -> Vec<RetrievalResult> {
    let mut scored: Vec<(VectorHit, f32)> = candidates
        .into_iter()
        .zip(scores)
        .map(|(hit, s)| (hit, if s.is_nan() { f32::NEG_INFINITY } else { s }))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(hit, score)| {
            let (title, answer_text) = split_document(&hit.text);
            RetrievalResult {
                title,
                question_id: hit.metadata.question_id,
                link: hit.metadata.link.clone(),
                answer_text,
                answer_count: hit.metadata.answer_count,
                answer_score: hit.metadata.answer_score,
                relevance_score: score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn hit(id: u64, text: &str) -> VectorHit {
        VectorHit {
            text: text.to_string(),
            metadata: Arc::new(ChunkMetadata {
                question_id: id,
                title: format!("q{id}"),
                link: format!("https://stackoverflow.com/q/{id}"),
                answer_count: 2,
                answer_score: 3,
                answer_body: String::new(),
            }),
            score: 0.0,
        }
    }

    #[test]
    fn test_rank_orders_by_reranker_score() {
        let candidates = vec![
            hit(1, "Title: a\nAnswer: one"),
            hit(2, "Title: b\nAnswer: two"),
            hit(3, "Title: c\nAnswer: three"),
        ];
        let results = rank(candidates, vec![0.1, 0.9, 0.5], 3);
        let ids: Vec<u64> = results.iter().map(|r| r.question_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(results[0].title, "b");
        assert_eq!(results[0].answer_text, "two");
        assert!((results[0].relevance_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_rank_ties_keep_recall_order() {
        let candidates = vec![hit(1, "x"), hit(2, "y"), hit(3, "z")];
        let ids: Vec<u64> = rank(candidates, vec![0.5, 0.5, 0.5], 3)
            .iter()
            .map(|r| r.question_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_truncates() {
        let candidates = (0..10).map(|i| hit(i, "t")).collect();
        let scores = (0..10).map(|i| i as f32).collect();
        let results = rank(candidates, scores, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].question_id, 9);
    }

    #[test]
    fn test_rank_nan_sorts_last() {
        let candidates = vec![hit(1, "x"), hit(2, "y")];
        let results = rank(candidates, vec![f32::NAN, 0.1], 2);
        assert_eq!(results[0].question_id, 2);
    }

    #[test]
    fn test_chunk_without_delimiter_has_empty_answer() {
        let results = rank(vec![hit(1, "continuation text")], vec![1.0], 1);
        assert_eq!(results[0].title, "continuation text");
        assert_eq!(results[0].answer_text, "");
    }
}

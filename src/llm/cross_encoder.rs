//! Cross-encoder reranker via an OpenAI-compatible `/v1/rerank` endpoint.
//!
//! One batch request scores every (query, document) pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::retry::{with_retry, RetryPolicy};
use super::Reranker;
use crate::config::RerankerConfig;
use crate::error::CapabilityError;

const CAPABILITY: &str = "rerank";

pub struct CrossEncoderReranker {
    client: reqwest::Client,
    config: RerankerConfig,
    retry: RetryPolicy,
}

impl CrossEncoderReranker {
    pub fn new(client: reqwest::Client, config: RerankerConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    async fn rerank_once(
        &self,
        base_url: &str,
        query: &str,
        documents: &[String],
    ) -> Result<RerankResponse, CapabilityError> {
        let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

        let req = RerankRequest {
            model: self.config.model.as_deref().unwrap_or("default"),
            query,
            documents,
            top_n: documents.len(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| CapabilityError::from_reqwest(CAPABILITY, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::from_status(CAPABILITY, status, &body));
        }

        resp.json()
            .await
            .map_err(|e| CapabilityError::from_reqwest(CAPABILITY, e))
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, CapabilityError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| CapabilityError::permanent(CAPABILITY, "reranker base_url not configured"))?;

        let body = with_retry(&self.retry, CAPABILITY, || {
            self.rerank_once(base_url, query, documents)
        })
        .await?;

        align_scores(body.results, documents.len())
    }
}

/// The endpoint returns results sorted by relevance; put them back in input order.
fn align_scores(results: Vec<RerankResultRaw>, expected: usize) -> Result<Vec<f32>, CapabilityError> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for r in results {
        let slot = scores.get_mut(r.index).ok_or_else(|| {
            CapabilityError::permanent(
                CAPABILITY,
                format!("result index {} out of range for {expected} documents", r.index),
            )
        })?;
        *slot = Some(sigmoid(r.relevance_score));
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| CapabilityError::permanent(CAPABILITY, format!("no score for document {i}")))
        })
        .collect()
}

/// Sigmoid normalization: maps raw logits to 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ─── Request/Response types ────────────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::retry::{with_retry, RetryPolicy};
use super::Embedder;
use crate::config::LlmConfig;
use crate::error::CapabilityError;

const CAPABILITY: &str = "embedding";

/// Maximum characters sent per text. Chunks are bounded well below this;
/// the cap only matters for oversized queries.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Embedder backed by Ollama `/api/embed` or an OpenAI-compatible `/v1/embeddings`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            config,
            retry,
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        match self.config.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.config, texts).await,
            "openai" => embed_openai(&self.client, &self.config, texts).await,
            other => Err(CapabilityError::permanent(
                CAPABILITY,
                format!("unknown LLM provider: {other}"),
            )),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let embeddings = with_retry(&self.retry, CAPABILITY, || self.embed_once(&truncated)).await?;

        if embeddings.len() != texts.len() {
            return Err(CapabilityError::permanent(
                CAPABILITY,
                format!(
                    "returned {} embeddings for {} inputs",
                    embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(embeddings)
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    /// Ask Ollama to truncate inputs over the model's context instead of failing.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let url = format!("{}/api/embed", config.base_url.trim_end_matches('/'));

    let req = OllamaEmbedRequest {
        model: &config.embedding_model,
        input: texts,
        truncate: true,
    };

    let resp = client
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

    let body: OllamaEmbedResponse = resp
        .json()
        .await
        .map_err(|e| CapabilityError::from_reqwest(CAPABILITY, e))?;
    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let url = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiEmbedRequest {
        model: &config.embedding_model,
        input: texts,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| CapabilityError::from_reqwest(CAPABILITY, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CapabilityError::from_status(CAPABILITY, status, &body));
    }

    let body: OpenAiEmbedResponse = resp
        .json()
        .await
        .map_err(|e| CapabilityError::from_reqwest(CAPABILITY, e))?;

    Ok(order_openai_embeddings(body.data))
}

/// OpenAI tags each embedding with its input index; restore input order.
fn order_openai_embeddings(mut data: Vec<OpenAiEmbedData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("short"), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "한".repeat(2_000);
        let cut = truncate_for_embedding(&text);
        assert!(cut.len() <= MAX_EMBED_CHARS);
        assert!(cut.chars().all(|c| c == '한'));
    }

    #[test]
    fn test_openai_embeddings_reordered_by_index() {
        let data: Vec<OpenAiEmbedData> = serde_json::from_str(
            r#"[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]"#,
        )
        .unwrap();
        assert_eq!(order_openai_embeddings(data), vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let embedder = HttpEmbedder::new(
            reqwest::Client::new(),
            LlmConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                ..LlmConfig::default()
            },
            RetryPolicy::default(),
        );
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}

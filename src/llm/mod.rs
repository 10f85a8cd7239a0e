//! External model capabilities the pipeline depends on.
//!
//! The core only sees the traits below; HTTP-backed implementations live in
//! the submodules and every call goes through [`retry::with_retry`].

pub mod chat;
pub mod cross_encoder;
pub mod embeddings;
pub mod generate;
pub mod retry;
pub mod translate;

use async_trait::async_trait;

use crate::error::CapabilityError;

/// Text → fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text; the output is parallel with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CapabilityError::permanent("embedding", "no embedding returned"))
    }
}

/// Text in one language → text in another.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, CapabilityError>;
}

/// Cross-encoder relevance of (query, document) pairs.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per document, in input order. Higher is more relevant.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, CapabilityError>;
}

/// Prompt → generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError>;
}

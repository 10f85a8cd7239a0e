use futures_util::stream::{self, StreamExt, TryStreamExt};

use super::store::VectorIndex;
use crate::error::IndexError;
use crate::llm::Embedder;
use crate::models::Chunk;

/// Texts sent per embedding request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Embeds chunks and assembles a [`VectorIndex`].
pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    embedding_model: String,
    dimension: usize,
    concurrency: usize,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder, embedding_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            embedder,
            embedding_model: embedding_model.into(),
            dimension,
            concurrency: 1,
        }
    }

    /// Embedding batches allowed in flight at once. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn build(&self, dataset: &str, chunks: Vec<Chunk>) -> Result<VectorIndex, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let total_batches = texts.len().div_ceil(EMBED_BATCH_SIZE);

        let texts = &texts;
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(0..total_batches)
            .map(|i| async move {
                let start = i * EMBED_BATCH_SIZE;
                let batch = &texts[start..(start + EMBED_BATCH_SIZE).min(texts.len())];
                tracing::debug!("Embedding batch {}/{total_batches} for '{dataset}'", i + 1);
                self.embedder.embed_batch(batch).await
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let embeddings: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        if embeddings.len() != chunks.len() {
            return Err(IndexError::Embedding(crate::error::CapabilityError::permanent(
                "embedding",
                format!(
                    "got {} embeddings for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            )));
        }

        tracing::info!(
            "Embedded {} chunks for '{dataset}' in {total_batches} batches",
            chunks.len()
        );

        VectorIndex::from_embeddings(dataset, &self.embedding_model, self.dimension, chunks, embeddings)
    }
}

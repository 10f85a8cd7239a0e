//! The full question-answering flow: retrieve, then synthesize.

use crate::models::AskResponse;
use crate::retrieve::Retriever;
use crate::synthesize::{uncited_links, Synthesizer, GENERATION_FAILED_MESSAGE};

pub struct Assistant {
    retriever: Retriever,
    synthesizer: Synthesizer,
}

impl Assistant {
    pub fn new(retriever: Retriever, synthesizer: Synthesizer) -> Self {
        Self {
            retriever,
            synthesizer,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query` against `dataset`. Never fails: retrieval errors become
    /// an empty result list, generation errors a fixed message, and the
    /// retrieved results are returned either way.
    pub async fn ask(&self, dataset: &str, query: &str, top_k: usize) -> AskResponse {
        let results = self.retriever.retrieve_or_empty(dataset, query, top_k).await;

        let answer = match self.synthesizer.synthesize(query, &results).await {
            Ok(answer) => {
                let uncited = uncited_links(&answer, &results);
                if !uncited.is_empty() {
                    tracing::warn!(
                        "Answer for '{dataset}' cites links outside the evidence: {}",
                        uncited.join(", ")
                    );
                }
                answer
            }
            Err(e) => {
                tracing::error!("{e:#}");
                GENERATION_FAILED_MESSAGE.to_string()
            }
        };

        AskResponse { answer, results }
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::index::IndexRegistry;
use crate::llm::cross_encoder::CrossEncoderReranker;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::generate::ChatGenerator;
use crate::llm::retry::RetryPolicy;
use crate::llm::translate::LlmTranslator;
use crate::llm::{Embedder, Generator, Reranker, Translator};
use crate::pipeline::Assistant;
use crate::retrieve::Retriever;
use crate::synthesize::Synthesizer;

/// The four model capabilities the pipeline is wired with.
#[derive(Clone)]
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub translator: Arc<dyn Translator>,
    pub reranker: Arc<dyn Reranker>,
    pub generator: Arc<dyn Generator>,
}

impl Capabilities {
    /// HTTP-backed capabilities as configured.
    pub fn from_config(config: &Config, client: &reqwest::Client) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            embedder: Arc::new(HttpEmbedder::new(client.clone(), config.llm.clone(), retry)),
            translator: Arc::new(LlmTranslator::new(client.clone(), config.llm.clone(), retry)),
            reranker: Arc::new(CrossEncoderReranker::new(
                client.clone(),
                config.reranker.clone(),
                retry,
            )),
            generator: Arc::new(ChatGenerator::new(client.clone(), config.llm.clone(), retry)),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub indexes: Arc<IndexRegistry>,
    pub embedder: Arc<dyn Embedder>,
    pub assistant: Arc<Assistant>,
    pub conversations: Arc<ConversationStore>,
    pub ask_semaphore: Arc<tokio::sync::Semaphore>,
    /// One ingestion at a time; each holds every chunk of a dataset in memory
    pub ingest_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        let capabilities = Capabilities::from_config(&config, &http_client);
        Self::with_capabilities(config, http_client, capabilities)
    }

    /// Build state around explicit capabilities.
    pub fn with_capabilities(
        config: Config,
        http_client: reqwest::Client,
        capabilities: Capabilities,
    ) -> anyhow::Result<Self> {
        config.chunking.validate()?;

        // Ensure data directories exist
        std::fs::create_dir_all(config.indexes_dir())?;
        std::fs::create_dir_all(config.records_dir())?;

        let indexes = Arc::new(IndexRegistry::new(
            config.indexes_dir(),
            config.llm.embedding_dim,
            config.index_trust,
        ));

        let retriever = Retriever::new(
            Arc::clone(&indexes),
            Arc::clone(&capabilities.embedder),
            capabilities.translator,
            capabilities.reranker,
            config.translation.clone(),
            &config.retrieval,
        );
        let synthesizer = Synthesizer::new(
            capabilities.generator,
            config.retrieval.answer_language.clone(),
        );

        let max_concurrent_asks = config.max_concurrent_asks.max(1);

        Ok(Self {
            config,
            http_client,
            indexes,
            embedder: capabilities.embedder,
            assistant: Arc::new(Assistant::new(retriever, synthesizer)),
            conversations: Arc::new(ConversationStore::new()),
            ask_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_asks)),
            ingest_semaphore: Arc::new(tokio::sync::Semaphore::new(1)),
        })
    }

    /// `top_k` from a request, defaulted and clamped.
    pub fn resolve_top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.retrieval.default_top_k)
            .min(self.config.retrieval.max_top_k)
    }

    pub fn resolve_dataset(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.config.default_dataset)
            .to_string()
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chunking::ChunkConfig;
use crate::index::IndexTrust;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where fetched records and built indexes are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Dataset queried when a request doesn't name one
    pub default_dataset: String,
    /// LLM provider configuration (embeddings, translation, generation)
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// Query translation configuration
    pub translation: TranslationConfig,
    /// Chunk size and overlap used at ingestion
    pub chunking: ChunkConfig,
    /// Two-stage retrieval sizes
    pub retrieval: RetrievalConfig,
    /// Timeout and retry policy for every external capability call
    pub retry: RetryConfig,
    /// Stack Exchange source settings
    pub source: SourceConfig,
    /// Whether indexes without a matching manifest may be loaded
    pub index_trust: IndexTrust,
    /// Maximum concurrent /api/ask pipelines
    pub max_concurrent_asks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer generation and translation
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
    /// Sampling temperature for answer generation
    pub temperature: f32,
    /// Concurrent embedding batches during ingestion
    pub embed_concurrency: usize,
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server with a reranker model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationFallback {
    /// Translation failure fails the whole retrieval.
    Fail,
    /// Translation failure falls back to the untranslated query.
    UseOriginal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Language users ask in
    pub source_lang: String,
    /// Language the index was built in
    pub target_lang: String,
    pub on_failure: TranslationFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Stage-1 candidates fetched by vector similarity
    pub candidate_pool: usize,
    /// Results kept after reranking when a request doesn't say
    pub default_top_k: usize,
    /// Upper bound on a requested top_k
    pub max_top_k: usize,
    /// Language the synthesized answer is written in
    pub answer_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Per-attempt timeout in seconds
    pub call_timeout_secs: u64,
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub api_url: String,
    pub site: String,
    /// Stack Exchange response filter that includes the accepted answer body
    pub filter: String,
    pub api_key: Option<String>,
    pub max_pages: u32,
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            default_dataset: "c++".to_string(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
            translation: TranslationConfig::default(),
            chunking: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetryConfig::default(),
            source: SourceConfig::default(),
            index_trust: IndexTrust::Verified,
            max_concurrent_asks: 3,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
            temperature: 0.7,
            embed_concurrency: 2,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: Some("http://127.0.0.1:8082".to_string()),
            model: None,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "ko".to_string(),
            target_lang: "en".to_string(),
            on_failure: TranslationFallback::Fail,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 15,
            default_top_k: 3,
            max_top_k: 20,
            answer_language: "Korean".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 60,
            max_attempts: 3,
            base_delay_ms: 250,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stackexchange.com/2.3/questions".to_string(),
            site: "stackoverflow".to_string(),
            filter: "!6VvPDzQ)xHc8k".to_string(),
            api_key: None,
            max_pages: 20,
            page_size: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("QA_RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("QA_RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(tag) = std::env::var("QA_RAG_DEFAULT_DATASET") {
            config.default_dataset = tag;
        }
        if let Ok(val) = std::env::var("QA_RAG_MAX_CONCURRENT_ASKS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_asks = v;
            }
        }
        if let Ok(val) = std::env::var("QA_RAG_ALLOW_UNVERIFIED_INDEX") {
            if matches!(val.as_str(), "1" | "true" | "yes") {
                config.index_trust = IndexTrust::AllowUnverified;
            }
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("LLM_EMBED_CONCURRENCY") {
            if let Ok(v) = val.parse::<usize>() {
                config.llm.embed_concurrency = v.max(1);
            }
        }

        // Reranker
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }

        // Translation
        if let Ok(lang) = std::env::var("TRANSLATOR_SOURCE_LANG") {
            config.translation.source_lang = lang;
        }
        if let Ok(lang) = std::env::var("TRANSLATOR_TARGET_LANG") {
            config.translation.target_lang = lang;
        }
        if let Ok(val) = std::env::var("TRANSLATOR_ON_FAILURE") {
            match val.as_str() {
                "fail" => config.translation.on_failure = TranslationFallback::Fail,
                "use_original" => config.translation.on_failure = TranslationFallback::UseOriginal,
                other => tracing::warn!("Ignoring unknown TRANSLATOR_ON_FAILURE value: {other}"),
            }
        }

        // Chunking
        if let Ok(val) = std::env::var("QA_RAG_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.chunking.max_size = v;
            }
        }
        if let Ok(val) = std::env::var("QA_RAG_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunking.overlap = v;
            }
        }

        // Retrieval
        if let Ok(val) = std::env::var("QA_RAG_CANDIDATE_POOL") {
            if let Ok(v) = val.parse() {
                config.retrieval.candidate_pool = v;
            }
        }
        if let Ok(val) = std::env::var("QA_RAG_TOP_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.default_top_k = v;
            }
        }
        if let Ok(lang) = std::env::var("QA_RAG_ANSWER_LANGUAGE") {
            config.retrieval.answer_language = lang;
        }

        // Retry
        if let Ok(val) = std::env::var("QA_RAG_CALL_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.retry.call_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("QA_RAG_MAX_ATTEMPTS") {
            if let Ok(v) = val.parse::<u32>() {
                config.retry.max_attempts = v.max(1);
            }
        }

        // Source
        if let Ok(key) = std::env::var("STACK_API_KEY") {
            config.source.api_key = Some(key);
        }
        if let Ok(site) = std::env::var("STACK_SITE") {
            config.source.site = site;
        }
        if let Ok(val) = std::env::var("STACK_MAX_PAGES") {
            if let Ok(v) = val.parse() {
                config.source.max_pages = v;
            }
        }

        config
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.data_dir.join("indexes")
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    /// Path of the raw records snapshot kept for a dataset.
    pub fn records_path(&self, dataset: &str) -> PathBuf {
        self.records_dir()
            .join(format!("{}.json", crate::index::dataset_dir_name(dataset)))
    }
}

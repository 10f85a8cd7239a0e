//! Integration tests for the ingest → retrieve → synthesize pipeline.
//!
//! Every model capability is replaced by a deterministic in-process double,
//! so no network or model server is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::Json;
use parking_lot::Mutex;
use tempfile::TempDir;

use qa_rag::api;
use qa_rag::chunking::ChunkConfig;
use qa_rag::config::{Config, RetrievalConfig, TranslationConfig, TranslationFallback};
use qa_rag::error::{CapabilityError, RetrievalError};
use qa_rag::index::{dataset_dir_name, IndexBuilder, IndexRegistry, IndexTrust};
use qa_rag::ingest::ingest;
use qa_rag::llm::{Embedder, Generator, Reranker, Translator};
use qa_rag::models::{AskRequest, IngestRequest, RawRecord};
use qa_rag::pipeline::Assistant;
use qa_rag::retrieve::Retriever;
use qa_rag::state::{AppState, Capabilities};
use qa_rag::synthesize::{Synthesizer, GENERATION_FAILED_MESSAGE, NO_RESULTS_MESSAGE};

const DIM: usize = 64;

// ─── Capability doubles ──────────────────────────────────

/// Hashed bag-of-words embedding; records every text it embeds.
#[derive(Default)]
struct HashEmbedder {
    seen: Mutex<Vec<String>>,
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        self.seen.lock().extend(texts.iter().cloned());
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIM];
                for token in t
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    v[(fnv1a(token) % DIM as u64) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Scores a document by how often the lowercased query occurs in it.
#[derive(Default)]
struct SubstringReranker {
    calls: AtomicUsize,
    last_query: Mutex<String>,
    last_batch: AtomicUsize,
}

#[async_trait]
impl Reranker for SubstringReranker {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_batch.store(documents.len(), Ordering::SeqCst);
        *self.last_query.lock() = query.to_string();

        let needle = query.to_lowercase();
        Ok(documents
            .iter()
            .map(|d| d.to_lowercase().matches(needle.as_str()).count() as f32)
            .collect())
    }
}

/// Looks words up in a fixed table; fails when `fail` is set.
struct DictTranslator {
    fail: bool,
    calls: AtomicUsize,
}

impl DictTranslator {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Translator for DictTranslator {
    async fn translate(&self, text: &str, _: &str, _: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::transient("translation", "service unavailable"));
        }
        Ok(text.replace("정렬", "sort").replace("파일", "file"))
    }
}

/// Counts calls; echoes the first link in the prompt as its answer.
#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CapabilityError::permanent("generation", "invalid api key"));
        }
        let link = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Reference: "))
            .unwrap_or("");
        Ok(format!("Use the approach from {link}"))
    }
}

// ─── Fixtures ────────────────────────────────────────────

fn record(id: u64, title: &str, body: &str) -> RawRecord {
    RawRecord {
        id,
        title: Some(title.to_string()),
        link: format!("https://stackoverflow.com/questions/{id}"),
        answer_count: 2,
        accepted_answer_score: 10,
        accepted_answer_body: Some(body.to_string()),
    }
}

/// Record A answers the sorting question (with code), record B doesn't.
fn two_records() -> Vec<RawRecord> {
    vec![
        record(
            1,
            "How to sort a list",
            "<p>Use <b>sorted</b>:</p><pre><code>print(1)\nys = sorted(xs)</code></pre>",
        ),
        record(2, "How to open a file", "<p>Call <code>open(path)</code> and read it.</p>"),
    ]
}

fn many_records(n: u64) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            record(
                100 + i,
                &format!("Question {i} about sort order"),
                &format!("<p>{}</p>", "sort ".repeat((i % 7 + 1) as usize)),
            )
        })
        .collect()
}

async fn build_dataset(dir: &std::path::Path, dataset: &str, records: &[RawRecord]) {
    let embedder = HashEmbedder::default();
    let builder = IndexBuilder::new(&embedder, "hash", DIM);
    let (mut index, report) = ingest(dataset, records, &ChunkConfig::default(), &builder)
        .await
        .unwrap();
    assert_eq!(report.skipped, 0);
    index.save(dir).unwrap();
}

fn english() -> TranslationConfig {
    TranslationConfig {
        source_lang: "en".to_string(),
        target_lang: "en".to_string(),
        on_failure: TranslationFallback::Fail,
    }
}

fn korean(on_failure: TranslationFallback) -> TranslationConfig {
    TranslationConfig {
        source_lang: "ko".to_string(),
        target_lang: "en".to_string(),
        on_failure,
    }
}

struct Harness {
    _tmp: TempDir,
    embedder: Arc<HashEmbedder>,
    translator: Arc<DictTranslator>,
    reranker: Arc<SubstringReranker>,
    retriever: Retriever,
}

async fn harness(
    records: &[RawRecord],
    translation: TranslationConfig,
    translator: DictTranslator,
) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    build_dataset(tmp.path(), "python", records).await;

    let registry = Arc::new(IndexRegistry::new(
        tmp.path().to_path_buf(),
        DIM,
        IndexTrust::Verified,
    ));
    let embedder = Arc::new(HashEmbedder::default());
    let translator = Arc::new(translator);
    let reranker = Arc::new(SubstringReranker::default());

    let retriever = Retriever::new(
        registry,
        embedder.clone(),
        translator.clone(),
        reranker.clone(),
        translation,
        &RetrievalConfig::default(),
    );

    Harness {
        _tmp: tmp,
        embedder,
        translator,
        reranker,
        retriever,
    }
}

// ─── Retrieval ───────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_two_records() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;

    let results = h.retriever.retrieve("python", "sort", 2).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].question_id, 1);
    assert_eq!(results[1].question_id, 2);
    assert_eq!(results[0].title, "How to sort a list");
    assert!(results[0].answer_text.contains("print(1)"));
    assert!(results[0].answer_text.contains("```"));
    assert_eq!(results[0].link, "https://stackoverflow.com/questions/1");
    assert!(results[0].relevance_score > results[1].relevance_score);
    // same source and target language: no translation call
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_translated_query_recalls_original_query_reranks() {
    let h = harness(
        &two_records(),
        korean(TranslationFallback::Fail),
        DictTranslator::new(false),
    )
    .await;

    let results = h.retriever.retrieve("python", "정렬", 1).await.unwrap();

    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.embedder.seen.lock().last().map(String::as_str), Some("sort"));
    assert_eq!(*h.reranker.last_query.lock(), "정렬");
    // reranker ties at zero keep the vector order, where "sort" wins
    assert_eq!(results[0].question_id, 1);
}

#[tokio::test]
async fn test_retrieval_cap_and_candidate_pool() {
    let h = harness(&many_records(30), english(), DictTranslator::new(false)).await;

    let results = h.retriever.retrieve("python", "sort", 5).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(h.reranker.last_batch.load(Ordering::SeqCst), 15);

    let results = h.retriever.retrieve("python", "sort", 20).await.unwrap();
    assert_eq!(results.len(), 20);
    assert_eq!(h.reranker.last_batch.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_results_ordered_by_rerank_score() {
    let h = harness(&many_records(20), english(), DictTranslator::new(false)).await;

    let results = h.retriever.retrieve("python", "sort", 10).await.unwrap();
    for pair in results.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    // seven repetitions plus the title
    assert!((results[0].relevance_score - 8.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_zero_top_k_skips_reranker() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;

    assert!(h.retriever.retrieve("python", "sort", 0).await.unwrap().is_empty());
    assert_eq!(h.reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_index_yields_empty() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;

    let err = h.retriever.retrieve("haskell", "sort", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexLoad(_)));
    assert!(h.retriever.retrieve_or_empty("haskell", "sort", 3).await.is_empty());
    assert_eq!(h.reranker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_translation_failure_policies() {
    let h = harness(
        &two_records(),
        korean(TranslationFallback::Fail),
        DictTranslator::new(true),
    )
    .await;
    let err = h.retriever.retrieve("python", "sort", 2).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Translation(_)));
    assert_eq!(h.reranker.calls.load(Ordering::SeqCst), 0);

    let h = harness(
        &two_records(),
        korean(TranslationFallback::UseOriginal),
        DictTranslator::new(true),
    )
    .await;
    let results = h.retriever.retrieve("python", "sort", 2).await.unwrap();
    assert_eq!(results[0].question_id, 1);
    assert_eq!(h.embedder.seen.lock().last().map(String::as_str), Some("sort"));
}

#[tokio::test]
async fn test_tampered_index_not_served() {
    let tmp = tempfile::tempdir().unwrap();
    build_dataset(tmp.path(), "python", &two_records()).await;

    let entries = tmp
        .path()
        .join(dataset_dir_name("python"))
        .join("entries.json");
    let data = std::fs::read_to_string(&entries).unwrap();
    std::fs::write(&entries, data.replace("open(path)", "evil(path)")).unwrap();

    let strict = Retriever::new(
        Arc::new(IndexRegistry::new(tmp.path().to_path_buf(), DIM, IndexTrust::Verified)),
        Arc::new(HashEmbedder::default()),
        Arc::new(DictTranslator::new(false)),
        Arc::new(SubstringReranker::default()),
        english(),
        &RetrievalConfig::default(),
    );
    assert!(strict.retrieve_or_empty("python", "sort", 2).await.is_empty());

    let lenient = Retriever::new(
        Arc::new(IndexRegistry::new(
            tmp.path().to_path_buf(),
            DIM,
            IndexTrust::AllowUnverified,
        )),
        Arc::new(HashEmbedder::default()),
        Arc::new(DictTranslator::new(false)),
        Arc::new(SubstringReranker::default()),
        english(),
        &RetrievalConfig::default(),
    );
    assert_eq!(lenient.retrieve_or_empty("python", "sort", 2).await.len(), 2);
}

// ─── Synthesis ───────────────────────────────────────────

#[tokio::test]
async fn test_ask_without_results_skips_generator() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;
    let generator = Arc::new(CountingGenerator::default());
    let assistant = Assistant::new(h.retriever, Synthesizer::new(generator.clone(), "Korean"));

    let response = assistant.ask("haskell", "sort", 3).await;

    assert_eq!(response.answer, NO_RESULTS_MESSAGE);
    assert!(response.results.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ask_generates_once_from_evidence() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;
    let generator = Arc::new(CountingGenerator::default());
    let assistant = Assistant::new(h.retriever, Synthesizer::new(generator.clone(), "Korean"));

    let response = assistant.ask("python", "sort", 2).await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        response.answer,
        "Use the approach from https://stackoverflow.com/questions/1"
    );
    assert_eq!(response.results.len(), 2);
}

#[tokio::test]
async fn test_generation_failure_keeps_results() {
    let h = harness(&two_records(), english(), DictTranslator::new(false)).await;
    let generator = Arc::new(CountingGenerator {
        fail: true,
        ..CountingGenerator::default()
    });
    let assistant = Assistant::new(h.retriever, Synthesizer::new(generator, "Korean"));

    let response = assistant.ask("python", "sort", 2).await;

    assert_eq!(response.answer, GENERATION_FAILED_MESSAGE);
    assert_eq!(response.results.len(), 2);
}

// ─── HTTP handlers ───────────────────────────────────────

fn app_state(tmp: &TempDir) -> AppState {
    let mut config = Config::default();
    config.data_dir = tmp.path().to_path_buf();
    config.llm.embedding_dim = DIM;
    config.translation = english();

    let capabilities = Capabilities {
        embedder: Arc::new(HashEmbedder::default()),
        translator: Arc::new(DictTranslator::new(false)),
        reranker: Arc::new(SubstringReranker::default()),
        generator: Arc::new(CountingGenerator::default()),
    };
    AppState::with_capabilities(config, reqwest::Client::new(), capabilities).unwrap()
}

#[tokio::test]
async fn test_ingest_then_ask_over_http_handlers() {
    let tmp = tempfile::tempdir().unwrap();
    let state = app_state(&tmp);

    let mut records = two_records();
    records.push(RawRecord {
        accepted_answer_body: None,
        ..record(3, "Unanswered", "")
    });

    let Json(report) = api::datasets::ingest_records(
        State(state.clone()),
        Path("python".to_string()),
        Json(IngestRequest { records }),
    )
    .await
    .unwrap();
    assert_eq!(report.records, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.chunks, 2);
    assert!(state.config.records_path("python").exists());

    let Json(datasets) = api::datasets::list_datasets(State(state.clone())).await;
    assert_eq!(datasets.len(), 1);
    assert!(datasets[0].loaded);

    let Json(response) = api::ask::ask(
        State(state.clone()),
        Json(AskRequest {
            query: "  sort ".to_string(),
            dataset: Some("python".to_string()),
            context_id: Some("page-1".to_string()),
            top_k: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.results[0].question_id, 1);

    let Json(conversation) =
        api::conversations::get_conversation(State(state.clone()), Path("page-1".to_string())).await;
    assert_eq!(conversation.turns.len(), 2);
    assert_eq!(conversation.turns[0].content, "sort");
    assert_eq!(conversation.turns[0].label, "사용자");
    assert_eq!(conversation.turns[1].role, "assistant");
    assert_eq!(conversation.turns[1].content, response.answer);
}

#[tokio::test]
async fn test_blank_question_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let state = app_state(&tmp);

    let err = api::ask::ask(
        State(state),
        Json(AskRequest {
            query: "   ".to_string(),
            dataset: None,
            context_id: None,
            top_k: None,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, axum::http::StatusCode::BAD_REQUEST);
}

//! # qa-rag
//!
//! A retrieval-augmented assistant that answers programming questions from
//! Stack Overflow's accepted answers. Questions may be asked in one language
//! (Korean by default) against an index built from answers in another.
//!
//! ## Architecture
//!
//! Ingestion runs offline, per dataset (a Stack Overflow tag):
//!
//! ```text
//!   Stack Exchange API / records JSON
//!                  │
//!                  ▼
//!        ┌───────────────────┐
//!        │    Normalizer     │  strip markup, re-fence code, collapse spaces
//!        └─────────┬─────────┘
//!                  ▼
//!        ┌───────────────────┐
//!        │      Chunker      │  "Title: …\nAnswer: …", ≤1000 chars, 200 overlap
//!        └─────────┬─────────┘
//!                  ▼
//!        ┌───────────────────┐
//!        │   Index Builder   │  embed in batches, persist with checksummed manifest
//!        └───────────────────┘
//! ```
//!
//! Each question then goes through:
//!
//! ```text
//!   query ──► translate ──► embed ──► top-N by cosine (N = max(15, k))
//!                                            │
//!   query (untranslated) ──► cross-encoder rerank ──► top k
//!                                            │
//!                                            ▼
//!                           grounded answer from one generation call
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration
//! - [`models`] - Records, chunks, retrieval results, request/response types
//! - [`error`] - Typed errors at module boundaries
//! - [`normalize`] - Markup → plain text with fenced code
//! - [`chunking`] - Recursive separator splitting with overlap
//! - [`index`] - Vector index build, persistence, trust checks, registry
//! - [`llm`] - Embedding, translation, reranking and generation capabilities
//! - [`retrieve`] - Two-stage retrieval
//! - [`synthesize`] - Prompt assembly and answer generation
//! - [`pipeline`] - Retrieve-then-synthesize with failure fallbacks
//! - [`ingest`] - Records → index
//! - [`source`] - Stack Exchange fetcher and records snapshots
//! - [`conversation`] - Per-context chat history
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod conversation;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod retrieve;
pub mod source;
pub mod state;
pub mod synthesize;

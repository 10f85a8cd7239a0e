use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::index::IndexBuilder;
use crate::ingest::ingest;
use crate::models::{DatasetInfo, FetchRequest, IngestReport, IngestRequest, RawRecord};
use crate::source::{load_records, save_records, StackExchangeClient};
use crate::state::AppState;

const MAX_TAG_LEN: usize = 64;

/// GET /api/datasets - Datasets that are loaded or stored on disk
pub async fn list_datasets(State(state): State<AppState>) -> Json<Vec<DatasetInfo>> {
    let indexes = state.indexes.clone();
    let list = tokio::task::spawn_blocking(move || indexes.list())
        .await
        .unwrap_or_default();
    Json(list)
}

/// POST /api/datasets/{tag}/ingest - Build the dataset's index from supplied records
pub async fn ingest_records(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let tag = validate_tag(&tag)?;
    if req.records.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No records supplied".to_string()));
    }

    let _permit = acquire_ingest(&state).await?;
    save_records(&state.config.records_path(&tag), &req.records).map_err(internal)?;
    let report = build_and_swap(&state, &tag, &req.records).await.map_err(internal)?;
    Ok(Json(report))
}

/// POST /api/datasets/{tag}/fetch - Pull questions from Stack Exchange, then ingest them
pub async fn fetch_and_ingest(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let tag = validate_tag(&tag)?;
    let max_pages = req
        .max_pages
        .unwrap_or(state.config.source.max_pages)
        .clamp(1, state.config.source.max_pages.max(1));

    let _permit = acquire_ingest(&state).await?;

    let client = StackExchangeClient::new(state.http_client.clone(), state.config.source.clone());
    let records = client
        .fetch(&tag, max_pages)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("{e:#}")))?;
    if records.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No questions found for tag '{tag}'"),
        ));
    }

    save_records(&state.config.records_path(&tag), &records).map_err(internal)?;
    let report = build_and_swap(&state, &tag, &records).await.map_err(internal)?;
    Ok(Json(report))
}

/// POST /api/datasets/{tag}/rebuild - Re-ingest the dataset's saved records
/// (e.g. after changing chunking or the embedding model)
pub async fn rebuild_dataset(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let tag = validate_tag(&tag)?;
    let path = state.config.records_path(&tag);
    if !path.exists() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("No saved records for dataset '{tag}'"),
        ));
    }

    let _permit = acquire_ingest(&state).await?;
    let records = load_records(&path).map_err(internal)?;
    let report = build_and_swap(&state, &tag, &records).await.map_err(internal)?;
    Ok(Json(report))
}

/// Embed, persist, then make the new index current.
async fn build_and_swap(
    state: &AppState,
    tag: &str,
    records: &[RawRecord],
) -> anyhow::Result<IngestReport> {
    let builder = IndexBuilder::new(
        state.embedder.as_ref(),
        state.config.llm.embedding_model.clone(),
        state.config.llm.embedding_dim,
    )
    .with_concurrency(state.config.llm.embed_concurrency);

    let (mut index, report) = ingest(tag, records, &state.config.chunking, &builder).await?;

    let dir = state.indexes.dir().to_path_buf();
    let index = tokio::task::spawn_blocking(move || index.save(&dir).map(|_| index))
        .await
        .context("Index save task panicked")??;
    state.indexes.insert(index);

    Ok(report)
}

async fn acquire_ingest(
    state: &AppState,
) -> Result<tokio::sync::OwnedSemaphorePermit, (StatusCode, String)> {
    state
        .ingest_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Ingestion unavailable".to_string(),
            )
        })
}

fn validate_tag(raw: &str) -> Result<String, (StatusCode, String)> {
    let tag = raw.trim();
    if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Dataset tag must be 1-{MAX_TAG_LEN} characters"),
        ));
    }
    if !tag
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '+' | '#' | '.' | '-' | '_'))
    {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Invalid dataset tag: {tag}"),
        ));
    }
    Ok(tag.to_string())
}

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Ingestion failed: {e:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

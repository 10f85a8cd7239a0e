//! Offline ingestion: raw records → normalized records → chunks → index.

use crate::chunking::{chunk_record, ChunkConfig};
use crate::error::IndexError;
use crate::index::{IndexBuilder, VectorIndex};
use crate::models::{Chunk, IngestReport, RawRecord};
use crate::normalize::normalize_record;

/// Normalize and chunk every record. Returns the chunks and how many records
/// contributed nothing (absent title or accepted answer).
pub fn prepare_chunks(records: &[RawRecord], config: &ChunkConfig) -> (Vec<Chunk>, usize) {
    let mut chunks = Vec::new();
    let mut skipped = 0;

    for record in records {
        let record_chunks = chunk_record(&normalize_record(record), config);
        if record_chunks.is_empty() {
            tracing::debug!("Skipping question {}: no title or accepted answer", record.id);
            skipped += 1;
        }
        chunks.extend(record_chunks);
    }

    (chunks, skipped)
}

/// Build a dataset's index from raw records. Persisting it is up to the caller.
pub async fn ingest(
    dataset: &str,
    records: &[RawRecord],
    config: &ChunkConfig,
    builder: &IndexBuilder<'_>,
) -> Result<(VectorIndex, IngestReport), IndexError> {
    let (chunks, skipped) = prepare_chunks(records, config);
    let chunk_count = chunks.len();

    tracing::info!(
        "Ingesting '{dataset}': {} records, {skipped} skipped, {chunk_count} chunks",
        records.len()
    );

    let index = builder.build(dataset, chunks).await?;
    let report = IngestReport {
        dataset: dataset.to_string(),
        records: records.len(),
        skipped,
        chunks: chunk_count,
    };
    Ok((index, report))
}

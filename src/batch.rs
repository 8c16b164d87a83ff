//! Fixed-size transactional batch processing.
//!
//! The flat `data` array is sliced into consecutive chunks; each chunk runs
//! inside one storage transaction bounded by the configured execute timeout
//! (the acquire bound lives on the pool, see [`crate::db`]). Within a chunk,
//! items are processed independently: one bad row is recorded and its
//! siblings continue. Chunks run in input order: chunk *i+1* does not start
//! until chunk *i* committed or failed, so progress is monotonic at chunk
//! granularity and a re-run is safe because every upsert is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::ImportConfig;
use crate::groups::GroupCursors;
use crate::models::{ContentKind, ImportOutcome};
use crate::upsert::{upsert_raw_item, GroupTarget};

pub async fn process_batches(
    pool: &SqlitePool,
    cfg: &ImportConfig,
    collection_id: i64,
    kind: ContentKind,
    cursors: &mut GroupCursors,
    items: &[serde_json::Value],
    outcome: &mut ImportOutcome,
) -> Result<()> {
    for (chunk_no, chunk) in items.chunks(cfg.batch_size).enumerate() {
        let base = chunk_no * cfg.batch_size;
        let run = process_chunk(pool, collection_id, kind, cursors, chunk, base);
        let outcome_for_chunk = timeout(Duration::from_secs(cfg.execute_timeout_secs), run).await;
        match outcome_for_chunk {
            Ok(Ok(results)) => {
                for (index, error) in results {
                    match error {
                        None => outcome.record_success(),
                        Some(message) => {
                            outcome.record_failure(index, message, chunk[index - base].clone());
                        }
                    }
                }
            }
            Ok(Err(e)) => fail_chunk(outcome, cursors, chunk, base, &e.to_string()),
            Err(_) => fail_chunk(outcome, cursors, chunk, base, "transaction timed out"),
        }
    }
    Ok(())
}

async fn process_chunk(
    pool: &SqlitePool,
    collection_id: i64,
    kind: ContentKind,
    cursors: &mut GroupCursors,
    chunk: &[serde_json::Value],
    base: usize,
) -> Result<Vec<(usize, Option<String>)>> {
    let mut tx = pool.begin().await?;
    let mut results = Vec::with_capacity(chunk.len());
    for (i, raw) in chunk.iter().enumerate() {
        let fallback_seq = (base + i + 1) as i64;
        match upsert_raw_item(
            &mut tx,
            collection_id,
            kind,
            cursors,
            raw,
            fallback_seq,
            GroupTarget::FromTags,
        )
        .await
        {
            Ok(()) => results.push((base + i, None)),
            Err(e) => results.push((base + i, Some(e.to_string()))),
        }
    }
    tx.commit().await?;
    Ok(results)
}

/// A chunk is atomic: when its transaction fails, every item in it is
/// attributed to failure, including items that had individually succeeded
/// inside the rolled-back transaction. The cursor map is dropped too,
/// because groups created inside the transaction no longer exist.
fn fail_chunk(
    outcome: &mut ImportOutcome,
    cursors: &mut GroupCursors,
    chunk: &[serde_json::Value],
    base: usize,
    reason: &str,
) {
    eprintln!(
        "chunk at offset {} failed ({} items): {}",
        base,
        chunk.len(),
        reason
    );
    for (i, raw) in chunk.iter().enumerate() {
        outcome.record_failure(
            base + i,
            format!("chunk transaction failed: {}", reason),
            raw.clone(),
        );
    }
    cursors.reset();
}

//! Import orchestration.
//!
//! Validates the request shape, resolves the content kind and target
//! collection, and sequences the three optional phases: pre-chunked groups,
//! flat-array batches, and the SIZE re-partition pass. Phases are
//! cumulative, not exclusive: one call may insert new items and
//! immediately re-partition the resulting collection.
//!
//! The whole call holds a per-collection lock, so a flat-data import can
//! never interleave with a re-partition racing it on the same collection.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::batch;
use crate::config::Config;
use crate::error::ImportError;
use crate::groups::GroupCursors;
use crate::models::{
    ContentKind, GroupKind, GroupPayload, ImportOutcome, ImportRequest, ImportSummary,
};
use crate::partition::{self, DEFAULT_NAME_PATTERN};
use crate::upsert::{upsert_raw_item, GroupTarget};

/// Per-collection import locks. Two calls targeting the same collection
/// serialize for their full duration (all phases); different collections
/// proceed independently.
#[derive(Default)]
pub struct CollectionLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn for_collection(&self, id: i64) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().await;
        map.entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Run one import call end to end and produce its result summary.
///
/// Precondition failures (unknown kind, missing set id, collection not
/// found, bad strategy) abort before any phase performs work and surface as
/// [`ImportError`]; per-item failures are folded into the summary instead.
pub async fn run_import(
    pool: &SqlitePool,
    locks: &CollectionLocks,
    config: &Config,
    request: ImportRequest,
) -> Result<ImportSummary> {
    let kind_token = request.kind.as_deref().ok_or(ImportError::MissingKind)?;
    let kind = ContentKind::parse(kind_token)
        .ok_or_else(|| ImportError::UnknownKind(kind_token.to_string()))?;
    let set_id = request.set_id.ok_or(ImportError::MissingSetId)?;

    let strategy_is_size = match request.strategy.as_deref() {
        None => false,
        Some(s) if s.eq_ignore_ascii_case("SIZE") => true,
        Some(other) => return Err(ImportError::UnknownStrategy(other.to_string()).into()),
    };
    let size = if strategy_is_size {
        match request.size {
            None => return Err(ImportError::MissingSize.into()),
            Some(s) if s < 1 => return Err(ImportError::InvalidSize(s).into()),
            Some(s) => Some(s),
        }
    } else {
        None
    };

    let exists: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE id = ? AND kind = ?")
            .bind(set_id)
            .bind(kind.as_str())
            .fetch_one(pool)
            .await?;
    if exists == 0 {
        return Err(ImportError::CollectionNotFound { kind, id: set_id }.into());
    }

    let lock = locks.for_collection(set_id).await;
    let _guard = lock.lock().await;

    let mut cursors = GroupCursors::new();
    let mut outcome = ImportOutcome::default();

    if let Some(groups) = &request.groups {
        run_groups_phase(pool, set_id, kind, &mut cursors, groups, &mut outcome).await?;
    }

    if let Some(data) = &request.data {
        batch::process_batches(
            pool,
            &config.import,
            set_id,
            kind,
            &mut cursors,
            data,
            &mut outcome,
        )
        .await?;
    }

    let mut repartition_note = String::new();
    if let Some(size) = size {
        let pattern = request
            .name_pattern
            .as_deref()
            .unwrap_or(DEFAULT_NAME_PATTERN);
        let report =
            partition::repartition(pool, set_id, kind, size, pattern, request.start_index).await?;
        repartition_note = format!(", repartitioned into {} groups", report.groups_created);
    }

    let message = format!(
        "imported {} items into {} set {} ({} failed){}",
        outcome.success_count, kind, set_id, outcome.failed_count, repartition_note
    );
    Ok(outcome.into_summary(message))
}

/// Phase 1: pre-chunked groups. Each item is upserted directly (no chunk
/// transactions) with its membership fixed by the surrounding group; the
/// group's kind defaults to UNIT. Failure indexes run across the phase's
/// items in submission order.
async fn run_groups_phase(
    pool: &SqlitePool,
    collection_id: i64,
    kind: ContentKind,
    cursors: &mut GroupCursors,
    groups: &[GroupPayload],
    outcome: &mut ImportOutcome,
) -> Result<()> {
    let mut conn = pool.acquire().await?;
    let mut position = 0usize;

    for payload in groups {
        let group_kind = match payload.kind.as_deref() {
            None => GroupKind::Unit,
            Some(token) => match GroupKind::parse(token) {
                Some(k) => k,
                None => {
                    // The whole group is unroutable; fail its items and move on.
                    for raw in &payload.items {
                        outcome.record_failure(
                            position,
                            format!("unknown group kind: '{}'", token),
                            raw.clone(),
                        );
                        position += 1;
                    }
                    continue;
                }
            },
        };

        for raw in &payload.items {
            let fallback_seq = (position + 1) as i64;
            let target = GroupTarget::Fixed {
                name: &payload.name,
                kind: group_kind,
                order: payload.order,
            };
            match upsert_raw_item(
                &mut conn,
                collection_id,
                kind,
                cursors,
                raw,
                fallback_seq,
                target,
            )
            .await
            {
                Ok(()) => outcome.record_success(),
                Err(e) => outcome.record_failure(position, e.to_string(), raw.clone()),
            }
            position += 1;
        }
    }

    Ok(())
}

//! SIZE-strategy re-partitioning.
//!
//! Rebuilds a collection's fixed-size grouping from scratch: prior SIZE
//! groups are cleared, every item is re-read in its stable natural order,
//! and consecutive windows are assigned to freshly created groups. Groups
//! of other kinds are untouched. The pass is not incremental: boundaries
//! shift whenever items were added or removed since the last run, so SIZE
//! membership is derived state, never a durable identity for an item.
//!
//! All three steps run in one transaction: a failed re-partition leaves the
//! previous memberships intact.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::groups::resolve_group;
use crate::models::{ContentKind, GroupKind};

pub const DEFAULT_NAME_PATTERN: &str = "第{n}组";

#[derive(Debug, Clone, Copy, Default)]
pub struct RepartitionReport {
    pub groups_created: u64,
    pub items_assigned: u64,
}

/// Re-partition `collection_id` into groups of `size`, named by substituting
/// `{n}` with the 1-based window number in `name_pattern`.
pub async fn repartition(
    pool: &SqlitePool,
    collection_id: i64,
    kind: ContentKind,
    size: i64,
    name_pattern: &str,
    start_index: Option<i64>,
) -> Result<RepartitionReport> {
    let mut tx = pool.begin().await?;

    // Clear: detach every item from SIZE groups, then drop the groups.
    sqlx::query(
        "UPDATE items SET group_id = NULL, group_index = NULL \
         WHERE group_id IN (SELECT id FROM groups WHERE collection_id = ? AND kind = 'SIZE')",
    )
    .bind(collection_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM groups WHERE collection_id = ? AND kind = 'SIZE'")
        .bind(collection_id)
        .execute(&mut *tx)
        .await?;

    // Enumerate in the kind's stable natural order. Words have no sequence
    // position, so creation order (then surrogate id) stands in for it.
    let ids: Vec<String> = if kind.is_sequenced() {
        sqlx::query_scalar(
            "SELECT id FROM items WHERE collection_id = ? AND seq >= ? ORDER BY seq ASC, id ASC",
        )
        .bind(collection_id)
        .bind(start_index.unwrap_or(0))
        .fetch_all(&mut *tx)
        .await?
    } else {
        sqlx::query_scalar(
            "SELECT id FROM items WHERE collection_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(collection_id)
        .fetch_all(&mut *tx)
        .await?
    };

    // Assign consecutive windows to freshly created groups.
    let mut report = RepartitionReport::default();
    for (window_no, window) in ids.chunks(size as usize).enumerate() {
        let n = (window_no + 1) as i64;
        let name = name_pattern.replace("{n}", &n.to_string());
        let group = resolve_group(&mut tx, collection_id, &name, GroupKind::Size, Some(n)).await?;
        report.groups_created += 1;
        for (pos, item_id) in window.iter().enumerate() {
            sqlx::query("UPDATE items SET group_id = ?, group_index = ? WHERE id = ?")
                .bind(&group.id)
                .bind((pos + 1) as i64)
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
            report.items_assigned += 1;
        }
    }

    tx.commit().await?;
    Ok(report)
}

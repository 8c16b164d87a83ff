//! Group resolution and per-call insertion cursors.
//!
//! Groups are created lazily on first reference by name within an import
//! call. The de-duplication key is the normalized slug, unique per
//! collection, so names that normalize identically resolve to one group.
//!
//! [`GroupCursors`] is the per-call position state: the first time a group
//! is touched, the current max `group_index` is read from the store; every
//! further item routed to the same group advances the counter locally,
//! avoiding one round-trip per item. The struct is an explicit value owned
//! by one import call, never shared process state, so concurrent calls
//! cannot observe each other's cursors.

use anyhow::Result;
use sqlx::{Row, SqliteConnection};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Group, GroupKind};

/// Normalize a display name into its slug: lowercase, runs of
/// non-alphanumeric characters collapsed to a single hyphen, trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Find a group by (collection, slug) or create it with the next ordinal
/// position. An existing group is returned unchanged: its kind and order
/// are never rewritten by a later call using the same name.
pub async fn resolve_group(
    conn: &mut SqliteConnection,
    collection_id: i64,
    name: &str,
    kind: GroupKind,
    explicit_order: Option<i64>,
) -> Result<Group> {
    let slug = slugify(name);

    if let Some(existing) = fetch_by_slug(conn, collection_id, &slug).await? {
        return Ok(existing);
    }

    let ord = match explicit_order {
        Some(ord) => ord,
        None => {
            let max: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(ord), 0) FROM groups WHERE collection_id = ?",
            )
            .bind(collection_id)
            .fetch_one(&mut *conn)
            .await?;
            max + 1
        }
    };

    let group = Group {
        id: Uuid::new_v4().to_string(),
        collection_id,
        name: name.to_string(),
        slug,
        kind,
        ord,
    };

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO groups (id, collection_id, name, slug, kind, ord, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&group.id)
    .bind(group.collection_id)
    .bind(&group.name)
    .bind(&group.slug)
    .bind(group.kind.as_str())
    .bind(group.ord)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(group)
}

async fn fetch_by_slug(
    conn: &mut SqliteConnection,
    collection_id: i64,
    slug: &str,
) -> Result<Option<Group>> {
    let row = sqlx::query(
        "SELECT id, name, slug, kind, ord FROM groups WHERE collection_id = ? AND slug = ?",
    )
    .bind(collection_id)
    .bind(slug)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| {
        let kind: String = row.get("kind");
        Group {
            id: row.get("id"),
            collection_id,
            name: row.get("name"),
            slug: row.get("slug"),
            kind: GroupKind::parse(&kind).unwrap_or(GroupKind::None),
            ord: row.get("ord"),
        }
    }))
}

struct CursorSlot {
    group_id: String,
    next_index: i64,
}

/// Per-call group insertion cursors, keyed by (kind, name).
#[derive(Default)]
pub struct GroupCursors {
    slots: HashMap<(GroupKind, String), CursorSlot>,
}

impl GroupCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the target group and hand out a position for one item.
    ///
    /// An `explicit_index` from the source item wins over the cursor and
    /// does not consume a cursor value.
    pub async fn assign(
        &mut self,
        conn: &mut SqliteConnection,
        collection_id: i64,
        name: &str,
        kind: GroupKind,
        explicit_order: Option<i64>,
        explicit_index: Option<i64>,
    ) -> Result<(String, i64)> {
        let slot = match self.slots.entry((kind, name.to_string())) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let group = resolve_group(conn, collection_id, name, kind, explicit_order).await?;
                let max: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(group_index), 0) FROM items WHERE group_id = ?",
                )
                .bind(&group.id)
                .fetch_one(&mut *conn)
                .await?;
                entry.insert(CursorSlot {
                    group_id: group.id,
                    next_index: max + 1,
                })
            }
        };
        let index = match explicit_index {
            Some(index) => index,
            None => {
                let index = slot.next_index;
                slot.next_index += 1;
                index
            }
        };
        Ok((slot.group_id.clone(), index))
    }

    /// Forget everything. Called after a chunk transaction rolls back:
    /// groups created inside it no longer exist, so cached ids and
    /// positions must be re-read from the store.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}

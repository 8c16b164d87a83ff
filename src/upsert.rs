//! Idempotent per-item upserts.
//!
//! Every item is written against its natural key, (collection, word) for
//! words and (collection, sequence position) for sentences and shadowing
//! clips, never the surrogate id, so re-importing the same payload updates rows
//! in place instead of duplicating them. Each upsert re-derives the asset
//! key and resets `audio_status` to PENDING: an import always invalidates
//! previously generated audio, since the text may have changed.

use anyhow::{anyhow, bail, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::asset_key::derive_key;
use crate::groups::GroupCursors;
use crate::models::{AudioStatus, ContentKind, GroupKind, TextFields, WordFields};

/// How group membership is decided for one item.
pub enum GroupTarget<'a> {
    /// Membership fixed by the surrounding pre-chunked group.
    Fixed {
        name: &'a str,
        kind: GroupKind,
        order: Option<i64>,
    },
    /// Derived from the item's own `unit`/`type` tags, if any
    /// (`unit` wins when both are present).
    FromTags,
}

/// Parse and upsert one raw item inside the caller's transaction.
///
/// Returns `Err` with a caller-facing message on a per-item failure
/// (malformed shape, empty natural-key field); the caller records it and
/// continues with the item's siblings.
pub async fn upsert_raw_item(
    conn: &mut SqliteConnection,
    collection_id: i64,
    kind: ContentKind,
    cursors: &mut GroupCursors,
    raw: &serde_json::Value,
    fallback_seq: i64,
    target: GroupTarget<'_>,
) -> Result<()> {
    match kind {
        ContentKind::Word => upsert_word(conn, collection_id, cursors, raw, target).await,
        ContentKind::Sentence | ContentKind::Shadowing => {
            upsert_text_item(conn, collection_id, kind, cursors, raw, fallback_seq, target).await
        }
    }
}

async fn upsert_word(
    conn: &mut SqliteConnection,
    collection_id: i64,
    cursors: &mut GroupCursors,
    raw: &serde_json::Value,
    target: GroupTarget<'_>,
) -> Result<()> {
    let fields: WordFields = serde_json::from_value(raw.clone())
        .map_err(|e| anyhow!("invalid word item: {}", e))?;
    if fields.word.trim().is_empty() {
        bail!("word must be a non-empty string");
    }

    let asset_key = derive_key(ContentKind::Word, &fields.word);
    let membership = assign_group(
        conn,
        collection_id,
        cursors,
        target,
        fields.unit.as_deref(),
        fields.type_tag.as_deref(),
        fields.group_index,
    )
    .await?;
    let (group_id, group_index) = split(membership);

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO items (id, collection_id, word, translation, phonetic, definition,
                           asset_key, audio_status, group_id, group_index, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(collection_id, word) DO UPDATE SET
            translation = COALESCE(excluded.translation, items.translation),
            phonetic = COALESCE(excluded.phonetic, items.phonetic),
            definition = COALESCE(excluded.definition, items.definition),
            asset_key = excluded.asset_key,
            audio_status = excluded.audio_status,
            group_id = COALESCE(excluded.group_id, items.group_id),
            group_index = COALESCE(excluded.group_index, items.group_index),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(collection_id)
    .bind(&fields.word)
    .bind(fields.translation.as_deref())
    .bind(fields.phonetic.as_deref())
    .bind(fields.definition.as_deref())
    .bind(&asset_key)
    .bind(AudioStatus::Pending.as_str())
    .bind(group_id.as_deref())
    .bind(group_index)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn upsert_text_item(
    conn: &mut SqliteConnection,
    collection_id: i64,
    kind: ContentKind,
    cursors: &mut GroupCursors,
    raw: &serde_json::Value,
    fallback_seq: i64,
    target: GroupTarget<'_>,
) -> Result<()> {
    let fields: TextFields = serde_json::from_value(raw.clone())
        .map_err(|e| anyhow!("invalid {} item: {}", kind.as_str().to_lowercase(), e))?;
    if fields.text.trim().is_empty() {
        bail!("text must be a non-empty string");
    }

    let seq = fields.index.unwrap_or(fallback_seq);
    let asset_key = derive_key(kind, &fields.text);
    let membership = assign_group(
        conn,
        collection_id,
        cursors,
        target,
        fields.unit.as_deref(),
        fields.type_tag.as_deref(),
        fields.group_index,
    )
    .await?;
    let (group_id, group_index) = split(membership);

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO items (id, collection_id, seq, text, translation,
                           asset_key, audio_status, group_id, group_index, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(collection_id, seq) DO UPDATE SET
            text = excluded.text,
            translation = COALESCE(excluded.translation, items.translation),
            asset_key = excluded.asset_key,
            audio_status = excluded.audio_status,
            group_id = COALESCE(excluded.group_id, items.group_id),
            group_index = COALESCE(excluded.group_index, items.group_index),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(collection_id)
    .bind(seq)
    .bind(&fields.text)
    .bind(fields.translation.as_deref())
    .bind(&asset_key)
    .bind(AudioStatus::Pending.as_str())
    .bind(group_id.as_deref())
    .bind(group_index)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Resolve where this item belongs, if anywhere. Returns the group id plus
/// the item's 1-based position within that group.
async fn assign_group(
    conn: &mut SqliteConnection,
    collection_id: i64,
    cursors: &mut GroupCursors,
    target: GroupTarget<'_>,
    unit: Option<&str>,
    type_tag: Option<&str>,
    explicit_index: Option<i64>,
) -> Result<Option<(String, i64)>> {
    let (name, kind, order) = match target {
        GroupTarget::Fixed { name, kind, order } => (name, kind, order),
        GroupTarget::FromTags => match (nonblank(unit), nonblank(type_tag)) {
            (Some(unit), _) => (unit, GroupKind::Unit, None),
            (None, Some(tag)) => (tag, GroupKind::Type, None),
            (None, None) => return Ok(None),
        },
    };

    let assigned = cursors
        .assign(conn, collection_id, name, kind, order, explicit_index)
        .await?;
    Ok(Some(assigned))
}

fn nonblank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn split(membership: Option<(String, i64)>) -> (Option<String>, Option<i64>) {
    match membership {
        Some((id, index)) => (Some(id), Some(index)),
        None => (None, None),
    }
}

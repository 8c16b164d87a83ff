//! Database statistics overview.
//!
//! Per-collection item, group, and audio-backlog counts. Used by
//! `lingest stats` to confirm imports landed where they should.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct CollectionStats {
    id: i64,
    kind: String,
    name: String,
    item_count: i64,
    group_count: i64,
    pending_count: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.kind, c.name,
            (SELECT COUNT(*) FROM items i WHERE i.collection_id = c.id) AS item_count,
            (SELECT COUNT(*) FROM groups g WHERE g.collection_id = c.id) AS group_count,
            (SELECT COUNT(*) FROM items i
               WHERE i.collection_id = c.id AND i.audio_status = 'PENDING') AS pending_count
        FROM collections c
        ORDER BY c.id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let stats: Vec<CollectionStats> = rows
        .iter()
        .map(|row| CollectionStats {
            id: row.get("id"),
            kind: row.get("kind"),
            name: row.get("name"),
            item_count: row.get("item_count"),
            group_count: row.get("group_count"),
            pending_count: row.get("pending_count"),
        })
        .collect();

    println!("lingest — Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Collections: {}", stats.len());
    println!();
    println!(
        "  {:<6} {:<10} {:<24} {:>8} {:>8} {:>14}",
        "ID", "KIND", "NAME", "ITEMS", "GROUPS", "AUDIO PENDING"
    );
    for s in &stats {
        println!(
            "  {:<6} {:<10} {:<24} {:>8} {:>8} {:>14}",
            s.id, s.kind, s.name, s.item_count, s.group_count, s.pending_count
        );
    }

    let total_items: i64 = stats.iter().map(|s| s.item_count).sum();
    let total_pending: i64 = stats.iter().map(|s| s.pending_count).sum();
    println!();
    println!("  Items total:   {}", total_items);
    println!("  Audio backlog: {}", total_pending);

    pool.close().await;
    Ok(())
}

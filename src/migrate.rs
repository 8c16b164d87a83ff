use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Collections are owned by the content catalog; the importer only reads
    // identity and kind, but creates the table so a fresh database works.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            collection_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            kind TEXT NOT NULL,
            ord INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(collection_id, slug),
            FOREIGN KEY (collection_id) REFERENCES collections(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One table holds all three item kinds; a collection only ever contains
    // one kind, so the two natural keys never collide (word rows leave seq
    // NULL and vice versa, and SQLite UNIQUE ignores NULL rows).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            collection_id INTEGER NOT NULL,
            word TEXT,
            seq INTEGER,
            text TEXT,
            translation TEXT,
            phonetic TEXT,
            definition TEXT,
            asset_key TEXT NOT NULL,
            audio_status TEXT NOT NULL DEFAULT 'PENDING',
            group_id TEXT,
            group_index INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(collection_id, word),
            UNIQUE(collection_id, seq),
            FOREIGN KEY (collection_id) REFERENCES collections(id),
            FOREIGN KEY (group_id) REFERENCES groups(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_groups_collection ON groups(collection_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_group ON items(group_id)")
        .execute(pool)
        .await?;

    Ok(())
}

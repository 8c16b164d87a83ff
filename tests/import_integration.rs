//! End-to-end import pipeline tests against a temporary SQLite database.

use serde_json::json;
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;

use lingest::config::{Config, DbConfig, ImportConfig, ServerConfig};
use lingest::error::ImportError;
use lingest::ingest::{run_import, CollectionLocks};
use lingest::models::ImportRequest;
use lingest::{db, migrate};

async fn setup() -> (TempDir, Config, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("lingest.sqlite"),
        },
        import: ImportConfig::default(),
        server: ServerConfig::default(),
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, config, pool)
}

async fn seed_collection(pool: &SqlitePool, id: i64, kind: &str, name: &str) {
    sqlx::query("INSERT INTO collections (id, kind, name, created_at) VALUES (?, ?, ?, 0)")
        .bind(id)
        .bind(kind)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

async fn item_count(pool: &SqlitePool, collection_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE collection_id = ?")
        .bind(collection_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn word_request(set_id: i64, data: Vec<serde_json::Value>) -> ImportRequest {
    ImportRequest {
        kind: Some("WORD".to_string()),
        set_id: Some(set_id),
        data: Some(data),
        ..Default::default()
    }
}

fn sentence_request(set_id: i64, data: Vec<serde_json::Value>) -> ImportRequest {
    ImportRequest {
        kind: Some("SENTENCE".to_string()),
        set_id: Some(set_id),
        data: Some(data),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_word_import_is_idempotent() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 5, "WORD", "CET-4").await;
    let locks = CollectionLocks::new();

    let data = vec![json!({"word": "abandon", "translation": "放弃"})];

    let first = run_import(&pool, &locks, &config, word_request(5, data.clone()))
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.success_count, 1);
    assert_eq!(first.failed_count, 0);
    assert_eq!(item_count(&pool, 5).await, 1);

    let second = run_import(&pool, &locks, &config, word_request(5, data))
        .await
        .unwrap();
    assert_eq!(second.success_count, 1);
    assert_eq!(item_count(&pool, 5).await, 1, "re-import must not duplicate");

    let row = sqlx::query("SELECT translation, group_id, audio_status FROM items WHERE word = ?")
        .bind("abandon")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("translation"), "放弃");
    assert!(row.get::<Option<String>, _>("group_id").is_none());
    assert_eq!(row.get::<String, _>("audio_status"), "PENDING");
}

#[tokio::test]
async fn test_reimport_updates_fields_in_place() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "apple", "translation": "苹果"})]),
    )
    .await
    .unwrap();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![json!({"word": "apple", "translation": "苹果（水果）", "phonetic": "ˈæpl"})],
        ),
    )
    .await
    .unwrap();

    assert_eq!(item_count(&pool, 1).await, 1);
    let row = sqlx::query("SELECT translation, phonetic FROM items WHERE word = ?")
        .bind("apple")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("translation"), "苹果（水果）");
    assert_eq!(row.get::<String, _>("phonetic"), "ˈæpl");
}

#[tokio::test]
async fn test_missing_word_field_is_per_item_failure() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    let summary = run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"translation": "只有翻译"})]),
    )
    .await
    .unwrap();

    assert!(!summary.success);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].index, 0);
    assert_eq!(item_count(&pool, 1).await, 0);
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    let summary = run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![
                json!({"word": "alpha"}),
                json!({"word": ""}),
                json!({"word": "gamma"}),
            ],
        ),
    )
    .await
    .unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.success_count + summary.failed_count, 3);
    assert_eq!(summary.errors[0].index, 1);
    assert_eq!(item_count(&pool, 1).await, 2);
}

#[tokio::test]
async fn test_empty_data_array() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    let summary = run_import(&pool, &locks, &config, word_request(1, vec![]))
        .await
        .unwrap();
    assert!(summary.success);
    assert_eq!(summary.success_count, 0);
    assert_eq!(summary.failed_count, 0);
}

#[tokio::test]
async fn test_unit_tag_creates_group_and_positions() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![
                json!({"word": "one", "unit": "Unit 1"}),
                json!({"word": "two", "unit": "Unit 1"}),
                json!({"word": "three", "unit": "Unit 2"}),
            ],
        ),
    )
    .await
    .unwrap();

    let groups = sqlx::query("SELECT id, name, kind, ord FROM groups ORDER BY ord")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].get::<String, _>("kind"), "UNIT");
    assert_eq!(groups[0].get::<i64, _>("ord"), 1);
    assert_eq!(groups[1].get::<i64, _>("ord"), 2);

    let unit1: String = groups[0].get("id");
    let indices: Vec<i64> = sqlx::query_scalar(
        "SELECT group_index FROM items WHERE group_id = ? ORDER BY group_index",
    )
    .bind(&unit1)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn test_unit_wins_over_type_tag() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![json!({"word": "mix", "unit": "U1", "type": "noun"})],
        ),
    )
    .await
    .unwrap();

    let kinds: Vec<String> = sqlx::query_scalar("SELECT kind FROM groups")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(kinds, vec!["UNIT".to_string()]);
}

#[tokio::test]
async fn test_explicit_group_index_wins_over_cursor() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![
                json!({"word": "a", "unit": "U1", "groupIndex": 7}),
                json!({"word": "b", "unit": "U1"}),
            ],
        ),
    )
    .await
    .unwrap();

    let row = sqlx::query("SELECT group_index FROM items WHERE word = ?")
        .bind("a")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("group_index"), 7);

    // The cursor is untouched by explicit indexes.
    let row = sqlx::query("SELECT group_index FROM items WHERE word = ?")
        .bind("b")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("group_index"), 1);
}

#[tokio::test]
async fn test_names_normalizing_to_same_slug_share_a_group() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "a", "unit": "Unit 1"})]),
    )
    .await
    .unwrap();
    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "b", "unit": "unit   1"})]),
    )
    .await
    .unwrap();

    let group_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(group_count, 1, "slug-equal names must not duplicate groups");
}

#[tokio::test]
async fn test_group_kind_is_first_writer_wins() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    // First reference creates the group as UNIT.
    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "a", "unit": "Topic"})]),
    )
    .await
    .unwrap();

    // Same name arriving as a TYPE tag must not rewrite the kind.
    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "b", "type": "Topic"})]),
    )
    .await
    .unwrap();

    let kinds: Vec<String> = sqlx::query_scalar("SELECT kind FROM groups")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(kinds, vec!["UNIT".to_string()]);
}

#[tokio::test]
async fn test_prechunked_groups_phase() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    let request: ImportRequest = serde_json::from_value(json!({
        "type": "WORD",
        "setId": 1,
        "groups": [
            {"name": "Lesson 1", "items": [{"word": "a"}, {"word": "b"}]},
            {"name": "Lesson 2", "kind": "MANUAL", "order": 9, "items": [{"word": "c"}]}
        ]
    }))
    .unwrap();

    let summary = run_import(&pool, &locks, &config, request).await.unwrap();
    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failed_count, 0);

    let rows = sqlx::query("SELECT name, kind, ord FROM groups ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<String, _>("kind"), "UNIT");
    assert_eq!(rows[1].get::<String, _>("kind"), "MANUAL");
    assert_eq!(rows[1].get::<i64, _>("ord"), 9);

    let grouped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE group_id IS NOT NULL")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(grouped, 3);
}

#[tokio::test]
async fn test_sequence_positions_continue_across_chunks() {
    let (_tmp, config, pool) = setup().await;
    let config = Config {
        import: ImportConfig {
            batch_size: 10,
            ..ImportConfig::default()
        },
        ..config
    };
    seed_collection(&pool, 2, "SENTENCE", "sentences").await;
    let locks = CollectionLocks::new();

    let data: Vec<serde_json::Value> = (0..25).map(|i| json!({"text": format!("句子 {}", i)})).collect();
    let summary = run_import(&pool, &locks, &config, sentence_request(2, data))
        .await
        .unwrap();
    assert_eq!(summary.success_count, 25);

    let seqs: Vec<i64> = sqlx::query_scalar("SELECT seq FROM items WHERE collection_id = 2 ORDER BY seq")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(seqs, (1..=25).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_explicit_sentence_index_is_honored() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 2, "SENTENCE", "sentences").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        sentence_request(2, vec![json!({"text": "later", "index": 40})]),
    )
    .await
    .unwrap();
    // Re-importing under the same explicit index updates in place.
    run_import(
        &pool,
        &locks,
        &config,
        sentence_request(2, vec![json!({"text": "later (edited)", "index": 40})]),
    )
    .await
    .unwrap();

    assert_eq!(item_count(&pool, 2).await, 1);
    let row = sqlx::query("SELECT text, seq FROM items WHERE collection_id = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("text"), "later (edited)");
    assert_eq!(row.get::<i64, _>("seq"), 40);
}

#[tokio::test]
async fn test_size_repartition_45_sentences_into_20s() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 2, "SENTENCE", "sentences").await;
    let locks = CollectionLocks::new();

    let data: Vec<serde_json::Value> =
        (1..=45).map(|i| json!({"text": format!("第{}句", i)})).collect();
    let request = ImportRequest {
        strategy: Some("SIZE".to_string()),
        size: Some(20),
        ..sentence_request(2, data)
    };

    let summary = run_import(&pool, &locks, &config, request).await.unwrap();
    assert_eq!(summary.success_count, 45);

    let groups = sqlx::query("SELECT id, name, kind, ord FROM groups ORDER BY ord")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(groups.len(), 3);
    let names: Vec<String> = groups.iter().map(|r| r.get("name")).collect();
    assert_eq!(names, vec!["第1组", "第2组", "第3组"]);
    assert!(groups.iter().all(|r| r.get::<String, _>("kind") == "SIZE"));

    let mut sizes = Vec::new();
    for row in &groups {
        let id: String = row.get("id");
        let indices: Vec<i64> = sqlx::query_scalar(
            "SELECT group_index FROM items WHERE group_id = ? ORDER BY group_index",
        )
        .bind(&id)
        .fetch_all(&pool)
        .await
        .unwrap();
        // Each group's indices are exactly 1..len with no gaps.
        assert_eq!(indices, (1..=indices.len() as i64).collect::<Vec<i64>>());
        sizes.push(indices.len());
    }
    assert_eq!(sizes, vec![20, 20, 5]);

    // Every item belongs to exactly one group.
    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM items WHERE collection_id = 2 AND group_id IS NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(orphans, 0);

    // Concatenating groups in order reproduces the sequence ordering.
    let ordered: Vec<i64> = sqlx::query_scalar(
        "SELECT i.seq FROM items i JOIN groups g ON g.id = i.group_id \
         WHERE i.collection_id = 2 ORDER BY g.ord, i.group_index",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(ordered, (1..=45).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_repartition_rerun_replaces_size_groups() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 2, "SENTENCE", "sentences").await;
    let locks = CollectionLocks::new();

    let data: Vec<serde_json::Value> =
        (1..=30).map(|i| json!({"text": format!("s{}", i)})).collect();
    let request = ImportRequest {
        strategy: Some("SIZE".to_string()),
        size: Some(10),
        ..sentence_request(2, data)
    };
    run_import(&pool, &locks, &config, request).await.unwrap();

    // Re-partition alone, with a different size.
    let repartition_only = ImportRequest {
        kind: Some("SENTENCE".to_string()),
        set_id: Some(2),
        strategy: Some("SIZE".to_string()),
        size: Some(25),
        ..Default::default()
    };
    run_import(&pool, &locks, &config, repartition_only)
        .await
        .unwrap();

    let group_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE kind = 'SIZE'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(group_count, 2, "old SIZE groups must be wiped, not kept");

    let sizes: Vec<i64> = sqlx::query_scalar(
        "SELECT COUNT(i.id) FROM groups g LEFT JOIN items i ON i.group_id = g.id \
         GROUP BY g.id ORDER BY g.ord",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(sizes, vec![25, 5]);
}

#[tokio::test]
async fn test_repartition_keeps_other_group_rows() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(
            1,
            vec![
                json!({"word": "a", "unit": "U1"}),
                json!({"word": "b", "unit": "U1"}),
            ],
        ),
    )
    .await
    .unwrap();

    let repartition = ImportRequest {
        kind: Some("WORD".to_string()),
        set_id: Some(1),
        strategy: Some("SIZE".to_string()),
        size: Some(1),
        ..Default::default()
    };
    run_import(&pool, &locks, &config, repartition).await.unwrap();

    // The UNIT group row survives; membership moved to the SIZE groups.
    let unit_groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE kind = 'UNIT'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(unit_groups, 1);
    let size_groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE kind = 'SIZE'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(size_groups, 2);
}

#[tokio::test]
async fn test_precondition_failures() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    // Unknown kind.
    let err = run_import(
        &pool,
        &locks,
        &config,
        ImportRequest {
            kind: Some("AUDIO".to_string()),
            set_id: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnknownKind(_))
    ));

    // Missing set id.
    let err = run_import(
        &pool,
        &locks,
        &config,
        ImportRequest {
            kind: Some("WORD".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::MissingSetId)
    ));

    // Collection does not exist.
    let err = run_import(
        &pool,
        &locks,
        &config,
        word_request(99, vec![json!({"word": "a"})]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::CollectionNotFound { id: 99, .. })
    ));
    assert_eq!(item_count(&pool, 99).await, 0, "no partial work");

    // Collection exists under a different kind.
    let err = run_import(
        &pool,
        &locks,
        &config,
        sentence_request(1, vec![json!({"text": "hi"})]),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::CollectionNotFound { id: 1, .. })
    ));

    // SIZE strategy without a size.
    let err = run_import(
        &pool,
        &locks,
        &config,
        ImportRequest {
            kind: Some("WORD".to_string()),
            set_id: Some(1),
            strategy: Some("SIZE".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::MissingSize)
    ));

    // Unknown strategy.
    let err = run_import(
        &pool,
        &locks,
        &config,
        ImportRequest {
            kind: Some("WORD".to_string()),
            set_id: Some(1),
            strategy: Some("RANDOM".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnknownStrategy(_))
    ));
}

#[tokio::test]
async fn test_asset_key_is_stamped_and_stable() {
    let (_tmp, config, pool) = setup().await;
    seed_collection(&pool, 1, "WORD", "words").await;
    let locks = CollectionLocks::new();

    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "stable"})]),
    )
    .await
    .unwrap();
    let first: String = sqlx::query_scalar("SELECT asset_key FROM items WHERE word = 'stable'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(first.len(), 32);
    assert_eq!(first, lingest::asset_key::derive_key(lingest::models::ContentKind::Word, "stable"));

    run_import(
        &pool,
        &locks,
        &config,
        word_request(1, vec![json!({"word": "stable", "translation": "稳定"})]),
    )
    .await
    .unwrap();
    let second: String = sqlx::query_scalar("SELECT asset_key FROM items WHERE word = 'stable'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(first, second);
}

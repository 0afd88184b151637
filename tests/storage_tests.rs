//! Storage backend tests
//!
//! Tests for SeaOrmStorage using temporary SQLite databases.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use linkpulse::config::DatabaseConfig;
use linkpulse::errors::LinkpulseError;
use linkpulse::storage::backend::infer_backend_from_url;
use linkpulse::storage::{
    ClickEvent, ClickEventStore, ClickOutcome, DateRange, Dimension, Link, LinkStore, LinkUpdate,
    SeaOrmStorage,
};
use tempfile::TempDir;

/// 创建临时 SQLite 数据库的存储实例
async fn create_temp_storage() -> (SeaOrmStorage, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };

    let storage = SeaOrmStorage::new(&config)
        .await
        .expect("Failed to create storage");

    (storage, temp_dir)
}

fn create_test_link(code: &str, target: &str) -> Link {
    Link {
        short_code: code.to_string(),
        original_url: target.to_string(),
        owner_id: Some("owner-1".to_string()),
        custom_alias: true,
        created_at: Utc::now(),
        expires_at: None,
        active: true,
        click_count: 0,
    }
}

fn event(id: i64, code: &str, day: u32, outcome: ClickOutcome) -> ClickEvent {
    ClickEvent {
        event_id: id,
        short_code: code.to_string(),
        ts: Utc.with_ymd_and_hms(2026, 5, day, 8, 30, 0).unwrap(),
        geo: Some("FR".to_string()),
        device: Some("mobile".to_string()),
        referrer: None,
        outcome,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
}

// =============================================================================
// URL 推断
// =============================================================================

#[test]
fn test_infer_backend_from_url() {
    assert_eq!(infer_backend_from_url("sqlite://data/lp.db").unwrap(), "sqlite");
    assert_eq!(infer_backend_from_url("links.db").unwrap(), "sqlite");
    assert_eq!(infer_backend_from_url(":memory:").unwrap(), "sqlite");
    assert_eq!(infer_backend_from_url("mariadb://u:p@h/db").unwrap(), "mysql");
    assert_eq!(infer_backend_from_url("postgresql://h/db").unwrap(), "postgres");
    assert!(matches!(
        infer_backend_from_url("redis://localhost"),
        Err(LinkpulseError::Config(_))
    ));
}

// =============================================================================
// LinkStore
// =============================================================================

#[tokio::test]
async fn test_create_and_get() {
    let (storage, _dir) = create_temp_storage().await;
    let link = create_test_link("promo", "https://example.com/landing");

    storage.create(link.clone()).await.unwrap();
    let loaded = storage.get("promo").await.unwrap().unwrap();
    assert_eq!(loaded.original_url, link.original_url);
    assert_eq!(loaded.owner_id.as_deref(), Some("owner-1"));
    assert!(loaded.custom_alias);
    assert!(loaded.active);

    assert!(storage.get("missing").await.unwrap().is_none());
    assert_eq!(storage.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_create_is_alias_taken() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .create(create_test_link("promo", "https://a.example"))
        .await
        .unwrap();

    let err = storage
        .create(create_test_link("promo", "https://b.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkpulseError::AliasTaken(_)), "{:?}", err);
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let (storage, _dir) = create_temp_storage().await;

    let err = storage
        .create(create_test_link("bad", "ftp://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkpulseError::InvalidUrl(_)));

    let mut expired = create_test_link("old", "https://example.com");
    expired.expires_at = Some(Utc::now() - Duration::seconds(1));
    let err = storage.create(expired).await.unwrap_err();
    assert!(matches!(err, LinkpulseError::InvalidExpiration(_)));

    assert_eq!(storage.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_and_deactivate() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .create(create_test_link("promo", "https://a.example"))
        .await
        .unwrap();

    let expires_at = Utc::now() + Duration::days(1);
    let updated = storage
        .update(
            "promo",
            LinkUpdate {
                original_url: Some("https://b.example".to_string()),
                expires_at: Some(Some(expires_at)),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.original_url, "https://b.example");
    assert!(updated.expires_at.is_some());

    storage.deactivate("promo").await.unwrap();
    // 幂等
    storage.deactivate("promo").await.unwrap();
    assert!(!storage.get("promo").await.unwrap().unwrap().active);

    assert!(matches!(
        storage.deactivate("missing").await,
        Err(LinkpulseError::NotFound(_))
    ));
    assert!(matches!(
        storage.update("missing", LinkUpdate::default()).await,
        Err(LinkpulseError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_click_counters() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .create(create_test_link("promo", "https://a.example"))
        .await
        .unwrap();

    storage.increment_click("promo").await.unwrap();
    storage
        .add_clicks(&[("promo".to_string(), 4), ("ghost".to_string(), 9)])
        .await
        .unwrap();
    assert_eq!(storage.get("promo").await.unwrap().unwrap().click_count, 5);

    storage.set_click_count("promo", 2).await.unwrap();
    assert_eq!(storage.get("promo").await.unwrap().unwrap().click_count, 2);
}

#[tokio::test]
async fn test_deactivate_expired() {
    let (storage, _dir) = create_temp_storage().await;
    let mut soon = create_test_link("soon", "https://a.example");
    soon.expires_at = Some(Utc::now() + Duration::seconds(30));
    storage.create(soon).await.unwrap();
    storage
        .create(create_test_link("forever", "https://b.example"))
        .await
        .unwrap();

    assert!(storage.deactivate_expired(Utc::now()).await.unwrap().is_empty());

    let later = Utc::now() + Duration::minutes(5);
    assert_eq!(
        storage.deactivate_expired(later).await.unwrap(),
        vec!["soon".to_string()]
    );
    // 已停用的不会再次返回
    assert!(storage.deactivate_expired(later).await.unwrap().is_empty());
    assert!(storage.get("forever").await.unwrap().unwrap().active);
}

// =============================================================================
// ClickEventStore
// =============================================================================

#[tokio::test]
async fn test_record_batch_is_idempotent() {
    let (storage, _dir) = create_temp_storage().await;
    let batch = vec![
        event(1, "promo", 1, ClickOutcome::Resolved),
        event(2, "promo", 1, ClickOutcome::Resolved),
        event(3, "promo", 2, ClickOutcome::Expired),
    ];

    let first = storage.record_batch(&batch).await.unwrap();
    assert_eq!(first.inserted, 3);
    assert_eq!(first.resolved_per_code, vec![("promo".to_string(), 2)]);

    let replay = storage.record_batch(&batch).await.unwrap();
    assert_eq!(replay.inserted, 0);
    assert_eq!(replay.duplicates, 3);
    assert!(replay.resolved_per_code.is_empty());

    assert_eq!(storage.event_count().await.unwrap(), 3);

    let range = DateRange::new(day(1), day(2)).unwrap();
    let rows = storage
        .query_rollups("promo", range, Dimension::Outcome)
        .await
        .unwrap();
    let total: u64 = rows.iter().map(|r| r.count).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_batch_with_internal_duplicates() {
    let (storage, _dir) = create_temp_storage().await;
    let e = event(7, "promo", 3, ClickOutcome::Resolved);
    let outcome = storage
        .record_batch(&[e.clone(), e.clone()])
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.duplicates, 1);
}

#[tokio::test]
async fn test_events_after_pages_in_id_order() {
    let (storage, _dir) = create_temp_storage().await;
    let batch: Vec<_> = (1..=5)
        .rev()
        .map(|id| event(id, "promo", 1, ClickOutcome::Resolved))
        .collect();
    storage.record_batch(&batch).await.unwrap();

    let page = storage.events_after(None, 2).await.unwrap();
    assert_eq!(page.iter().map(|e| e.event_id).collect::<Vec<_>>(), vec![1, 2]);
    let page = storage.events_after(Some(2), 10).await.unwrap();
    assert_eq!(page.iter().map(|e| e.event_id).collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(page[0].geo.as_deref(), Some("FR"));
    assert_eq!(page[0].outcome, ClickOutcome::Resolved);
}

#[tokio::test]
async fn test_rollup_totals_and_partial_clear() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .record_batch(&[
            event(1, "a", 1, ClickOutcome::Resolved),
            event(2, "a", 2, ClickOutcome::Resolved),
            event(3, "b", 2, ClickOutcome::Resolved),
            event(4, "b", 2, ClickOutcome::NotFound),
        ])
        .await
        .unwrap();

    let totals = storage
        .totals_by_code(Dimension::Outcome, "resolved")
        .await
        .unwrap();
    assert_eq!(totals, vec![("a".to_string(), 2), ("b".to_string(), 1)]);

    assert_eq!(storage.earliest_event_day().await.unwrap(), Some(day(1)));

    // 5/2 的汇总：a 四行，b 五行（outcome 有两个值）
    assert_eq!(storage.clear_rollups_from(day(2)).await.unwrap(), 9);
    let rows = storage
        .query_rollups("a", DateRange::new(day(1), day(2)).unwrap(), Dimension::Geo)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key.bucket, day(1));
    assert!(
        storage
            .query_rollups("b", DateRange::single(day(2)), Dimension::Outcome)
            .await
            .unwrap()
            .is_empty()
    );
    // 原始事件不受影响
    assert_eq!(storage.event_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_retention_purges() {
    let (storage, _dir) = create_temp_storage().await;
    storage
        .record_batch(&[
            event(1, "a", 1, ClickOutcome::Resolved),
            event(2, "a", 10, ClickOutcome::Resolved),
        ])
        .await
        .unwrap();

    let cutoff = Utc.with_ymd_and_hms(2026, 5, 5, 0, 0, 0).unwrap();
    assert_eq!(storage.purge_events_before(cutoff).await.unwrap(), 1);
    assert_eq!(storage.event_count().await.unwrap(), 1);

    // 每个日桶 4 个维度各一行
    assert_eq!(storage.purge_rollups_before(day(5)).await.unwrap(), 4);
}

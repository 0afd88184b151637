//! LinkService integration tests
//!
//! 覆盖短码唯一性（并发别名竞争、并发生成）、冲突重试上限、批量创建。

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkpulse::cache::{NullLinkCache, TieredLinkCache};
use linkpulse::config::{CacheConfig, CodeConfig, DatabaseConfig};
use linkpulse::errors::{LinkpulseError, Result};
use linkpulse::services::{CodeGenerator, CreateLinkRequest, LinkService};
use linkpulse::storage::{Link, LinkStore, LinkUpdate, MemoryStorage, SeaOrmStorage};
use tempfile::TempDir;

fn generator() -> CodeGenerator {
    CodeGenerator::new(&CodeConfig::default()).unwrap()
}

fn memory_service() -> Arc<LinkService> {
    Arc::new(LinkService::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(NullLinkCache),
        generator(),
    ))
}

/// 前 `collisions` 次 create 一律报告冲突的存储包装
struct CollidingStore {
    inner: MemoryStorage,
    collisions: u32,
    attempts: AtomicU32,
}

impl CollidingStore {
    fn new(collisions: u32) -> Self {
        Self {
            inner: MemoryStorage::new(),
            collisions,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LinkStore for CollidingStore {
    async fn create(&self, link: Link) -> Result<Link> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.collisions {
            return Err(LinkpulseError::alias_taken(format!(
                "Short code '{}' is already in use",
                link.short_code
            )));
        }
        self.inner.create(link).await
    }

    async fn get(&self, code: &str) -> Result<Option<Link>> {
        self.inner.get(code).await
    }

    async fn update(&self, code: &str, update: LinkUpdate) -> Result<Link> {
        self.inner.update(code, update).await
    }

    async fn deactivate(&self, code: &str) -> Result<()> {
        self.inner.deactivate(code).await
    }

    async fn add_clicks(&self, deltas: &[(String, u64)]) -> Result<()> {
        self.inner.add_clicks(deltas).await
    }

    async fn set_click_count(&self, code: &str, count: u64) -> Result<()> {
        self.inner.set_click_count(code, count).await
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.inner.deactivate_expired(now).await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }
}

async fn race_on_alias(service: Arc<LinkService>, tasks: usize) {
    let handles: Vec<_> = (0..tasks)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_link(
                        CreateLinkRequest::new(format!("https://example.com/{}", i))
                            .with_alias("launch"),
                    )
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    let mut taken = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(LinkpulseError::AliasTaken(_)) => taken += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(taken, tasks - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_alias_race_memory() {
    race_on_alias(memory_service(), 32).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_alias_race_sqlite() {
    let dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display()),
        ..Default::default()
    };
    let storage = Arc::new(SeaOrmStorage::new(&config).await.unwrap());
    let service = Arc::new(LinkService::new(
        storage,
        Arc::new(TieredLinkCache::new(&CacheConfig::default())),
        generator(),
    ));
    race_on_alias(service, 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generated_codes_are_distinct() {
    let service = memory_service();
    let handles: Vec<_> = (0..200)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_link(CreateLinkRequest::new(format!("https://example.com/{}", i)))
                    .await
            })
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        let link = handle.await.unwrap().unwrap();
        assert!(codes.insert(link.short_code));
    }
    assert_eq!(codes.len(), 200);
}

#[tokio::test]
async fn test_generated_code_retries_after_collisions() {
    let store = Arc::new(CollidingStore::new(3));
    let service = LinkService::new(store.clone(), Arc::new(NullLinkCache), generator());

    let link = service
        .create_link(CreateLinkRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
    assert!(store.get(&link.short_code).await.unwrap().is_some());
}

#[tokio::test]
async fn test_code_space_exhausted_after_cap() {
    let store = Arc::new(CollidingStore::new(u32::MAX));
    let service = LinkService::new(store.clone(), Arc::new(NullLinkCache), generator());

    let err = service
        .create_link(CreateLinkRequest::new("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkpulseError::CodeSpaceExhausted(_)));
    assert!(err.is_fatal());
    assert_eq!(
        store.attempts.load(Ordering::SeqCst),
        CodeConfig::default().max_attempts
    );
}

#[tokio::test]
async fn test_custom_alias_collision_is_not_retried() {
    let store = Arc::new(CollidingStore::new(1));
    let service = LinkService::new(store.clone(), Arc::new(NullLinkCache), generator());

    let err = service
        .create_link(CreateLinkRequest::new("https://example.com").with_alias("promo"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkpulseError::AliasTaken(_)));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bulk_create_positional_results() {
    let service = memory_service();
    service
        .create_link(CreateLinkRequest::new("https://taken.example").with_alias("taken"))
        .await
        .unwrap();

    let results = service
        .bulk_create(vec![
            CreateLinkRequest::new("https://ok.example/1"),
            CreateLinkRequest::new("not a url"),
            CreateLinkRequest::new("https://ok.example/2").with_alias("taken"),
            CreateLinkRequest::new("https://ok.example/3").with_alias("fresh"),
            CreateLinkRequest::new("https://ok.example/4").with_alias("api"),
        ])
        .await;

    assert_eq!(results.len(), 5);
    assert_eq!(
        results[0].as_ref().unwrap().original_url,
        "https://ok.example/1"
    );
    assert!(matches!(results[1], Err(LinkpulseError::InvalidUrl(_))));
    assert!(matches!(results[2], Err(LinkpulseError::AliasTaken(_))));
    assert_eq!(results[3].as_ref().unwrap().short_code, "fresh");
    assert!(matches!(results[4], Err(LinkpulseError::ReservedAlias(_))));
}

#[tokio::test]
async fn test_update_link_changes_target() {
    let service = memory_service();
    service
        .create_link(CreateLinkRequest::new("https://a.example").with_alias("promo"))
        .await
        .unwrap();

    let updated = service
        .update_link(
            "promo",
            LinkUpdate {
                original_url: Some("https://b.example".to_string()),
                expires_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.original_url, "https://b.example");

    let err = service
        .update_link(
            "promo",
            LinkUpdate {
                original_url: Some("javascript:void(0)".to_string()),
                expires_at: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LinkpulseError::InvalidUrl(_)));
}

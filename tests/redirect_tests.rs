//! RedirectService integration tests
//!
//! 解析状态机、缓存一致性、事件入队语义。

use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use linkpulse::analytics::{
    ClickPipeline, EventSink, LogDeadLetter, PipelineSettings, RequestContext,
};
use linkpulse::cache::{LinkCache, NullLinkCache, TieredLinkCache};
use linkpulse::config::{CacheConfig, CodeConfig};
use linkpulse::errors::{LinkpulseError, Result};
use linkpulse::services::{
    CodeGenerator, CreateLinkRequest, LinkService, PerLinkRateLimit, RedirectService, Resolution,
};
use linkpulse::storage::{
    ClickEvent, ClickOutcome, Link, LinkStore, LinkUpdate, MALFORMED_CODE, MemoryStorage,
};
use linkpulse::utils::{EventIdGenerator, RetryConfig};

struct CollectingSink {
    events: parking_lot::Mutex<Vec<ClickEvent>>,
}

impl CollectingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn outcomes(&self) -> Vec<ClickOutcome> {
        let mut events = self.events.lock().clone();
        events.sort_by_key(|e| e.event_id);
        events.into_iter().map(|e| e.outcome).collect()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn write_batch(&self, events: &[ClickEvent]) -> anyhow::Result<()> {
        self.events.lock().extend_from_slice(events);
        Ok(())
    }
}

/// 永不返回的 sink，用于模拟下游完全阻塞
struct BlockedSink;

#[async_trait]
impl EventSink for BlockedSink {
    async fn write_batch(&self, _events: &[ClickEvent]) -> anyhow::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// get 总是失败并计数的存储
struct FailingStore {
    gets: AtomicU32,
}

#[async_trait]
impl LinkStore for FailingStore {
    async fn create(&self, link: Link) -> Result<Link> {
        Ok(link)
    }

    async fn get(&self, _code: &str) -> Result<Option<Link>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(LinkpulseError::database_connection("connection refused"))
    }

    async fn update(&self, code: &str, _update: LinkUpdate) -> Result<Link> {
        Err(LinkpulseError::not_found(code))
    }

    async fn deactivate(&self, code: &str) -> Result<()> {
        Err(LinkpulseError::not_found(code))
    }

    async fn add_clicks(&self, _deltas: &[(String, u64)]) -> Result<()> {
        Ok(())
    }

    async fn set_click_count(&self, _code: &str, _count: u64) -> Result<()> {
        Ok(())
    }

    async fn deactivate_expired(&self, _now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<u64> {
        Ok(0)
    }
}

fn settings(queue_capacity: usize, workers: usize) -> PipelineSettings {
    PipelineSettings {
        queue_capacity,
        batch_size: 16,
        flush_interval: Duration::from_millis(20),
        workers,
        retry: RetryConfig::default(),
    }
}

fn generator() -> CodeGenerator {
    CodeGenerator::new(&CodeConfig::default()).unwrap()
}

struct Harness {
    store: Arc<MemoryStorage>,
    cache: Arc<dyn LinkCache>,
    pipeline: Arc<ClickPipeline>,
    sink: Arc<CollectingSink>,
    links: LinkService,
    redirect: RedirectService,
}

fn harness(cache: Arc<dyn LinkCache>) -> Harness {
    let store = Arc::new(MemoryStorage::new());
    let sink = CollectingSink::new();
    let pipeline = Arc::new(ClickPipeline::start(
        settings(1024, 2),
        sink.clone(),
        Arc::new(LogDeadLetter),
    ));
    let links = LinkService::new(store.clone(), Arc::clone(&cache), generator());
    let redirect = RedirectService::new(
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&pipeline),
        generator(),
        Arc::new(EventIdGenerator::new(1)),
    );
    Harness {
        store,
        cache,
        pipeline,
        sink,
        links,
        redirect,
    }
}

fn tiered() -> Arc<dyn LinkCache> {
    Arc::new(TieredLinkCache::new(&CacheConfig::default()))
}

fn redirect_to(url: &str) -> Resolution {
    Resolution::Redirect {
        target_url: url.to_string(),
    }
}

#[tokio::test]
async fn test_resolve_live_link() {
    let h = harness(tiered());
    let link = h
        .links
        .create_link(CreateLinkRequest::new("https://example.com/landing"))
        .await
        .unwrap();

    let ctx = RequestContext::new()
        .with_referrer("https://news.example.org/story")
        .with_geo("nl");
    assert_eq!(
        h.redirect.resolve(&link.short_code, &ctx).await,
        redirect_to("https://example.com/landing")
    );
    // 第二次命中缓存
    assert_eq!(
        h.redirect.resolve(&link.short_code, &ctx).await,
        redirect_to("https://example.com/landing")
    );
    assert_eq!(h.cache.stats().hits, 1);

    h.pipeline.shutdown().await;
    let events = h.sink.events.lock().clone();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.outcome == ClickOutcome::Resolved));
    assert_eq!(events[0].referrer.as_deref(), Some("news.example.org"));
    assert_eq!(events[0].geo.as_deref(), Some("NL"));
}

#[tokio::test]
async fn test_unknown_code_is_tombstoned() {
    let h = harness(tiered());
    let ctx = RequestContext::new();

    assert_eq!(h.redirect.resolve("nothere", &ctx).await, Resolution::NotFound);
    assert_eq!(h.redirect.resolve("nothere", &ctx).await, Resolution::NotFound);
    assert_eq!(h.cache.stats().tombstone_hits, 1);

    // 创建后墓碑被清除，立即可解析
    h.links
        .create_link(CreateLinkRequest::new("https://late.example").with_alias("nothere"))
        .await
        .unwrap();
    assert_eq!(
        h.redirect.resolve("nothere", &ctx).await,
        redirect_to("https://late.example")
    );

    h.pipeline.shutdown().await;
    assert_eq!(
        h.sink.outcomes(),
        vec![
            ClickOutcome::NotFound,
            ClickOutcome::NotFound,
            ClickOutcome::Resolved
        ]
    );
}

#[tokio::test]
async fn test_malformed_code_skips_cache_and_store() {
    let h = harness(tiered());
    let ctx = RequestContext::new();

    let too_long = "a".repeat(64);
    let huge = "b".repeat(10_000);
    for code in ["", "x", "has/slash", "white space", too_long.as_str(), huge.as_str()] {
        assert_eq!(h.redirect.resolve(code, &ctx).await, Resolution::NotFound);
    }
    let stats = h.cache.stats();
    assert_eq!(stats.misses + stats.hits + stats.tombstone_hits, 0);

    h.pipeline.shutdown().await;
    assert_eq!(h.sink.outcomes(), vec![ClickOutcome::NotFound; 6]);
    // 原始输入不进入事件，批量写入不会被超长短码拖垮
    let events = h.sink.events.lock().clone();
    assert!(events.iter().all(|e| e.short_code == MALFORMED_CODE));
}

#[tokio::test]
async fn test_expired_link_resolves_not_found() {
    let h = harness(tiered());
    let now = Utc::now();
    h.links
        .create_link(
            CreateLinkRequest::new("https://soon.example")
                .with_alias("soon")
                .with_expiry(now + ChronoDuration::hours(1)),
        )
        .await
        .unwrap();
    let ctx = RequestContext::new();

    // 预热缓存
    assert_eq!(
        h.redirect.resolve_at("soon", &ctx, now).await,
        redirect_to("https://soon.example")
    );
    // 缓存命中仍按读取时刻判断过期
    let later = now + ChronoDuration::hours(2);
    assert_eq!(
        h.redirect.resolve_at("soon", &ctx, later).await,
        Resolution::NotFound
    );

    h.pipeline.shutdown().await;
    assert_eq!(
        h.sink.outcomes(),
        vec![ClickOutcome::Resolved, ClickOutcome::Expired]
    );
}

async fn assert_expired_across_sweep(h: Harness) {
    h.links
        .create_link(
            CreateLinkRequest::new("https://flash.example")
                .with_alias("flash")
                .with_expiry(Utc::now() + ChronoDuration::milliseconds(300)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let ctx = RequestContext::new();

    assert_eq!(h.redirect.resolve("flash", &ctx).await, Resolution::NotFound);
    assert_eq!(h.links.sweep_expired(Utc::now()).await.unwrap(), 1);
    assert!(!h.store.get("flash").await.unwrap().unwrap().active);
    assert_eq!(h.redirect.resolve("flash", &ctx).await, Resolution::NotFound);
    assert_eq!(h.redirect.resolve("flash", &ctx).await, Resolution::NotFound);

    h.pipeline.shutdown().await;
    assert_eq!(h.sink.outcomes(), vec![ClickOutcome::Expired; 3]);
}

#[tokio::test]
async fn test_expired_outcome_does_not_depend_on_sweep() {
    assert_expired_across_sweep(harness(tiered())).await;
    assert_expired_across_sweep(harness(Arc::new(NullLinkCache))).await;
}

#[tokio::test]
async fn test_cached_link_never_outlives_expiry() {
    let h = harness(tiered());
    h.links
        .create_link(
            CreateLinkRequest::new("https://brief.example")
                .with_alias("brief")
                .with_expiry(Utc::now() + ChronoDuration::milliseconds(800)),
        )
        .await
        .unwrap();
    let ctx = RequestContext::new();

    assert_eq!(
        h.redirect.resolve("brief", &ctx).await,
        redirect_to("https://brief.example")
    );
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(h.redirect.resolve("brief", &ctx).await, Resolution::NotFound);
    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_deactivate_is_immediately_visible() {
    let h = harness(tiered());
    h.links
        .create_link(CreateLinkRequest::new("https://promo.example").with_alias("promo"))
        .await
        .unwrap();
    let ctx = RequestContext::new();

    // 预热缓存后停用
    assert_eq!(
        h.redirect.resolve("promo", &ctx).await,
        redirect_to("https://promo.example")
    );
    h.links.deactivate_link("promo").await.unwrap();
    assert_eq!(h.redirect.resolve("promo", &ctx).await, Resolution::NotFound);
    assert_eq!(h.redirect.resolve("promo", &ctx).await, Resolution::NotFound);

    h.pipeline.shutdown().await;
}

#[tokio::test]
async fn test_cache_cold_and_hot_agree() {
    let cold = harness(Arc::new(NullLinkCache));
    let hot = harness(tiered());
    let now = Utc::now();

    for h in [&cold, &hot] {
        h.links
            .create_link(CreateLinkRequest::new("https://live.example").with_alias("live"))
            .await
            .unwrap();
        h.links
            .create_link(
                CreateLinkRequest::new("https://exp.example")
                    .with_alias("exp")
                    .with_expiry(now + ChronoDuration::minutes(10)),
            )
            .await
            .unwrap();
        h.links
            .create_link(CreateLinkRequest::new("https://off.example").with_alias("off"))
            .await
            .unwrap();
        h.links.deactivate_link("off").await.unwrap();
    }

    let ctx = RequestContext::new();
    let lookups = [
        ("live", now),
        ("exp", now),
        ("exp", now + ChronoDuration::minutes(20)),
        ("off", now),
        ("missing", now),
    ];
    // 连续两轮：热缓存第二轮走缓存
    for _ in 0..2 {
        for (code, at) in lookups {
            assert_eq!(
                cold.redirect.resolve_at(code, &ctx, at).await,
                hot.redirect.resolve_at(code, &ctx, at).await,
                "code {} at {}",
                code,
                at
            );
        }
    }

    cold.pipeline.shutdown().await;
    hot.pipeline.shutdown().await;
    assert_eq!(cold.sink.outcomes(), hot.sink.outcomes());
}

#[tokio::test]
async fn test_exactly_one_event_per_resolve() {
    let h = harness(tiered());
    h.links
        .create_link(CreateLinkRequest::new("https://a.example").with_alias("one"))
        .await
        .unwrap();
    let ctx = RequestContext::new();

    for i in 0..100 {
        let code = if i % 3 == 0 { "one" } else { "other" };
        h.redirect.resolve(code, &ctx).await;
    }
    let stats = h.pipeline.stats();
    assert_eq!(stats.enqueued + stats.dropped, 100);

    h.pipeline.shutdown().await;
    assert_eq!(h.sink.events.lock().len(), 100);
}

#[tokio::test]
async fn test_saturated_pipeline_does_not_block_redirects() {
    let store = Arc::new(MemoryStorage::new());
    let cache = tiered();
    let links = LinkService::new(store.clone(), Arc::clone(&cache), generator());
    links
        .create_link(CreateLinkRequest::new("https://a.example").with_alias("hot"))
        .await
        .unwrap();

    let pipeline = Arc::new(ClickPipeline::start(
        settings(1, 1),
        Arc::new(BlockedSink),
        Arc::new(LogDeadLetter),
    ));
    let redirect = RedirectService::new(
        store,
        cache,
        Arc::clone(&pipeline),
        generator(),
        Arc::new(EventIdGenerator::new(0)),
    );
    let ctx = RequestContext::new();

    let started = std::time::Instant::now();
    for _ in 0..1000 {
        assert_eq!(
            redirect.resolve("hot", &ctx).await,
            redirect_to("https://a.example")
        );
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    let stats = pipeline.stats();
    assert_eq!(stats.enqueued + stats.dropped, 1000);
    assert!(stats.dropped > 900, "dropped {}", stats.dropped);
}

#[tokio::test]
async fn test_store_failure_degrades_to_not_found() {
    let store = Arc::new(FailingStore {
        gets: AtomicU32::new(0),
    });
    let sink = CollectingSink::new();
    let pipeline = Arc::new(ClickPipeline::start(
        settings(64, 1),
        sink.clone(),
        Arc::new(LogDeadLetter),
    ));
    let redirect = RedirectService::new(
        store.clone(),
        tiered(),
        Arc::clone(&pipeline),
        generator(),
        Arc::new(EventIdGenerator::new(0)),
    );
    let ctx = RequestContext::new();

    assert_eq!(redirect.resolve("abc123", &ctx).await, Resolution::NotFound);
    // 失败不写墓碑，下一次仍回源
    assert_eq!(redirect.resolve("abc123", &ctx).await, Resolution::NotFound);
    assert_eq!(store.gets.load(Ordering::SeqCst), 2);

    pipeline.shutdown().await;
    assert_eq!(sink.outcomes(), vec![ClickOutcome::NotFound; 2]);
}

#[tokio::test]
async fn test_policy_block_is_recorded() {
    let h = harness(tiered());
    h.links
        .create_link(CreateLinkRequest::new("https://a.example").with_alias("limited"))
        .await
        .unwrap();
    let one = NonZeroU32::new(1).unwrap();
    let redirect = RedirectService::new(
        h.store.clone(),
        Arc::clone(&h.cache),
        Arc::clone(&h.pipeline),
        generator(),
        Arc::new(EventIdGenerator::new(2)),
    )
    .with_policy(Arc::new(PerLinkRateLimit::new(one, one)));
    let ctx = RequestContext::new();

    assert_eq!(
        redirect.resolve("limited", &ctx).await,
        redirect_to("https://a.example")
    );
    assert_eq!(redirect.resolve("limited", &ctx).await, Resolution::NotFound);

    h.pipeline.shutdown().await;
    assert_eq!(
        h.sink.outcomes(),
        vec![ClickOutcome::Resolved, ClickOutcome::Blocked]
    );
}

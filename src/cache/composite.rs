//! 分层链接缓存：正向对象缓存 + 墓碑负缓存 + 驱逐标记
//!
//! 驱逐标记用于关闭如下竞态：解析请求在停用之前从存储读到旧记录，
//! 停用完成并驱逐缓存后，该请求才回填，把旧记录重新写回缓存。
//! 每次驱逐都会记录时间戳；回源读取开始时间不晚于最近一次驱逐的回填会被丢弃。
//! 标记只按 TTL 过期，不设容量上限：容量淘汰会在守护窗口内丢掉标记，让竞态重新出现。
//! 内存占用上限为守护窗口内的驱逐次数。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, trace};

use super::negative_cache::moka::MokaNegativeCache;
use super::object_cache::moka::MokaObjectCache;
use super::{CacheLookup, CacheStats, LinkCache, NegativeCache, ObjectCache, TombstoneKind};
use crate::config::CacheConfig;
use crate::storage::Link;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    tombstone_hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

pub struct TieredLinkCache {
    objects: Arc<dyn ObjectCache>,
    tombstones: Arc<dyn NegativeCache>,
    /// code -> 最近一次驱逐时间
    evictions: moka::sync::Cache<String, Instant>,
    counters: Counters,
}

impl TieredLinkCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_layers(
            Arc::new(MokaObjectCache::new(
                config.max_capacity,
                config.default_ttl(),
            )),
            Arc::new(MokaNegativeCache::new(
                config.negative_max_capacity,
                config.negative_ttl(),
            )),
            config.eviction_guard(),
        )
    }

    pub fn with_layers(
        objects: Arc<dyn ObjectCache>,
        tombstones: Arc<dyn NegativeCache>,
        eviction_guard: Duration,
    ) -> Self {
        Self {
            objects,
            tombstones,
            evictions: moka::sync::Cache::builder()
                .time_to_live(eviction_guard)
                .build(),
            counters: Counters::default(),
        }
    }

    /// 回源读取是否早于最近一次驱逐
    fn is_stale(&self, code: &str, fetched_at: Instant) -> bool {
        self.evictions
            .get(code)
            .is_some_and(|evicted_at| fetched_at <= evicted_at)
    }

    fn discard(&self, code: &str) {
        self.counters.discarded.fetch_add(1, Ordering::Relaxed);
        debug!("Discarding stale cache populate for code: {}", code);
    }
}

#[async_trait]
impl LinkCache for TieredLinkCache {
    async fn lookup(&self, code: &str) -> CacheLookup {
        if let Some(kind) = self.tombstones.get(code).await {
            self.counters.tombstone_hits.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::Tombstone(kind);
        }
        match self.objects.get(code).await {
            Some(link) => {
                trace!("Cache hit for code: {}", code);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Hit(link)
            }
            None => {
                trace!("Cache miss for code: {}", code);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
        }
    }

    async fn populate(&self, link: Link, fetched_at: Instant) {
        let code = link.short_code.clone();
        // 已过期或已停用的链接不做正向缓存
        if !link.is_live_at(Utc::now()) {
            return;
        }
        if self.is_stale(&code, fetched_at) {
            self.discard(&code);
            return;
        }
        self.objects.insert(link).await;
        // 插入期间发生驱逐时撤回刚写入的值
        if self.is_stale(&code, fetched_at) {
            self.objects.remove(&code).await;
            self.discard(&code);
        }
    }

    async fn populate_tombstone(&self, code: &str, kind: TombstoneKind, fetched_at: Instant) {
        if self.is_stale(code, fetched_at) {
            self.discard(code);
            return;
        }
        self.tombstones.mark(code, kind).await;
        if self.is_stale(code, fetched_at) {
            self.tombstones.remove(code).await;
            self.discard(code);
        }
    }

    async fn evict(&self, code: &str) {
        // 先记标记再删除，保证与回填的任意交错下都不会留下旧值
        self.evictions.insert(code.to_string(), Instant::now());
        self.objects.remove(code).await;
        self.tombstones.remove(code).await;
        trace!("Evicted code from cache: {}", code);
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            tombstone_hits: self.counters.tombstone_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            discarded_populates: self.counters.discarded.load(Ordering::Relaxed),
        }
    }
}

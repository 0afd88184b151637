use std::time::Instant;

use async_trait::async_trait;

use super::{CacheLookup, LinkCache, TombstoneKind};
use crate::storage::Link;

/// 禁用缓存：每次查询都回源
pub struct NullLinkCache;

#[async_trait]
impl LinkCache for NullLinkCache {
    async fn lookup(&self, _code: &str) -> CacheLookup {
        CacheLookup::Miss
    }

    async fn populate(&self, _link: Link, _fetched_at: Instant) {}

    async fn populate_tombstone(&self, _code: &str, _kind: TombstoneKind, _fetched_at: Instant) {}

    async fn evict(&self, _code: &str) {}
}

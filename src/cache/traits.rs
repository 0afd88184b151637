use std::time::Instant;

use async_trait::async_trait;

use crate::storage::{ClickOutcome, Link};

/// 墓碑记录的无法跳转原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TombstoneKind {
    /// 不存在或已停用
    Missing,
    /// 已过期（无论是否已被清扫停用）
    Expired,
}

impl TombstoneKind {
    pub fn outcome(self) -> ClickOutcome {
        match self {
            Self::Missing => ClickOutcome::NotFound,
            Self::Expired => ClickOutcome::Expired,
        }
    }
}

/// 缓存查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// 命中缓存的链接
    Hit(Link),
    /// 墓碑：短时间内确认过无法跳转
    Tombstone(TombstoneKind),
    /// 未缓存，需要回源
    Miss,
}

/// 缓存计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub tombstone_hits: u64,
    pub misses: u64,
    /// 被驱逐标记拦截的过期回填
    pub discarded_populates: u64,
}

/// 重定向热路径使用的读穿缓存
///
/// 回填时必须带上回源读取开始的时间，缓存据此丢弃驱逐之前读到的旧数据。
#[async_trait]
pub trait LinkCache: Send + Sync {
    async fn lookup(&self, code: &str) -> CacheLookup;

    /// 回填链接；`fetched_at` 为回源读取开始的时间
    async fn populate(&self, link: Link, fetched_at: Instant);

    /// 回填墓碑
    async fn populate_tombstone(&self, code: &str, kind: TombstoneKind, fetched_at: Instant);

    /// 同步驱逐正向缓存与墓碑
    async fn evict(&self, code: &str);

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// 正向对象缓存
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Link>;
    async fn insert(&self, value: Link);
    async fn remove(&self, key: &str);
}

/// 负缓存（墓碑）
#[async_trait]
pub trait NegativeCache: Send + Sync {
    async fn get(&self, code: &str) -> Option<TombstoneKind>;
    async fn mark(&self, code: &str, kind: TombstoneKind);
    async fn remove(&self, code: &str);
}

//! 墓碑缓存
//!
//! 短码 -> 无法跳转的原因。条目在 `ttl` 后自然失效，
//! 链接被创建、编辑或停用时由上层显式删除。

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::trace;

use crate::cache::{NegativeCache, TombstoneKind};

pub struct MokaNegativeCache {
    tombstones: Cache<String, TombstoneKind>,
}

impl MokaNegativeCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        trace!(
            "Tombstone cache: capacity {}, ttl {:?}",
            max_capacity, ttl
        );
        Self {
            tombstones: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl NegativeCache for MokaNegativeCache {
    async fn get(&self, code: &str) -> Option<TombstoneKind> {
        self.tombstones.get(code).await
    }

    async fn mark(&self, code: &str, kind: TombstoneKind) {
        trace!("Tombstone {:?} for code {}", kind, code);
        self.tombstones.insert(code.to_string(), kind).await;
    }

    async fn remove(&self, code: &str) {
        self.tombstones.invalidate(code).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ClickOutcome;

    #[tokio::test]
    async fn test_kind_is_kept_per_code() {
        let tombstones = MokaNegativeCache::new(64, Duration::from_secs(60));
        tombstones.mark("gone", TombstoneKind::Missing).await;
        tombstones.mark("old", TombstoneKind::Expired).await;

        assert_eq!(tombstones.get("gone").await, Some(TombstoneKind::Missing));
        assert_eq!(tombstones.get("old").await, Some(TombstoneKind::Expired));
        assert_eq!(tombstones.get("never").await, None);

        assert_eq!(
            TombstoneKind::Expired.outcome(),
            ClickOutcome::Expired
        );
        assert_eq!(
            TombstoneKind::Missing.outcome(),
            ClickOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_later_mark_replaces_kind() {
        let tombstones = MokaNegativeCache::new(64, Duration::from_secs(60));
        tombstones.mark("promo", TombstoneKind::Missing).await;
        tombstones.mark("promo", TombstoneKind::Expired).await;
        assert_eq!(tombstones.get("promo").await, Some(TombstoneKind::Expired));

        tombstones.remove("promo").await;
        assert_eq!(tombstones.get("promo").await, None);
    }

    #[tokio::test]
    async fn test_tombstones_lapse_after_ttl() {
        let tombstones = MokaNegativeCache::new(64, Duration::from_millis(100));
        tombstones.mark("brief", TombstoneKind::Missing).await;
        assert!(tombstones.get("brief").await.is_some());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(tombstones.get("brief").await, None);
    }
}

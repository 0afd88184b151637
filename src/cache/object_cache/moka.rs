use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::policy::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::ObjectCache;
use crate::storage::Link;

/// 过期策略：TTL = min(默认 TTL, 距 expires_at 的剩余时间)
///
/// 缓存的链接永远不会比自身的 expires_at 活得更久。
struct LinkExpiry {
    default_ttl: Duration,
}

impl LinkExpiry {
    fn ttl_for(&self, link: &Link, now: DateTime<Utc>) -> Duration {
        match link.expires_at {
            Some(expires_at) => (expires_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.default_ttl),
            None => self.default_ttl,
        }
    }
}

impl Expiry<String, Link> for LinkExpiry {
    fn expire_after_create(&self, _key: &String, value: &Link, _created_at: Instant) -> Option<Duration> {
        Some(self.ttl_for(value, Utc::now()))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Link,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl_for(value, Utc::now()))
    }
}

pub struct MokaObjectCache {
    inner: Cache<String, Link>,
}

impl MokaObjectCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(LinkExpiry { default_ttl })
            .build();

        debug!(
            "MokaObjectCache initialized with max capacity: {}, default TTL: {:?}",
            max_capacity, default_ttl
        );
        Self { inner }
    }
}

#[async_trait]
impl ObjectCache for MokaObjectCache {
    async fn get(&self, key: &str) -> Option<Link> {
        self.inner.get(key).await
    }

    async fn insert(&self, value: Link) {
        self.inner.insert(value.short_code.clone(), value).await;
    }

    async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

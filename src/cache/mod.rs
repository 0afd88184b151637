use std::sync::Arc;

use crate::config::CacheConfig;

pub mod composite;
pub mod negative_cache;
pub mod null;
pub mod object_cache;
pub mod traits;

pub use composite::TieredLinkCache;
pub use null::NullLinkCache;
pub use traits::{CacheLookup, CacheStats, LinkCache, NegativeCache, ObjectCache, TombstoneKind};

/// 按配置构建链接缓存，禁用时返回 NullLinkCache
pub fn build_link_cache(config: &CacheConfig) -> Arc<dyn LinkCache> {
    if config.enabled {
        Arc::new(TieredLinkCache::new(config))
    } else {
        tracing::info!("Link cache disabled, every lookup goes to storage");
        Arc::new(NullLinkCache)
    }
}

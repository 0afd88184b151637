use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod memory;
pub mod models;
pub mod traits;

pub use backend::SeaOrmStorage;
pub use memory::MemoryStorage;
pub use models::{
    ClickEvent, ClickOutcome, DateRange, Dimension, Link, LinkUpdate, MALFORMED_CODE,
    MAX_SHORT_CODE_LEN, RecordOutcome, Rollup, RollupCount, RollupKey,
};
pub use traits::{ClickEventStore, LinkStore};

/// 选择 `memory://` 时使用进程内存储
pub const MEMORY_URL: &str = "memory://";

/// 同一个存储实例的两个视角：链接存储与事件存储
#[derive(Clone)]
pub struct StorageHandles {
    pub links: Arc<dyn LinkStore>,
    pub events: Arc<dyn ClickEventStore>,
    pub backend_name: String,
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &DatabaseConfig) -> Result<StorageHandles> {
        if config.database_url == MEMORY_URL {
            let storage = Arc::new(MemoryStorage::new());
            tracing::warn!("Using in-process memory storage, data is lost on exit");
            return Ok(StorageHandles {
                links: storage.clone(),
                events: storage,
                backend_name: "memory".to_string(),
            });
        }

        let storage = Arc::new(SeaOrmStorage::new(config).await?);
        Ok(StorageHandles {
            backend_name: storage.backend_name().to_string(),
            links: storage.clone(),
            events: storage,
        })
    }
}

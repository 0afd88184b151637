use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::analytics::{
    ClickPipeline, DataRetentionTask, DeadLetter, FileDeadLetter, LogDeadLetter,
    PipelineSettings, RollupAggregator,
};
use crate::cache::{self, LinkCache};
use crate::config::StaticConfig;
use crate::services::{AnalyticsService, CodeGenerator, LinkService, RedirectService};
use crate::storage::{ClickEventStore, LinkStore, StorageFactory};
use crate::utils::EventIdGenerator;

/// 组装完成的应用上下文
pub struct AppContext {
    pub links: Arc<dyn LinkStore>,
    pub events: Arc<dyn ClickEventStore>,
    pub backend_name: String,
    pub cache: Arc<dyn LinkCache>,
    pub pipeline: Arc<ClickPipeline>,
    pub aggregator: Arc<RollupAggregator>,
    pub link_service: Arc<LinkService>,
    pub redirect_service: Arc<RedirectService>,
    pub analytics_service: Arc<AnalyticsService>,
    background: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    /// 按配置组装存储、缓存、管线和各服务，并启动管线 worker
    ///
    /// 需要在 tokio 运行时内调用；周期任务由 `start_background_tasks` 单独启动。
    pub async fn build(config: &StaticConfig) -> Result<Self> {
        let start_time = std::time::Instant::now();

        let generator =
            CodeGenerator::new(&config.codes).context("Invalid short code configuration")?;

        let storage = StorageFactory::create(&config.database)
            .await
            .context("Failed to create storage backend")?;
        info!("Using storage backend: {}", storage.backend_name);

        let cache = cache::build_link_cache(&config.cache);

        let aggregator = Arc::new(RollupAggregator::new(
            Arc::clone(&storage.events),
            Arc::clone(&storage.links),
            config.analytics.rebuild_page_size,
        ));

        let dead_letter: Arc<dyn DeadLetter> = match &config.pipeline.dead_letter_path {
            Some(path) => Arc::new(FileDeadLetter::new(path)),
            None => Arc::new(LogDeadLetter),
        };
        let pipeline = Arc::new(ClickPipeline::start(
            PipelineSettings::from(&config.pipeline),
            aggregator.clone(),
            dead_letter,
        ));

        let ids = Arc::new(EventIdGenerator::new(config.pipeline.node_id));

        let link_service = Arc::new(LinkService::new(
            Arc::clone(&storage.links),
            Arc::clone(&cache),
            generator.clone(),
        ));
        let redirect_service = Arc::new(RedirectService::new(
            Arc::clone(&storage.links),
            Arc::clone(&cache),
            Arc::clone(&pipeline),
            generator,
            ids,
        ));
        let analytics_service = Arc::new(AnalyticsService::new(Arc::clone(&aggregator)));

        debug!("Application context assembled in {:?}", start_time.elapsed());

        Ok(Self {
            links: storage.links,
            events: storage.events,
            backend_name: storage.backend_name,
            cache,
            pipeline,
            aggregator,
            link_service,
            redirect_service,
            analytics_service,
            background: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// 启动过期扫描与数据清理两个周期任务
    pub fn start_background_tasks(&self, config: &StaticConfig) {
        let analytics = &config.analytics;

        let sweep = Arc::clone(&self.link_service)
            .spawn_sweep_task(Duration::from_secs(analytics.expiry_sweep_interval_secs));

        let retention = Arc::new(DataRetentionTask::new(Arc::clone(&self.events), analytics))
            .spawn_background_task(Duration::from_secs(analytics.retention_interval_secs));

        self.background.lock().extend([sweep, retention]);
    }

    /// 停止周期任务并排空点击管线
    pub async fn shutdown(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.background.lock());
        for handle in handles {
            handle.abort();
        }
        self.pipeline.shutdown().await;
    }
}

//! 数据清理任务
//!
//! 负责清理过期的原始点击事件和汇总数据，防止存储无限增长。
//! 两类数据都按 UTC 整日截断：某一天的事件要么全部保留，要么全部删除，
//! 留存日志中最早的一天因此总是完整的，可以安全地重建该日起的汇总。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::AnalyticsConfig;
use crate::errors::Result;
use crate::storage::ClickEventStore;

/// 清理报告
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// 删除的原始点击事件数量
    pub events_deleted: u64,
    /// 删除的汇总行数量
    pub rollups_deleted: u64,
}

/// 保留期内最早的 UTC 日期，早于该日的数据会被清理
fn cutoff_day(now: DateTime<Utc>, retention_days: u64) -> NaiveDate {
    (now - Duration::days(retention_days as i64)).date_naive()
}

/// 数据清理任务
pub struct DataRetentionTask {
    events: Arc<dyn ClickEventStore>,
    /// 原始点击事件保留天数
    event_retention_days: u64,
    /// 汇总保留天数
    rollup_retention_days: u64,
}

impl DataRetentionTask {
    pub fn new(events: Arc<dyn ClickEventStore>, config: &AnalyticsConfig) -> Self {
        Self {
            events,
            event_retention_days: config.event_retention_days,
            rollup_retention_days: config.rollup_retention_days,
        }
    }

    /// 运行一次清理，`now` 之前超过保留期的数据会被删除
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        let event_cutoff = cutoff_day(now, self.event_retention_days)
            .and_time(NaiveTime::MIN)
            .and_utc();
        match self.events.purge_events_before(event_cutoff).await {
            Ok(deleted) => report.events_deleted = deleted,
            Err(e) => error!("Failed to clean up raw click events: {}", e),
        }

        let rollup_cutoff = cutoff_day(now, self.rollup_retention_days);
        report.rollups_deleted = self.events.purge_rollups_before(rollup_cutoff).await?;

        info!(
            "Data cleanup completed: {} raw events, {} rollup rows",
            report.events_deleted, report.rollups_deleted
        );
        Ok(report)
    }

    /// 启动后台清理任务，每隔 `interval` 运行一次
    pub fn spawn_background_task(self: Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        info!("Data cleanup background task started (interval: {:?})", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(StdDuration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即返回，跳过以免启动时就清理
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cleanup(Utc::now()).await {
                    error!("Data cleanup task failed: {}", e);
                }
            }
        })
    }
}

//! Analytics query service

use std::sync::Arc;

use tracing::debug;

use crate::analytics::{RebuildReport, RollupAggregator};
use crate::errors::{LinkpulseError, Result};
use crate::storage::{DateRange, Dimension, Rollup};

pub struct AnalyticsService {
    aggregator: Arc<RollupAggregator>,
}

impl AnalyticsService {
    pub fn new(aggregator: Arc<RollupAggregator>) -> Self {
        Self { aggregator }
    }

    /// 查询某短码在闭区间日期内某一维度的按日汇总，无事件的日期不出现
    pub async fn get_analytics(
        &self,
        code: &str,
        range: DateRange,
        dimension: Dimension,
    ) -> Result<Vec<Rollup>> {
        if range.start > range.end {
            return Err(LinkpulseError::validation(format!(
                "Date range start {} is after end {}",
                range.start, range.end
            )));
        }
        let rollups = self.aggregator.query(code, range, dimension).await?;
        debug!(
            "Analytics for {} ({} .. {}, {}): {} days",
            code,
            range.start,
            range.end,
            dimension,
            rollups.len()
        );
        Ok(rollups)
    }

    /// 从事件日志重建全部汇总
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        self.aggregator.rebuild().await
    }
}

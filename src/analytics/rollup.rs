//! 点击统计汇总
//!
//! 汇总键为 `(short_code, day, dimension, value)`，值为计数。
//! 汇总是原始事件的交换律求和。事件日志按保留期整日清理，
//! 汇总保留得更久，所以重建只覆盖日志仍完整的日期窗口：
//! 从最早的留存事件当天起清空并重放，更早的汇总原样保留。

use std::collections::BTreeMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::sink::EventSink;
use crate::errors::Result;
use crate::storage::{
    ClickEvent, ClickEventStore, ClickOutcome, DateRange, Dimension, LinkStore, RecordOutcome,
    Rollup, RollupCount, RollupKey,
};

/// 将一批事件聚合为汇总增量（每个事件在每个维度上各计 1）
pub fn aggregate_events(events: &[ClickEvent]) -> Vec<RollupCount> {
    let mut acc: BTreeMap<RollupKey, u64> = BTreeMap::new();
    for event in events {
        let bucket = event.bucket();
        for dimension in Dimension::iter() {
            let key = RollupKey {
                short_code: event.short_code.clone(),
                bucket,
                dimension,
                value: event.dimension_value(dimension),
            };
            *acc.entry(key).or_insert(0) += 1;
        }
    }
    acc.into_iter()
        .map(|(key, count)| RollupCount { key, count })
        .collect()
}

/// 统计 outcome = resolved 的事件数（按短码）
pub fn resolved_counts(events: &[ClickEvent]) -> Vec<(String, u64)> {
    let mut acc: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events
        .iter()
        .filter(|e| e.outcome == ClickOutcome::Resolved)
    {
        *acc.entry(event.short_code.as_str()).or_insert(0) += 1;
    }
    acc.into_iter()
        .map(|(code, n)| (code.to_string(), n))
        .collect()
}

/// 把扁平汇总行按日分组，结果按日期升序
pub fn group_rollups(rows: Vec<RollupCount>) -> Vec<Rollup> {
    let mut grouped: BTreeMap<(chrono::NaiveDate, String, Dimension), BTreeMap<String, u64>> =
        BTreeMap::new();
    for row in rows {
        if row.count == 0 {
            continue;
        }
        let RollupKey {
            short_code,
            bucket,
            dimension,
            value,
        } = row.key;
        *grouped
            .entry((bucket, short_code, dimension))
            .or_default()
            .entry(value)
            .or_insert(0) += row.count;
    }

    grouped
        .into_iter()
        .map(|((bucket, short_code, dimension), counts)| Rollup {
            total: counts.values().sum(),
            short_code,
            bucket,
            dimension,
            counts,
        })
        .collect()
}

/// 重建报告
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    /// 重建窗口的起始日期，日志为空时为 None（不触碰任何汇总）
    pub window_start: Option<chrono::NaiveDate>,
    pub events_scanned: u64,
    pub pages: u64,
    pub rollup_rows: u64,
    pub links_reconciled: u64,
}

/// 汇总聚合器
///
/// 摄取与重建互斥：摄取持有读锁，重建持有写锁，
/// 避免重建清空汇总后又被并发摄取重复累加。
pub struct RollupAggregator {
    events: Arc<dyn ClickEventStore>,
    links: Arc<dyn LinkStore>,
    page_size: u64,
    rebuild_lock: RwLock<()>,
}

impl RollupAggregator {
    pub fn new(
        events: Arc<dyn ClickEventStore>,
        links: Arc<dyn LinkStore>,
        page_size: u64,
    ) -> Self {
        Self {
            events,
            links,
            page_size: page_size.max(1),
            rebuild_lock: RwLock::new(()),
        }
    }

    /// 摄取一批事件：写日志 + 累加汇总（同一事务），随后尽力累加 click_count
    pub async fn ingest(&self, events: &[ClickEvent]) -> Result<RecordOutcome> {
        if events.is_empty() {
            return Ok(RecordOutcome::default());
        }

        let _guard = self.rebuild_lock.read().await;
        let outcome = self.events.record_batch(events).await?;

        if outcome.duplicates > 0 {
            debug!(
                "Skipped {} already recorded events out of {}",
                outcome.duplicates,
                events.len()
            );
        }

        if !outcome.resolved_per_code.is_empty()
            && let Err(e) = self.links.add_clicks(&outcome.resolved_per_code).await
        {
            // click_count 是冗余字段，下次重建时校正
            warn!("Failed to bump click counts: {}", e);
        }

        Ok(outcome)
    }

    /// 重建最早留存事件当天及之后的汇总，然后按全部汇总校正 click_count
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let _guard = self.rebuild_lock.write().await;
        let mut report = RebuildReport::default();

        report.window_start = self.events.earliest_event_day().await?;
        match report.window_start {
            Some(from) => {
                let cleared = self.events.clear_rollups_from(from).await?;
                debug!("Rebuilding rollups from {} ({} rows cleared)", from, cleared);
                self.replay(&mut report).await?;
            }
            None => info!("Event log is empty, keeping existing rollups"),
        }

        let totals = self
            .events
            .totals_by_code(Dimension::Outcome, ClickOutcome::Resolved.as_ref())
            .await?;
        for (code, total) in totals {
            self.links.set_click_count(&code, total).await?;
            report.links_reconciled += 1;
        }

        info!(
            "Rollup rebuild completed: {} events in {} pages, {} links reconciled",
            report.events_scanned, report.pages, report.links_reconciled
        );
        Ok(report)
    }

    /// 按 event_id 分页流式重放整个事件日志
    async fn replay(&self, report: &mut RebuildReport) -> Result<()> {
        let mut cursor = None;
        loop {
            let page = self.events.events_after(cursor, self.page_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.event_id);

            let deltas = aggregate_events(&page);
            report.rollup_rows += deltas.len() as u64;
            self.events.apply_rollups(&deltas).await?;

            report.events_scanned += page.len() as u64;
            report.pages += 1;
            debug!(
                "Rebuild page {}: {} events (cursor {:?})",
                report.pages,
                page.len(),
                cursor
            );

            if (page.len() as u64) < self.page_size {
                break;
            }
        }
        Ok(())
    }

    /// 点查询：短码 + 闭区间日期 + 维度，无事件的日期不出现在结果中
    pub async fn query(
        &self,
        code: &str,
        range: DateRange,
        dimension: Dimension,
    ) -> Result<Vec<Rollup>> {
        let rows = self.events.query_rollups(code, range, dimension).await?;
        Ok(group_rollups(rows))
    }
}

#[async_trait::async_trait]
impl EventSink for RollupAggregator {
    async fn write_batch(&self, events: &[ClickEvent]) -> anyhow::Result<()> {
        self.ingest(events).await?;
        Ok(())
    }
}

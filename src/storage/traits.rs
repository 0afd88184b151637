use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::models::{
    ClickEvent, DateRange, Dimension, Link, LinkUpdate, RecordOutcome, RollupCount,
};
use crate::errors::Result;

/// 链接存储
///
/// 唯一约束是短码唯一性的唯一权威来源：并发创建同一短码时恰好一个成功，
/// 其余返回 `AliasTaken`。
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// 原子地插入新链接（校验 URL 与过期时间）
    async fn create(&self, link: Link) -> Result<Link>;

    async fn get(&self, code: &str) -> Result<Option<Link>>;

    /// 编辑目标 URL / 过期时间，链接不存在时返回 `NotFound`
    async fn update(&self, code: &str, update: LinkUpdate) -> Result<Link>;

    /// 停用链接（幂等），链接不存在时返回 `NotFound`
    async fn deactivate(&self, code: &str) -> Result<()>;

    /// 尽力而为的单次计数
    async fn increment_click(&self, code: &str) -> Result<()> {
        self.add_clicks(&[(code.to_string(), 1)]).await
    }

    /// 批量累加点击数，不存在的短码忽略
    async fn add_clicks(&self, deltas: &[(String, u64)]) -> Result<()>;

    /// 用汇总数据校正点击数
    async fn set_click_count(&self, code: &str, count: u64) -> Result<()>;

    /// 停用所有已过期但仍启用的链接，返回被停用的短码
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    async fn count(&self) -> Result<u64>;
}

/// 点击事件日志 + 汇总表
///
/// 事件以 `event_id` 为键；`record_batch` 在同一事务内只写入未见过的事件，
/// 并且只为这些事件累加汇总，因此重放同一批次不产生任何变化。
#[async_trait]
pub trait ClickEventStore: Send + Sync {
    async fn record_batch(&self, events: &[ClickEvent]) -> Result<RecordOutcome>;

    /// 按 event_id 升序分页读取事件日志
    async fn events_after(&self, after_id: Option<i64>, limit: u64) -> Result<Vec<ClickEvent>>;

    async fn event_count(&self) -> Result<u64>;

    /// 日志中最早事件所在的 UTC 日期，日志为空时为 None
    async fn earliest_event_day(&self) -> Result<Option<NaiveDate>>;

    /// 累加汇总增量（重建时使用）
    async fn apply_rollups(&self, deltas: &[RollupCount]) -> Result<()>;

    /// 删除 `from` 当天及之后的汇总，更早的汇总保留
    async fn clear_rollups_from(&self, from: NaiveDate) -> Result<u64>;

    async fn query_rollups(
        &self,
        code: &str,
        range: DateRange,
        dimension: Dimension,
    ) -> Result<Vec<RollupCount>>;

    /// 按短码汇总某一维度值的总数（用于校正 click_count）
    async fn totals_by_code(&self, dimension: Dimension, value: &str) -> Result<Vec<(String, u64)>>;

    /// 删除早于 `before` 的原始事件
    async fn purge_events_before(&self, before: DateTime<Utc>) -> Result<u64>;

    /// 删除早于 `before` 的汇总
    async fn purge_rollups_before(&self, before: NaiveDate) -> Result<u64>;
}

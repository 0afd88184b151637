use crate::storage::ClickEvent;

/// 点击事件批量写入目标
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// 写入一批事件；必须可重放（重复写入同一批不产生额外效果）
    async fn write_batch(&self, events: &[ClickEvent]) -> anyhow::Result<()>;
}

/// 死信：重试耗尽后无法写入的批次
#[async_trait::async_trait]
pub trait DeadLetter: Send + Sync {
    async fn dead_letter(&self, events: &[ClickEvent], reason: &str) -> anyhow::Result<()>;
}

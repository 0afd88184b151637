//! 点击事件摄取管线
//!
//! 重定向路径只做一次非阻塞的 `try_send`：
//! - 有界队列满时直接丢弃事件并计数，重定向永远不会被分析拖慢
//! - N 个 worker 共享同一个接收端，一次只有一个 worker 收集批次，其余 worker 并行写入
//! - 攒够 `batch_size` 条或距批次首条事件超过 `flush_interval` 即刷盘
//! - 写入失败按指数退避重试，超过上限后交给死信并丢弃

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::sink::{DeadLetter, EventSink};
use crate::config::PipelineConfig;
use crate::storage::ClickEvent;
use crate::utils::RetryConfig;

/// 管线运行参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub workers: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval(),
            workers: config.workers,
            retry: RetryConfig {
                max_retries: config.retry_count,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    lost: AtomicU64,
    batches: AtomicU64,
}

/// 管线计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub written: u64,
    pub retried: u64,
    /// 成功交给死信的事件数
    pub dead_lettered: u64,
    /// 死信也写入失败、彻底丢失的事件数
    pub lost: u64,
    pub batches: u64,
    /// 当前排队中的事件数
    pub queued: usize,
}

/// worker 共享的状态
struct Shared {
    settings: PipelineSettings,
    sink: Arc<dyn EventSink>,
    dead_letter: Arc<dyn DeadLetter>,
    counters: Arc<Counters>,
}

/// 点击事件摄取管线
pub struct ClickPipeline {
    tx: mpsc::Sender<ClickEvent>,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ClickPipeline {
    /// 创建队列并启动 worker（需要在 tokio 运行时内调用）
    pub fn start(
        settings: PipelineSettings,
        sink: Arc<dyn EventSink>,
        dead_letter: Arc<dyn DeadLetter>,
    ) -> Self {
        let mut settings = settings;
        settings.queue_capacity = settings.queue_capacity.max(1);
        settings.batch_size = settings.batch_size.max(1);
        settings.workers = settings.workers.max(1);

        let (tx, rx) = mpsc::channel(settings.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());
        let worker_count = settings.workers;

        info!(
            "Click pipeline started: {} workers, queue capacity {}, batch size {}, flush interval {:?}",
            worker_count, settings.queue_capacity, settings.batch_size, settings.flush_interval
        );

        let shared = Arc::new(Shared {
            settings,
            sink,
            dead_letter,
            counters: Arc::clone(&counters),
        });
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..worker_count)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&shared),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Self {
            tx,
            counters,
            shutdown_tx,
            workers: parking_lot::Mutex::new(workers),
        }
    }

    /// 非阻塞入队；队列已满或已关闭时丢弃事件并返回 false
    pub fn enqueue(&self, event: ClickEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                trace!("Click queue full, dropped event {}", event.event_id);
                if dropped == 1 || dropped.is_multiple_of(1000) {
                    warn!("Click queue full, {} events dropped so far", dropped);
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Click pipeline is shut down, dropped event {}",
                    event.event_id
                );
                false
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            written: c.written.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
            lost: c.lost.load(Ordering::Relaxed),
            batches: c.batches.load(Ordering::Relaxed),
            queued: self.tx.max_capacity() - self.tx.capacity(),
        }
    }

    /// 通知 worker 停止：关闭队列、刷出已缓冲的事件后退出
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Click pipeline worker panicked: {}", e);
            }
        }
        let stats = self.stats();
        info!(
            "Click pipeline stopped: enqueued={}, written={}, dropped={}, dead_lettered={}, lost={}",
            stats.enqueued, stats.written, stats.dropped, stats.dead_lettered, stats.lost
        );
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<ClickEvent>>>,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("Click pipeline worker {} started", id);
    loop {
        let (batch, closing) = collect_batch(&rx, &shared.settings, &mut shutdown).await;
        if !batch.is_empty() {
            shared.flush(id, batch).await;
        }
        if closing {
            break;
        }
    }
    debug!("Click pipeline worker {} exited", id);
}

/// 收集一个批次；返回值第二项为 true 表示队列已关闭且排空
async fn collect_batch(
    rx: &Mutex<mpsc::Receiver<ClickEvent>>,
    settings: &PipelineSettings,
    shutdown: &mut watch::Receiver<bool>,
) -> (Vec<ClickEvent>, bool) {
    let mut rx = rx.lock().await;
    let mut batch = Vec::new();

    if *shutdown.borrow() {
        return drain(&mut rx, batch, settings.batch_size);
    }

    tokio::select! {
        maybe = rx.recv() => match maybe {
            Some(event) => batch.push(event),
            None => return (batch, true),
        },
        _ = shutdown.changed() => return drain(&mut rx, batch, settings.batch_size),
    }

    let deadline = tokio::time::Instant::now() + settings.flush_interval;
    while batch.len() < settings.batch_size {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(event) => batch.push(event),
                None => return (batch, true),
            },
            _ = tokio::time::sleep_until(deadline) => break,
            _ = shutdown.changed() => return drain(&mut rx, batch, settings.batch_size),
        }
    }
    (batch, false)
}

/// 关闭队列并取出已缓冲的事件（最多补满一个批次）
fn drain(
    rx: &mut mpsc::Receiver<ClickEvent>,
    mut batch: Vec<ClickEvent>,
    batch_size: usize,
) -> (Vec<ClickEvent>, bool) {
    rx.close();
    while batch.len() < batch_size {
        match rx.try_recv() {
            Ok(event) => batch.push(event),
            Err(_) => return (batch, true),
        }
    }
    (batch, false)
}

impl Shared {
    async fn flush(&self, worker: usize, batch: Vec<ClickEvent>) {
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        let len = batch.len() as u64;
        let mut attempt = 0;

        loop {
            match self.sink.write_batch(&batch).await {
                Ok(()) => {
                    self.counters.written.fetch_add(len, Ordering::Relaxed);
                    debug!("Worker {} flushed {} click events", worker, len);
                    return;
                }
                Err(e) if attempt < self.settings.retry.max_retries => {
                    attempt += 1;
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    let delay = self.settings.retry.delay_for(attempt);
                    warn!(
                        "Worker {} failed to write {} click events (attempt {}/{}): {}; retrying in {:?}",
                        worker,
                        len,
                        attempt,
                        self.settings.retry.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let reason = format!("{} (after {} attempts)", e, attempt + 1);
                    match self.dead_letter.dead_letter(&batch, &reason).await {
                        Ok(()) => {
                            self.counters.dead_lettered.fetch_add(len, Ordering::Relaxed);
                        }
                        Err(dl_err) => {
                            self.counters.lost.fetch_add(len, Ordering::Relaxed);
                            error!(
                                "Failed to dead-letter {} click events: {} (original error: {})",
                                len, dl_err, reason
                            );
                        }
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::dead_letter::LogDeadLetter;
    use crate::storage::ClickOutcome;
    use chrono::Utc;

    struct CollectingSink {
        events: parking_lot::Mutex<Vec<ClickEvent>>,
        batches: parking_lot::Mutex<Vec<usize>>,
    }

    impl CollectingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: parking_lot::Mutex::new(Vec::new()),
                batches: parking_lot::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl EventSink for CollectingSink {
        async fn write_batch(&self, events: &[ClickEvent]) -> anyhow::Result<()> {
            self.batches.lock().push(events.len());
            self.events.lock().extend_from_slice(events);
            Ok(())
        }
    }

    fn event(id: i64) -> ClickEvent {
        ClickEvent {
            event_id: id,
            short_code: "abc123".into(),
            ts: Utc::now(),
            geo: None,
            device: None,
            referrer: None,
            outcome: ClickOutcome::Resolved,
        }
    }

    fn settings(batch_size: usize, flush_ms: u64) -> PipelineSettings {
        PipelineSettings {
            queue_capacity: 1000,
            batch_size,
            flush_interval: Duration::from_millis(flush_ms),
            workers: 2,
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_everything() {
        let sink = CollectingSink::new();
        let pipeline = ClickPipeline::start(settings(7, 60_000), sink.clone(), Arc::new(LogDeadLetter));

        for id in 1..=50 {
            assert!(pipeline.enqueue(event(id)));
        }
        pipeline.shutdown().await;

        let mut ids: Vec<i64> = sink.events.lock().iter().map(|e| e.event_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<_>>());
        assert!(sink.batches.lock().iter().all(|&n| n <= 7));

        let stats = pipeline.stats();
        assert_eq!(stats.enqueued, 50);
        assert_eq!(stats.written, 50);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_flush_interval_triggers_partial_batch() {
        let sink = CollectingSink::new();
        let pipeline = ClickPipeline::start(settings(100, 20), sink.clone(), Arc::new(LogDeadLetter));

        pipeline.enqueue(event(1));
        pipeline.enqueue(event(2));

        let mut waited = 0;
        while sink.events.lock().len() < 2 && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(sink.events.lock().len(), 2);
        pipeline.shutdown().await;
    }

    struct RejectingSink;

    #[async_trait::async_trait]
    impl EventSink for RejectingSink {
        async fn write_batch(&self, _events: &[ClickEvent]) -> anyhow::Result<()> {
            anyhow::bail!("storage offline")
        }
    }

    struct BrokenDeadLetter;

    #[async_trait::async_trait]
    impl DeadLetter for BrokenDeadLetter {
        async fn dead_letter(&self, _events: &[ClickEvent], _reason: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_failed_dead_letter_counts_as_lost() {
        let pipeline = ClickPipeline::start(
            settings(10, 60_000),
            Arc::new(RejectingSink),
            Arc::new(BrokenDeadLetter),
        );
        for id in 1..=4 {
            pipeline.enqueue(event(id));
        }
        pipeline.shutdown().await;

        let stats = pipeline.stats();
        assert_eq!(stats.written, 0);
        assert_eq!(stats.dead_lettered, 0);
        assert_eq!(stats.lost, 4);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let sink = CollectingSink::new();
        let pipeline = ClickPipeline::start(settings(10, 10), sink, Arc::new(LogDeadLetter));
        pipeline.shutdown().await;

        assert!(!pipeline.enqueue(event(1)));
        assert_eq!(pipeline.stats().dropped, 1);
    }
}

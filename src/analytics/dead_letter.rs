//! 死信处理
//!
//! 重试耗尽的批次不会阻塞管线：写入死信后即丢弃。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use super::sink::DeadLetter;
use crate::storage::ClickEvent;

/// 死信文件中的一行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub failed_at: DateTime<Utc>,
    pub reason: String,
    pub event: ClickEvent,
}

/// 以 JSON Lines 追加写入文件，每个事件一行
pub struct FileDeadLetter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDeadLetter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取死信文件（用于人工重放），损坏的行会被跳过
    pub async fn read_all(&self) -> anyhow::Result<Vec<DeadLetterRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed dead letter line {} in {}: {}",
                    lineno + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl DeadLetter for FileDeadLetter {
    async fn dead_letter(&self, events: &[ClickEvent], reason: &str) -> anyhow::Result<()> {
        let failed_at = Utc::now();
        let mut buf = Vec::new();
        for event in events {
            let record = DeadLetterRecord {
                failed_at,
                reason: reason.to_string(),
                event: event.clone(),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        error!(
            "Dead-lettered {} click events to {}: {}",
            events.len(),
            self.path.display(),
            reason
        );
        Ok(())
    }
}

/// 只记录错误日志
pub struct LogDeadLetter;

#[async_trait::async_trait]
impl DeadLetter for LogDeadLetter {
    async fn dead_letter(&self, events: &[ClickEvent], reason: &str) -> anyhow::Result<()> {
        let first = events.first().map(|e| e.event_id);
        let last = events.last().map(|e| e.event_id);
        error!(
            "Dropping {} click events (ids {:?}..={:?}): {}",
            events.len(),
            first,
            last,
            reason
        );
        Ok(())
    }
}

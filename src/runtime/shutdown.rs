use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::AppContext;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C，然后执行关闭流程
pub async fn listen_for_shutdown(ctx: &AppContext) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, draining click pipeline...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
    perform_shutdown(ctx).await;
}

/// 在超时内排空管线；超时后放弃剩余事件
pub async fn perform_shutdown(ctx: &AppContext) {
    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), ctx.shutdown()).await {
        Ok(()) => info!("All shutdown tasks completed successfully"),
        Err(_) => error!(
            "Shutdown tasks timed out after {} seconds, {} events left unflushed",
            SHUTDOWN_TIMEOUT_SECS,
            ctx.pipeline.stats().queued
        ),
    }
}

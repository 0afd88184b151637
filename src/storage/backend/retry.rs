//! 数据库操作重试
//!
//! 把 `DbErr` 分成三类：
//! - `Transient`：连接获取失败、死锁、锁超时、SQLite `database is locked`，按指数退避重试
//! - `Conflict`：唯一约束冲突，短码已被占用，立即返回
//! - `Permanent`：其余错误，立即返回

use std::future::Future;
use std::ops::Deref;

use sea_orm::error::RuntimeErr;
use sea_orm::{DbErr, SqlErr};
use tokio::time::sleep;
use tracing::{debug, warn};

pub use crate::utils::backoff::RetryConfig;

/// MySQL 死锁/锁等待超时，PostgreSQL 序列化失败/死锁，SQLite BUSY/LOCKED
const TRANSIENT_CODES: &[&str] = &["1213", "1205", "40001", "40P01", "5", "6"];

const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "database table is locked",
    "serialization failure",
    "could not serialize access",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Conflict,
    Permanent,
}

pub fn classify(err: &DbErr) -> ErrorClass {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return ErrorClass::Conflict;
    }
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => ErrorClass::Transient,
        DbErr::Exec(rt) | DbErr::Query(rt) if runtime_is_transient(rt) => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

/// 是否为唯一约束冲突
pub fn is_unique_violation(err: &DbErr) -> bool {
    classify(err) == ErrorClass::Conflict
}

fn runtime_is_transient(err: &RuntimeErr) -> bool {
    let message = match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            if let Some(code) = sqlx_err.deref().as_database_error().and_then(|d| d.code()) {
                return TRANSIENT_CODES.contains(&code.as_ref());
            }
            sqlx_err.to_string()
        }
        RuntimeErr::Internal(msg) => msg.clone(),
        #[allow(unreachable_patterns)]
        _ => return false,
    };
    let message = message.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| message.contains(m))
}

/// 执行 `operation`，遇到瞬时错误时退避重试，最多 `max_retries` 次
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let class = classify(&err);
        if class != ErrorClass::Transient || attempt >= config.max_retries {
            if class == ErrorClass::Transient {
                warn!(
                    "'{}' still failing after {} attempts: {}",
                    operation_name,
                    attempt + 1,
                    err
                );
            } else {
                debug!("'{}' failed ({:?}): {}", operation_name, class, err);
            }
            return Err(err);
        }

        attempt += 1;
        let delay = config.delay_for(attempt);
        warn!(
            "'{}' hit a transient error (attempt {}/{}): {}; retrying in {:?}",
            operation_name,
            attempt,
            config.max_retries + 1,
            err,
            delay
        );
        sleep(delay).await;
    }
}

//! 重定向策略钩子
//!
//! 只对启用且未过期的链接调用；返回 `Block` 时重定向按“不存在”处理，
//! 事件结果记为 `blocked`。

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::analytics::RequestContext;
use crate::storage::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Block,
}

pub trait RedirectPolicy: Send + Sync {
    fn evaluate(&self, link: &Link, ctx: &RequestContext) -> PolicyDecision;
}

/// 默认策略：全部放行
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl RedirectPolicy for AllowAll {
    fn evaluate(&self, _link: &Link, _ctx: &RequestContext) -> PolicyDecision {
        PolicyDecision::Allow
    }
}

/// 按短码限速：每个短码每秒最多 `per_second` 次重定向，允许 `burst` 的突发
pub struct PerLinkRateLimit {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl PerLinkRateLimit {
    pub fn new(per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(per_second).allow_burst(burst)),
        }
    }

    /// 清理长时间未访问的短码状态
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

impl RedirectPolicy for PerLinkRateLimit {
    fn evaluate(&self, link: &Link, _ctx: &RequestContext) -> PolicyDecision {
        match self.limiter.check_key(&link.short_code) {
            Ok(()) => PolicyDecision::Allow,
            Err(_) => {
                debug!("Rate limit exceeded for code: {}", link.short_code);
                PolicyDecision::Block
            }
        }
    }
}

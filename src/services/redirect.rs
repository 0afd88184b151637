//! 重定向解析
//!
//! `Lookup -> {Resolved, Expired, NotFound, Blocked}`。
//! 过期判断先于 active 标记。每次解析恰好构造一个点击事件并非阻塞入队，入队发生在返回之前；
//! 队列满时事件被丢弃，重定向本身不受影响。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, instrument, trace};

use super::code_generator::CodeGenerator;
use super::policy::{AllowAll, PolicyDecision, RedirectPolicy};
use crate::analytics::{ClickPipeline, RequestContext, build_event};
use crate::cache::{CacheLookup, LinkCache, TombstoneKind};
use crate::storage::{ClickOutcome, Link, LinkStore, MALFORMED_CODE};
use crate::utils::EventIdGenerator;

/// 调用方可见的解析结果；过期、不存在、被拦截统一为 NotFound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect { target_url: String },
    NotFound,
}

pub struct RedirectService {
    store: Arc<dyn LinkStore>,
    cache: Arc<dyn LinkCache>,
    pipeline: Arc<ClickPipeline>,
    generator: CodeGenerator,
    ids: Arc<EventIdGenerator>,
    policy: Arc<dyn RedirectPolicy>,
}

impl RedirectService {
    pub fn new(
        store: Arc<dyn LinkStore>,
        cache: Arc<dyn LinkCache>,
        pipeline: Arc<ClickPipeline>,
        generator: CodeGenerator,
        ids: Arc<EventIdGenerator>,
    ) -> Self {
        Self {
            store,
            cache,
            pipeline,
            generator,
            ids,
            policy: Arc::new(AllowAll),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn RedirectPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub async fn resolve(&self, code: &str, ctx: &RequestContext) -> Resolution {
        self.resolve_at(code, ctx, Utc::now()).await
    }

    /// 以给定时间解析（过期判断以 `now` 为准）
    #[instrument(skip(self, ctx, now))]
    pub async fn resolve_at(
        &self,
        code: &str,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Resolution {
        // 格式不合法的短码不触碰缓存与存储，事件里也不保留原始输入
        let (event_code, (outcome, target_url)) = if self.generator.is_valid_code(code) {
            (code, self.lookup(code, ctx, now).await)
        } else {
            (MALFORMED_CODE, (ClickOutcome::NotFound, None))
        };

        self.pipeline
            .enqueue(build_event(&self.ids, event_code, ctx, outcome, now));

        match target_url {
            Some(target_url) => Resolution::Redirect { target_url },
            None => {
                trace!("Code {} resolved as {}", event_code, outcome);
                Resolution::NotFound
            }
        }
    }

    async fn lookup(
        &self,
        code: &str,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> (ClickOutcome, Option<String>) {
        let link = match self.cache.lookup(code).await {
            CacheLookup::Hit(link) => link,
            CacheLookup::Tombstone(kind) => return (kind.outcome(), None),
            CacheLookup::Miss => match self.load(code, now).await {
                Ok(link) => link,
                Err(outcome) => return (outcome, None),
            },
        };

        // 过期优先于 active：清扫停用前后结果一致
        if link.is_expired_at(now) {
            return (ClickOutcome::Expired, None);
        }
        if !link.active {
            return (ClickOutcome::NotFound, None);
        }
        match self.policy.evaluate(&link, ctx) {
            PolicyDecision::Allow => (ClickOutcome::Resolved, Some(link.original_url)),
            PolicyDecision::Block => (ClickOutcome::Blocked, None),
        }
    }

    /// 回源读取并回填缓存；无法跳转时返回对应的结果
    async fn load(&self, code: &str, now: DateTime<Utc>) -> Result<Link, ClickOutcome> {
        let fetched_at = Instant::now();
        let link = match self.store.get(code).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                self.cache
                    .populate_tombstone(code, TombstoneKind::Missing, fetched_at)
                    .await;
                return Err(ClickOutcome::NotFound);
            }
            Err(e) => {
                error!("Store lookup failed for code {}: {}", code, e);
                return Err(ClickOutcome::NotFound);
            }
        };

        if link.is_expired_at(now) {
            // 墓碑按实际时钟判断，避免以未来时间解析时提前写入
            if link.is_expired_at(Utc::now()) {
                self.cache
                    .populate_tombstone(code, TombstoneKind::Expired, fetched_at)
                    .await;
            }
            return Err(ClickOutcome::Expired);
        }
        if !link.active {
            self.cache
                .populate_tombstone(code, TombstoneKind::Missing, fetched_at)
                .await;
            return Err(ClickOutcome::NotFound);
        }

        self.cache.populate(link.clone(), fetched_at).await;
        Ok(link)
    }
}

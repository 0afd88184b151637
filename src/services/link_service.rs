//! Link management service
//!
//! 写路径：创建（生成码 / 自定义别名）、批量创建、编辑、停用、过期扫描。
//! 所有修改在返回前同步驱逐缓存。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::code_generator::CodeGenerator;
use crate::cache::LinkCache;
use crate::errors::{LinkpulseError, Result};
use crate::storage::{Link, LinkStore, LinkUpdate};
use crate::utils::validate_url;

/// 批量创建时同时进行的创建数
const BULK_CONCURRENCY: usize = 16;

/// Request to create a new link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateLinkRequest {
    pub original_url: String,
    /// 自定义别名，None 时生成随机短码
    pub custom_alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub owner_id: Option<String>,
}

impl CreateLinkRequest {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.custom_alias = Some(alias.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

pub struct LinkService {
    store: Arc<dyn LinkStore>,
    cache: Arc<dyn LinkCache>,
    generator: CodeGenerator,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, cache: Arc<dyn LinkCache>, generator: CodeGenerator) -> Self {
        Self {
            store,
            cache,
            generator,
        }
    }

    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    /// 创建短链接
    ///
    /// 生成码遇到唯一约束冲突时重新生成，最多 `max_attempts` 次，
    /// 超过上限返回 `CodeSpaceExhausted`。自定义别名冲突直接返回 `AliasTaken`。
    pub async fn create_link(&self, req: CreateLinkRequest) -> Result<Link> {
        let now = Utc::now();
        let original_url = validate_url(&req.original_url)?;

        let template = Link {
            short_code: String::new(),
            original_url,
            owner_id: req.owner_id,
            custom_alias: false,
            created_at: now,
            expires_at: req.expires_at,
            active: true,
            click_count: 0,
        };
        template.validate_new(now)?;

        let link = match req.custom_alias.filter(|a| !a.is_empty()) {
            Some(alias) => {
                self.generator.validate_alias(&alias)?;
                self.store
                    .create(Link {
                        short_code: alias,
                        custom_alias: true,
                        ..template
                    })
                    .await?
            }
            None => self.create_with_generated_code(template).await?,
        };

        // 清除该短码此前可能留下的墓碑
        self.cache.evict(&link.short_code).await;

        info!(
            "LinkService: created link '{}' -> '{}'",
            link.short_code, link.original_url
        );
        Ok(link)
    }

    async fn create_with_generated_code(&self, template: Link) -> Result<Link> {
        let max_attempts = self.generator.max_attempts();
        for attempt in 1..=max_attempts {
            let candidate = Link {
                short_code: self.generator.generate(),
                ..template.clone()
            };
            let code = candidate.short_code.clone();
            match self.store.create(candidate).await {
                Ok(link) => return Ok(link),
                Err(LinkpulseError::AliasTaken(_)) => {
                    warn!(
                        "Generated code '{}' collided (attempt {}/{})",
                        code, attempt, max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            "Code space exhausted: {} consecutive collisions at length {}",
            max_attempts,
            self.generator.length()
        );
        Err(LinkpulseError::code_space_exhausted(format!(
            "Failed to allocate a unique code after {} attempts; increase the code length",
            max_attempts
        )))
    }

    /// 批量创建：各项独立处理，结果与输入按位置一一对应
    pub async fn bulk_create(&self, requests: Vec<CreateLinkRequest>) -> Vec<Result<Link>> {
        let total = requests.len();
        let results: Vec<Result<Link>> = stream::iter(requests)
            .map(|req| self.create_link(req))
            .buffered(BULK_CONCURRENCY)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            "LinkService: bulk create finished, {} succeeded, {} failed",
            total - failed,
            failed
        );
        results
    }

    pub async fn get_link(&self, code: &str) -> Result<Link> {
        self.store
            .get(code)
            .await?
            .ok_or_else(|| LinkpulseError::not_found(format!("Short link not found: {}", code)))
    }

    /// 编辑目标 URL / 过期时间，返回前驱逐缓存
    pub async fn update_link(&self, code: &str, update: LinkUpdate) -> Result<Link> {
        let link = self.store.update(code, update).await?;
        self.cache.evict(code).await;
        info!("LinkService: updated link '{}'", code);
        Ok(link)
    }

    /// 停用链接，返回后该短码立即解析为不存在
    pub async fn deactivate_link(&self, code: &str) -> Result<()> {
        self.store.deactivate(code).await?;
        self.cache.evict(code).await;
        info!("LinkService: deactivated link '{}'", code);
        Ok(())
    }

    /// 停用所有已过期的链接并驱逐缓存，返回停用数量
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let codes = self.store.deactivate_expired(now).await?;
        for code in &codes {
            self.cache.evict(code).await;
        }
        if !codes.is_empty() {
            debug!("Evicted {} expired links from cache", codes.len());
        }
        Ok(codes.len())
    }

    /// 启动后台过期扫描任务
    pub fn spawn_sweep_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!("Expiry sweep task started (interval: {:?})", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_expired(Utc::now()).await {
                    error!("Expiry sweep failed: {}", e);
                }
            }
        })
    }
}

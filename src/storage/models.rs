use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LinkpulseError, Result};

/// 短链接
///
/// `short_code` 在整个命名空间内唯一（包括已停用的链接），一经分配不再变更，也不回收。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub custom_alias: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// 点击数冗余字段，与原始事件最终一致
    #[serde(default)]
    pub click_count: u64,
}

impl Link {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// 启用且未过期
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }

    /// 新建链接写入前的校验：URL 合法、过期时间严格晚于 `now`
    pub fn validate_new(&self, now: DateTime<Utc>) -> Result<()> {
        crate::utils::validate_url(&self.original_url)?;
        if let Some(exp) = self.expires_at
            && exp <= now
        {
            return Err(LinkpulseError::invalid_expiration(format!(
                "Expiration {} is not in the future",
                exp.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// 编辑链接（None 表示不修改）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkUpdate {
    pub original_url: Option<String>,
    /// `Some(None)` 清除过期时间
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl LinkUpdate {
    pub fn is_empty(&self) -> bool {
        self.original_url.is_none() && self.expires_at.is_none()
    }

    /// 新 URL 合法、新过期时间严格晚于 `now`
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if let Some(url) = &self.original_url {
            crate::utils::validate_url(url)?;
        }
        if let Some(Some(exp)) = self.expires_at
            && exp <= now
        {
            return Err(LinkpulseError::invalid_expiration(format!(
                "Expiration {} is not in the future",
                exp.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub fn apply_to(&self, link: &mut Link) {
        if let Some(url) = &self.original_url {
            link.original_url = url.clone();
        }
        if let Some(exp) = self.expires_at {
            link.expires_at = exp;
        }
    }
}

/// 解析结果（封闭枚举，汇总维度据此穷举）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClickOutcome {
    Resolved,
    Expired,
    NotFound,
    Blocked,
}

/// 汇总维度
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Geo,
    Device,
    Referrer,
    Outcome,
}

/// 短码列宽（迁移中为 VARCHAR(64)），按字符计
pub const MAX_SHORT_CODE_LEN: usize = 64;
/// 格式不合法的请求短码在点击事件中统一记为此值
pub const MALFORMED_CODE: &str = "_malformed";

pub const UNKNOWN_VALUE: &str = "unknown";
pub const DIRECT_REFERRER: &str = "direct";

/// 点击事件，写入后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub event_id: i64,
    pub short_code: String,
    pub ts: DateTime<Utc>,
    pub geo: Option<String>,
    pub device: Option<String>,
    pub referrer: Option<String>,
    pub outcome: ClickOutcome,
}

impl ClickEvent {
    /// 事件所属的日桶（UTC）
    pub fn bucket(&self) -> NaiveDate {
        self.ts.date_naive()
    }

    /// 事件在某一维度上的取值，缺失值归入 unknown / direct
    pub fn dimension_value(&self, dimension: Dimension) -> String {
        let value = match dimension {
            Dimension::Geo => self.geo.as_deref(),
            Dimension::Device => self.device.as_deref(),
            Dimension::Referrer => self.referrer.as_deref(),
            Dimension::Outcome => return self.outcome.to_string(),
        };
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None if dimension == Dimension::Referrer => DIRECT_REFERRER.to_string(),
            None => UNKNOWN_VALUE.to_string(),
        }
    }
}

/// 汇总表的一行：`(short_code, bucket, dimension, value) -> count`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RollupKey {
    pub short_code: String,
    pub bucket: NaiveDate,
    pub dimension: Dimension,
    pub value: String,
}

/// 汇总增量 / 汇总查询结果的扁平形式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupCount {
    pub key: RollupKey,
    pub count: u64,
}

/// 单个 `(short_code, day, dimension)` 的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub short_code: String,
    pub bucket: NaiveDate,
    pub dimension: Dimension,
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

/// 闭区间日期范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(LinkpulseError::validation(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// 一批事件写入后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// 新写入（此前未见过的 event_id）的事件数
    pub inserted: usize,
    /// 本批跳过的重复事件数
    pub duplicates: usize,
    /// 新写入事件中 outcome = resolved 的按短码计数
    pub resolved_per_code: Vec<(String, u64)>,
}

//! 点击事件构造
//!
//! 把请求上下文（UA、Referer、地理位置）归一化为低基数的维度值。

use chrono::{DateTime, Utc};
use woothee::parser::Parser;

use crate::storage::{ClickEvent, ClickOutcome, MAX_SHORT_CODE_LEN};
use crate::utils::EventIdGenerator;

const MAX_REFERRER_LEN: usize = 255;
const MAX_GEO_LEN: usize = 16;

/// 解析请求时可用的上下文（由传输层填充）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// 上游解析出的粗粒度地理位置（通常是 ISO 国家码）
    pub geo: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = Some(geo.into());
        self
    }
}

/// 设备类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Appliance,
    Other,
}

/// 通过 woothee 识别设备类别，UA 缺失或无法识别时返回 None
pub fn classify_device(user_agent: Option<&str>) -> Option<DeviceClass> {
    let ua = user_agent.map(str::trim).filter(|ua| !ua.is_empty())?;
    let result = Parser::new().parse(ua)?;
    let class = match result.category {
        "pc" => DeviceClass::Desktop,
        "smartphone" | "mobilephone" => DeviceClass::Mobile,
        "crawler" => DeviceClass::Bot,
        "appliance" => DeviceClass::Appliance,
        "" | "UNKNOWN" => return None,
        _ => DeviceClass::Other,
    };
    Some(class)
}

/// Referer 只保留主机名；无法解析的原样保留（截断）
pub fn normalize_referrer(referrer: Option<&str>) -> Option<String> {
    let raw = referrer.map(str::trim).filter(|r| !r.is_empty())?;
    match url::Url::parse(raw) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => Some(host.to_ascii_lowercase()),
            None => Some(truncate(raw, MAX_REFERRER_LEN)),
        },
        Err(_) => Some(truncate(raw, MAX_REFERRER_LEN)),
    }
}

pub fn normalize_geo(geo: Option<&str>) -> Option<String> {
    let geo = geo.map(str::trim).filter(|g| !g.is_empty())?;
    Some(truncate(&geo.to_ascii_uppercase(), MAX_GEO_LEN))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// 为一次解析尝试构造点击事件
///
/// 短码按列宽截断；调用方应先把格式不合法的短码替换为 `MALFORMED_CODE`。
pub fn build_event(
    ids: &EventIdGenerator,
    code: &str,
    ctx: &RequestContext,
    outcome: ClickOutcome,
    now: DateTime<Utc>,
) -> ClickEvent {
    ClickEvent {
        event_id: ids.next_id(),
        short_code: truncate(code, MAX_SHORT_CODE_LEN),
        ts: now,
        geo: normalize_geo(ctx.geo.as_deref()),
        device: classify_device(ctx.user_agent.as_deref()).map(|d| d.to_string()),
        referrer: normalize_referrer(ctx.referrer.as_deref()),
        outcome,
    }
}

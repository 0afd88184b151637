use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 配置文件默认路径
pub const CONFIG_FILE: &str = "linkpulse.toml";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - database: 存储后端连接与重试
/// - cache: 重定向热路径缓存
/// - codes: 短码生成规则
/// - pipeline: 点击事件摄取管线
/// - analytics: 汇总与数据保留
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub codes: CodeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > linkpulse.toml > 默认值
    /// ENV 前缀：LP，分隔符：__
    /// 示例：LP__PIPELINE__QUEUE_CAPACITY=50000
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 LP，分隔符 __
            .add_source(
                Environment::with_prefix("LP")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 存储后端连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://` 选择进程内存储，其余按 URL 推断 SQLite / MySQL / PostgreSQL
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// false 时使用 NullLinkCache，所有请求直接回源
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// 正向缓存默认 TTL（秒），实际 TTL 不超过链接剩余有效期
    #[serde(default = "default_cache_ttl")]
    pub default_ttl: u64,
    /// 墓碑（not-found / expired）TTL（秒）
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl: u64,
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_negative_capacity")]
    pub negative_max_capacity: u64,
    /// 驱逐标记保留时间（秒），用于拦截驱逐前发起的回源回填
    #[serde(default = "default_eviction_guard_secs")]
    pub eviction_guard_secs: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl)
    }

    pub fn eviction_guard(&self) -> Duration {
        Duration::from_secs(self.eviction_guard_secs)
    }
}

/// 短码生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeConfig {
    #[serde(default = "default_code_alphabet")]
    pub alphabet: String,
    #[serde(default = "default_code_length")]
    pub length: usize,
    /// 生成码冲突时的最大尝试次数
    #[serde(default = "default_code_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_alias_length")]
    pub min_alias_length: usize,
    #[serde(default = "default_max_alias_length")]
    pub max_alias_length: usize,
    /// 保留字（大小写不敏感），生成码和自定义别名都不允许使用
    #[serde(default = "default_reserved_words")]
    pub reserved_words: Vec<String>,
}

/// 点击事件摄取管线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 有界队列容量，满时丢弃事件
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 攒够 batch_size 条即刷盘
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 批次中首条事件到达后最多等待多久刷盘（毫秒）
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_pipeline_workers")]
    pub workers: usize,
    #[serde(default = "default_pipeline_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_pipeline_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// 死信文件路径（JSON Lines），未配置时只记录日志
    #[serde(default)]
    pub dead_letter_path: Option<String>,
    /// 事件 ID 中的节点号，多实例共享事件日志时需各不相同
    #[serde(default)]
    pub node_id: u8,
}

impl PipelineConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// 分析统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// 原始点击事件保留天数
    #[serde(default = "default_event_retention_days")]
    pub event_retention_days: u64,
    /// 汇总数据保留天数
    #[serde(default = "default_rollup_retention_days")]
    pub rollup_retention_days: u64,
    /// 数据清理任务间隔（秒）
    #[serde(default = "default_retention_interval_secs")]
    pub retention_interval_secs: u64,
    /// 过期链接扫描间隔（秒）
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
    /// 重建汇总时每页读取的事件数
    #[serde(default = "default_rebuild_page_size")]
    pub rebuild_page_size: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_database_url() -> String {
    "linkpulse.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_negative_ttl() -> u64 {
    10
}

fn default_memory_capacity() -> u64 {
    10000
}

fn default_negative_capacity() -> u64 {
    100000
}

fn default_eviction_guard_secs() -> u64 {
    30
}

pub const BASE62_ALPHABET: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn default_code_alphabet() -> String {
    BASE62_ALPHABET.to_string()
}

fn default_code_length() -> usize {
    6
}

fn default_code_max_attempts() -> u32 {
    5
}

fn default_min_alias_length() -> usize {
    3
}

fn default_max_alias_length() -> usize {
    32
}

fn default_reserved_words() -> Vec<String> {
    [
        "admin", "api", "app", "assets", "dashboard", "health", "login", "logout", "metrics",
        "static", "status",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_queue_capacity() -> usize {
    10000
}

fn default_batch_size() -> usize {
    500
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_pipeline_workers() -> usize {
    num_cpus::get().clamp(1, 4)
}

fn default_pipeline_retry_count() -> u32 {
    5
}

fn default_pipeline_retry_max_delay_ms() -> u64 {
    5000
}

fn default_event_retention_days() -> u64 {
    90
}

fn default_rollup_retention_days() -> u64 {
    730
}

fn default_retention_interval_secs() -> u64 {
    3600
}

fn default_expiry_sweep_interval_secs() -> u64 {
    300
}

fn default_rebuild_page_size() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            default_ttl: default_cache_ttl(),
            negative_ttl: default_negative_ttl(),
            max_capacity: default_memory_capacity(),
            negative_max_capacity: default_negative_capacity(),
            eviction_guard_secs: default_eviction_guard_secs(),
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            alphabet: default_code_alphabet(),
            length: default_code_length(),
            max_attempts: default_code_max_attempts(),
            min_alias_length: default_min_alias_length(),
            max_alias_length: default_max_alias_length(),
            reserved_words: default_reserved_words(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            workers: default_pipeline_workers(),
            retry_count: default_pipeline_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_pipeline_retry_max_delay_ms(),
            dead_letter_path: None,
            node_id: 0,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            event_retention_days: default_event_retention_days(),
            rollup_retention_days: default_rollup_retention_days(),
            retention_interval_secs: default_retention_interval_secs(),
            expiry_sweep_interval_secs: default_expiry_sweep_interval_secs(),
            rebuild_page_size: default_rebuild_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_round_trips() {
        let sample = StaticConfig::generate_sample_config();
        let parsed: StaticConfig = toml::from_str(&sample).expect("sample config should parse");
        assert_eq!(parsed.codes.length, 6);
        assert_eq!(parsed.cache.negative_ttl, 10);
        assert_eq!(parsed.pipeline.batch_size, 500);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [pipeline]
            queue_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.pipeline.queue_capacity, 8);
        assert_eq!(parsed.pipeline.flush_interval_ms, 1000);
        assert_eq!(parsed.codes.alphabet, BASE62_ALPHABET);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = StaticConfig::load_from("definitely-not-here.toml");
        assert_eq!(config.database.database_url, "linkpulse.db");
        assert!(config.cache.enabled);
    }
}

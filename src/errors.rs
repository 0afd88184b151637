use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkpulseError {
    InvalidUrl(String),
    InvalidAlias(String),
    ReservedAlias(String),
    AliasTaken(String),
    InvalidExpiration(String),
    CodeSpaceExhausted(String),
    NotFound(String),
    Validation(String),
    Config(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Serialization(String),
    FileOperation(String),
    DateParse(String),
}

impl LinkpulseError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkpulseError::InvalidUrl(_) => "E001",
            LinkpulseError::InvalidAlias(_) => "E002",
            LinkpulseError::ReservedAlias(_) => "E003",
            LinkpulseError::AliasTaken(_) => "E004",
            LinkpulseError::InvalidExpiration(_) => "E005",
            LinkpulseError::CodeSpaceExhausted(_) => "E006",
            LinkpulseError::NotFound(_) => "E007",
            LinkpulseError::Validation(_) => "E008",
            LinkpulseError::Config(_) => "E009",
            LinkpulseError::DatabaseConnection(_) => "E010",
            LinkpulseError::DatabaseOperation(_) => "E011",
            LinkpulseError::Serialization(_) => "E012",
            LinkpulseError::FileOperation(_) => "E013",
            LinkpulseError::DateParse(_) => "E014",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkpulseError::InvalidUrl(_) => "Invalid URL",
            LinkpulseError::InvalidAlias(_) => "Invalid Alias",
            LinkpulseError::ReservedAlias(_) => "Reserved Alias",
            LinkpulseError::AliasTaken(_) => "Alias Taken",
            LinkpulseError::InvalidExpiration(_) => "Invalid Expiration",
            LinkpulseError::CodeSpaceExhausted(_) => "Code Space Exhausted",
            LinkpulseError::NotFound(_) => "Resource Not Found",
            LinkpulseError::Validation(_) => "Validation Error",
            LinkpulseError::Config(_) => "Configuration Error",
            LinkpulseError::DatabaseConnection(_) => "Database Connection Error",
            LinkpulseError::DatabaseOperation(_) => "Database Operation Error",
            LinkpulseError::Serialization(_) => "Serialization Error",
            LinkpulseError::FileOperation(_) => "File Operation Error",
            LinkpulseError::DateParse(_) => "Date Parse Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkpulseError::InvalidUrl(msg)
            | LinkpulseError::InvalidAlias(msg)
            | LinkpulseError::ReservedAlias(msg)
            | LinkpulseError::AliasTaken(msg)
            | LinkpulseError::InvalidExpiration(msg)
            | LinkpulseError::CodeSpaceExhausted(msg)
            | LinkpulseError::NotFound(msg)
            | LinkpulseError::Validation(msg)
            | LinkpulseError::Config(msg)
            | LinkpulseError::DatabaseConnection(msg)
            | LinkpulseError::DatabaseOperation(msg)
            | LinkpulseError::Serialization(msg)
            | LinkpulseError::FileOperation(msg)
            | LinkpulseError::DateParse(msg) => msg,
        }
    }

    /// 致命错误：调用方重试无意义，需要运维介入（扩大码空间、修正配置）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkpulseError::CodeSpaceExhausted(_) | LinkpulseError::Config(_)
        )
    }

    /// 格式化为彩色输出（用于 CLI 错误输出）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkpulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkpulseError {}

// 便捷的构造函数
impl LinkpulseError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::InvalidUrl(msg.into())
    }

    pub fn invalid_alias<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::InvalidAlias(msg.into())
    }

    pub fn reserved_alias<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::ReservedAlias(msg.into())
    }

    pub fn alias_taken<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::AliasTaken(msg.into())
    }

    pub fn invalid_expiration<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::InvalidExpiration(msg.into())
    }

    pub fn code_space_exhausted<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::CodeSpaceExhausted(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::NotFound(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Validation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Config(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Serialization(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::FileOperation(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DateParse(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for LinkpulseError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkpulseError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for LinkpulseError {
    fn from(err: std::io::Error) -> Self {
        LinkpulseError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkpulseError {
    fn from(err: serde_json::Error) -> Self {
        LinkpulseError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for LinkpulseError {
    fn from(err: chrono::ParseError) -> Self {
        LinkpulseError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkpulseError>;

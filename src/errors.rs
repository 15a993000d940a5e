use std::fmt;

use actix_web::http::StatusCode;

#[derive(Debug, Clone)]
pub enum ShortenerError {
    InvalidUrl(String),
    InvalidId(String),
    EntryAlreadyExists(String),
    IdGenerationExhausted(String),
    NoEntryFound(String),
    EntryExpired(String),
    AuthorizationFailed(String),
    PasswordHash(String),
    Backend(String),
    Config(String),
    FileOperation(String),
}

impl ShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortenerError::InvalidUrl(_) => "E001",
            ShortenerError::InvalidId(_) => "E002",
            ShortenerError::EntryAlreadyExists(_) => "E003",
            ShortenerError::IdGenerationExhausted(_) => "E004",
            ShortenerError::NoEntryFound(_) => "E005",
            ShortenerError::EntryExpired(_) => "E006",
            ShortenerError::AuthorizationFailed(_) => "E007",
            ShortenerError::PasswordHash(_) => "E008",
            ShortenerError::Backend(_) => "E009",
            ShortenerError::Config(_) => "E010",
            ShortenerError::FileOperation(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortenerError::InvalidUrl(_) => "Invalid URL",
            ShortenerError::InvalidId(_) => "Invalid ID",
            ShortenerError::EntryAlreadyExists(_) => "Entry Already Exists",
            ShortenerError::IdGenerationExhausted(_) => "ID Generation Exhausted",
            ShortenerError::NoEntryFound(_) => "No Entry Found",
            ShortenerError::EntryExpired(_) => "Entry Expired",
            ShortenerError::AuthorizationFailed(_) => "Authorization Failed",
            ShortenerError::PasswordHash(_) => "Password Hash Error",
            ShortenerError::Backend(_) => "Backend Failure",
            ShortenerError::Config(_) => "Configuration Error",
            ShortenerError::FileOperation(_) => "File Operation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortenerError::InvalidUrl(msg)
            | ShortenerError::InvalidId(msg)
            | ShortenerError::EntryAlreadyExists(msg)
            | ShortenerError::IdGenerationExhausted(msg)
            | ShortenerError::NoEntryFound(msg)
            | ShortenerError::EntryExpired(msg)
            | ShortenerError::AuthorizationFailed(msg)
            | ShortenerError::PasswordHash(msg)
            | ShortenerError::Backend(msg)
            | ShortenerError::Config(msg)
            | ShortenerError::FileOperation(msg) => msg,
        }
    }

    /// HTTP 状态码映射
    pub fn http_status(&self) -> StatusCode {
        match self {
            ShortenerError::InvalidUrl(_)
            | ShortenerError::InvalidId(_)
            | ShortenerError::EntryAlreadyExists(_) => StatusCode::BAD_REQUEST,
            ShortenerError::NoEntryFound(_) | ShortenerError::EntryExpired(_) => {
                StatusCode::NOT_FOUND
            }
            ShortenerError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            ShortenerError::IdGenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShortenerError::PasswordHash(_)
            | ShortenerError::Backend(_)
            | ShortenerError::Config(_)
            | ShortenerError::FileOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于启动失败时的终端输出）
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

impl fmt::Display for ShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortenerError {}

// 便捷的构造函数
impl ShortenerError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        ShortenerError::InvalidUrl(msg.into())
    }

    pub fn invalid_id<T: Into<String>>(msg: T) -> Self {
        ShortenerError::InvalidId(msg.into())
    }

    pub fn entry_already_exists<T: Into<String>>(msg: T) -> Self {
        ShortenerError::EntryAlreadyExists(msg.into())
    }

    pub fn id_generation_exhausted<T: Into<String>>(msg: T) -> Self {
        ShortenerError::IdGenerationExhausted(msg.into())
    }

    pub fn no_entry_found<T: Into<String>>(msg: T) -> Self {
        ShortenerError::NoEntryFound(msg.into())
    }

    pub fn entry_expired<T: Into<String>>(msg: T) -> Self {
        ShortenerError::EntryExpired(msg.into())
    }

    pub fn authorization_failed<T: Into<String>>(msg: T) -> Self {
        ShortenerError::AuthorizationFailed(msg.into())
    }

    pub fn password_hash<T: Into<String>>(msg: T) -> Self {
        ShortenerError::PasswordHash(msg.into())
    }

    pub fn backend<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Backend(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Config(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::FileOperation(msg.into())
    }

    /// 包装错误并附加上下文，保留原有错误种类
    pub fn context(self, ctx: impl fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", ctx, msg);
        match self {
            ShortenerError::InvalidUrl(m) => ShortenerError::InvalidUrl(wrap(m)),
            ShortenerError::InvalidId(m) => ShortenerError::InvalidId(wrap(m)),
            ShortenerError::EntryAlreadyExists(m) => ShortenerError::EntryAlreadyExists(wrap(m)),
            ShortenerError::IdGenerationExhausted(m) => {
                ShortenerError::IdGenerationExhausted(wrap(m))
            }
            ShortenerError::NoEntryFound(m) => ShortenerError::NoEntryFound(wrap(m)),
            ShortenerError::EntryExpired(m) => ShortenerError::EntryExpired(wrap(m)),
            ShortenerError::AuthorizationFailed(m) => {
                ShortenerError::AuthorizationFailed(wrap(m))
            }
            ShortenerError::PasswordHash(m) => ShortenerError::PasswordHash(wrap(m)),
            ShortenerError::Backend(m) => ShortenerError::Backend(wrap(m)),
            ShortenerError::Config(m) => ShortenerError::Config(wrap(m)),
            ShortenerError::FileOperation(m) => ShortenerError::FileOperation(wrap(m)),
        }
    }
}

impl From<redis::RedisError> for ShortenerError {
    fn from(err: redis::RedisError) -> Self {
        ShortenerError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Backend(format!("serialization: {}", err))
    }
}

impl From<std::io::Error> for ShortenerError {
    fn from(err: std::io::Error) -> Self {
        ShortenerError::FileOperation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShortenerError};

/// Environment variable prefix, e.g. `US__STORE__ID_LENGTH=6`
pub const ENV_PREFIX: &str = "US";

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Static process configuration.
///
/// Loaded once at startup (TOML file, then environment overrides) and
/// handed to each component behind an `Arc`. It is never mutated after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend name: `redis` or `memory`
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Path segment inserted between host and id when building public URLs
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// Redis 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Per-command round-trip timeout
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
    /// Put a TTL on entry keys (and their visitor lists) matching the entry expiration
    #[serde(default)]
    pub expire_entries: bool,
}

/// Entry store tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_id_length")]
    pub id_length: usize,
    #[serde(default = "default_visit_workers")]
    pub visit_workers: usize,
    #[serde(default = "default_visit_queue_capacity")]
    pub visit_queue_capacity: usize,
}

/// Deletion-tag key material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Inline key; takes precedence over `private_key_file` when non-empty
    #[serde(default)]
    pub private_key: String,
    #[serde(default = "default_private_key_file")]
    pub private_key_file: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
}

// ============================================================
// Default value functions
// ============================================================

fn default_backend() -> String {
    "redis".to_string()
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_timeout_ms() -> u64 {
    3000
}

fn default_id_length() -> usize {
    4
}

fn default_visit_workers() -> usize {
    2
}

fn default_visit_queue_capacity() -> usize {
    1024
}

fn default_private_key_file() -> String {
    "data/private.key".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_enable_rotation() -> bool {
    true
}

fn default_max_backups() -> u32 {
    5
}

// ============================================================
// Default implementations
// ============================================================

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: default_backend(),
            redis: RedisConfig::default(),
            store: StoreConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            location: String::new(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            timeout_ms: default_redis_timeout_ms(),
            expire_entries: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_length: default_id_length(),
            visit_workers: default_visit_workers(),
            visit_queue_capacity: default_visit_queue_capacity(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            private_key_file: default_private_key_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            enable_rotation: default_enable_rotation(),
            max_backups: default_max_backups(),
        }
    }
}

impl AppConfig {
    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.store.id_length) {
            return Err(ShortenerError::config(format!(
                "store.id_length must be between 1 and 64, got {}",
                self.store.id_length
            )));
        }
        if self.store.visit_workers == 0 {
            return Err(ShortenerError::config("store.visit_workers must be at least 1"));
        }
        if self.store.visit_queue_capacity == 0 {
            return Err(ShortenerError::config(
                "store.visit_queue_capacity must be at least 1",
            ));
        }
        match self.backend.as_str() {
            "redis" | "memory" => Ok(()),
            other => Err(ShortenerError::config(format!(
                "{} is not a recognized backend. Supported: redis, memory",
                other
            ))),
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

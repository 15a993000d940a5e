use std::path::Path;
use std::sync::Arc;

use config::{Config, Environment, File};
use tracing::debug;

use super::{AppConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX};
use crate::errors::{Result, ShortenerError};

/// Load the configuration snapshot for this process.
///
/// Priority: ENV > TOML file > defaults. A missing file is not an error;
/// a malformed one is.
///
/// # Examples
/// ```no_run
/// use url_shortener::config::load_config;
/// let config = load_config(None).expect("invalid configuration");
/// assert!(config.store.id_length > 0);
/// ```
pub fn load_config(path: Option<&str>) -> Result<Arc<AppConfig>> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ShortenerError::config(format!("Failed to build config: {}", e)))?;

    let config: AppConfig = settings
        .try_deserialize()
        .map_err(|e| ShortenerError::config(format!("Failed to deserialize config: {}", e)))?;

    if Path::new(path).exists() {
        debug!("Configuration loaded from: {}", path);
    }

    config.validate()?;
    Ok(Arc::new(config))
}

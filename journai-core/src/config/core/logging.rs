use crate::config::constants::defaults;
use serde::{Deserialize, Serialize};

/// Logging settings consumed by the binary when installing its subscriber
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `journai_core=debug`
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

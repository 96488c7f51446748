use crate::config::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Streaming transport settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StreamConfig {
    /// Give up on a stream that delivers nothing for this many seconds (0 disables)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Pacing of decoded chunks towards the renderer
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Upper bound on deliveries per second; 0 delivers as fast as they arrive
    #[serde(default = "default_max_chunks_per_second")]
    pub max_chunks_per_second: u32,

    /// Extra random delay added before each delivery, in milliseconds
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_second: default_max_chunks_per_second(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl ThrottleConfig {
    /// Minimum spacing between two deliveries
    pub fn interval(&self) -> Duration {
        if self.max_chunks_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.max_chunks_per_second
        }
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

fn default_idle_timeout() -> u64 {
    defaults::DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_max_chunks_per_second() -> u32 {
    defaults::DEFAULT_MAX_CHUNKS_PER_SECOND
}
fn default_jitter_ms() -> u64 {
    defaults::DEFAULT_JITTER_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_means_no_spacing() {
        let config = ThrottleConfig::default();
        assert_eq!(config.interval(), Duration::ZERO);
    }

    #[test]
    fn rate_translates_to_interval() {
        let config = ThrottleConfig {
            max_chunks_per_second: 20,
            jitter_ms: 5,
        };
        assert_eq!(config.interval(), Duration::from_millis(50));
        assert_eq!(config.jitter(), Duration::from_millis(5));
    }

    #[test]
    fn idle_timeout_zero_disables() {
        let config = StreamConfig {
            idle_timeout_secs: 0,
        };
        assert!(config.idle_timeout().is_none());
        assert_eq!(
            StreamConfig::default().idle_timeout(),
            Some(Duration::from_secs(60))
        );
    }
}

//! Development cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 15 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevCacheConfig {
    /// Serve and populate cached provider results. Only true in development.
    pub enabled: bool,
    /// How long a captured provider result stays fresh.
    pub ttl_seconds: u64,
}

impl Default for DevCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl From<&crate::config::Settings> for DevCacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            enabled: settings.app.environment.is_development(),
            ttl_seconds: settings.profile.dev_cache.as_secs(),
        }
    }
}

impl DevCacheConfig {
    pub fn enabled(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl_seconds: ttl.as_secs(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_with_fifteen_minute_ttl() {
        let config = DevCacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.ttl(), Duration::from_secs(900));
    }

    #[test]
    fn deserializes_partial_input() {
        let config: DevCacheConfig =
            serde_json::from_str(r#"{"enabled": true}"#).expect("valid config");
        assert!(config.enabled);
        assert_eq!(config.ttl_seconds, DEFAULT_TTL_SECONDS);
    }
}

//! Cache configuration.
//!
//! Layered with figment, lowest to highest precedence:
//! 1. Programmatic defaults
//! 2. `resource-cache.yaml` in the working directory (optional)
//! 3. `RESOURCE_CACHE_*` environment variables

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_TTL_MS: u64 = 5_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;
pub const CONFIG_FILE: &str = "resource-cache.yaml";
pub const ENV_PREFIX: &str = "RESOURCE_CACHE_";

/// How cached resources age out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpirationMode {
    /// Entries stay until invalidated.
    Never,
    /// Entries expire a fixed time after they were created.
    Fixed,
    /// Entries expire a fixed time after they were last looked up.
    #[default]
    Sliding,
}

/// Resolved expiration policy used by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Never,
    Fixed { ttl: Duration },
    Sliding { ttl: Duration },
}

impl Expiration {
    pub fn ttl(&self) -> Option<Duration> {
        match *self {
            Expiration::Never => None,
            Expiration::Fixed { ttl } | Expiration::Sliding { ttl } => Some(ttl),
        }
    }

    /// Whether a lookup pushes the entry's expiry back.
    pub fn refreshes_on_access(&self) -> bool {
        matches!(self, Expiration::Sliding { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub expiration: ExpirationMode,
    /// Time-to-live in milliseconds. Ignored when `expiration` is `never`.
    pub ttl_ms: u64,
    /// How often the background sweep evicts expired entries.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: ExpirationMode::Sliding,
            ttl_ms: DEFAULT_TTL_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    pub fn never() -> Self {
        Self {
            expiration: ExpirationMode::Never,
            ..Default::default()
        }
    }

    pub fn fixed(ttl: Duration) -> Self {
        Self {
            expiration: ExpirationMode::Fixed,
            ttl_ms: duration_ms(ttl),
            ..Default::default()
        }
    }

    pub fn sliding(ttl: Duration) -> Self {
        Self {
            expiration: ExpirationMode::Sliding,
            ttl_ms: duration_ms(ttl),
            ..Default::default()
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = duration_ms(interval);
        self
    }

    pub fn expiration_policy(&self) -> Expiration {
        let ttl = Duration::from_millis(self.ttl_ms);
        match self.expiration {
            ExpirationMode::Never => Expiration::Never,
            ExpirationMode::Fixed => Expiration::Fixed { ttl },
            ExpirationMode::Sliding => Expiration::Sliding { ttl },
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<CacheConfig, ConfigError> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(CacheConfig::default()))
                .merge(Yaml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    /// Load configuration from a specific file, without environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<CacheConfig, ConfigError> {
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(CacheConfig::default()))
                .merge(Yaml::file(path.as_ref())),
        )
    }

    fn extract(figment: Figment) -> Result<CacheConfig, ConfigError> {
        let config: CacheConfig = figment.extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &CacheConfig) -> Result<(), ConfigError> {
        if config.expiration == ExpirationMode::Never {
            return Ok(());
        }

        if config.ttl_ms == 0 {
            return Err(ConfigError::ZeroTtl);
        }

        if config.sweep_interval_ms == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }

        if config.sweep_interval_ms > config.ttl_ms {
            return Err(ConfigError::SweepExceedsTtl {
                sweep_interval_ms: config.sweep_interval_ms,
                ttl_ms: config.ttl_ms,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.expiration, ExpirationMode::Sliding);
        assert_eq!(config.ttl_ms, 5000);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        assert_eq!(
            config.expiration_policy(),
            Expiration::Sliding {
                ttl: Duration::from_secs(5)
            }
        );
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_load_merges_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "expiration: fixed\nttl_ms: 2000\n")?;
            jail.set_env("RESOURCE_CACHE_SWEEP_INTERVAL_MS", "250");

            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            assert_eq!(config.expiration, ExpirationMode::Fixed);
            assert_eq!(config.ttl_ms, 2000);
            assert_eq!(config.sweep_interval_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "ttl_ms: 2000\n")?;
            jail.set_env("RESOURCE_CACHE_TTL_MS", "9000");

            let config = ConfigLoader::load().map_err(|e| e.to_string())?;
            assert_eq!(config.ttl_ms, 9000);
            assert_eq!(config.expiration, ExpirationMode::Sliding);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        Jail::expect_with(|jail| {
            jail.create_file("cache.yaml", "ttl_ms: 500\nsweep_interval_ms: 1000\n")?;

            let err = ConfigLoader::load_from_file("cache.yaml").unwrap_err();
            assert!(matches!(
                err,
                ConfigError::SweepExceedsTtl {
                    sweep_interval_ms: 1000,
                    ttl_ms: 500
                }
            ));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_mode_fails_extraction() {
        Jail::expect_with(|jail| {
            jail.create_file("cache.yaml", "expiration: forever\n")?;

            let err = ConfigLoader::load_from_file("cache.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Extract(_)));
            Ok(())
        });
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = CacheConfig {
            ttl_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTtl)
        ));

        // A cache that never expires has no use for a ttl.
        let never = CacheConfig {
            ttl_ms: 0,
            sweep_interval_ms: 0,
            ..CacheConfig::never()
        };
        assert!(ConfigLoader::validate(&never).is_ok());
    }

    #[test]
    fn test_validate_zero_sweep_interval() {
        let config = CacheConfig::fixed(Duration::from_secs(3)).with_sweep_interval(Duration::ZERO);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroSweepInterval)
        ));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = "expiration: never\n";
        let config: CacheConfig = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .expect("YAML should parse");
        assert_eq!(config.expiration_policy(), Expiration::Never);
        assert_eq!(config.expiration_policy().ttl(), None);
        assert_eq!(config.ttl_ms, DEFAULT_TTL_MS);
    }
}

use std::str::FromStr;
use std::time::Duration;

use super::errors::PoolError;

/// Connection pool configuration
///
/// Defaults match the production settings; `from_env` overrides any of them.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Idle connections kept warm by the cleanup loop
    pub min_connections: u32,

    /// Upper bound on idle + active connections
    pub max_connections: u32,

    /// Idle connections unused for longer than this are closed
    pub max_idle_time: Duration,

    /// Connections older than this are closed at the next opportunity
    pub max_lifetime: Duration,

    /// Connection creation attempts per acquire
    pub retry_attempts: u32,

    /// Base delay between creation attempts (doubles every attempt)
    pub retry_delay: Duration,

    /// Default acquire timeout
    pub connection_timeout: Duration,

    /// Period of the health-check loop
    pub health_check_interval: Duration,

    /// Start the health-check and cleanup loops
    pub enable_health_check: bool,

    /// Period of the cleanup loop
    pub cleanup_interval: Duration,

    /// How long shutdown waits for each maintenance thread
    pub shutdown_join_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 20,
            max_idle_time: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(60),
            enable_health_check: true,
            cleanup_interval: Duration::from_secs(300),
            shutdown_join_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Build configuration from `DB_POOL_*` environment variables
    ///
    /// Unset variables keep their defaults; malformed ones are rejected.
    pub fn from_env() -> Result<Self, PoolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, PoolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            min_connections: parse_or(get("DB_POOL_MIN_CONNECTIONS"), "DB_POOL_MIN_CONNECTIONS", defaults.min_connections)?,
            max_connections: parse_or(get("DB_POOL_MAX_CONNECTIONS"), "DB_POOL_MAX_CONNECTIONS", defaults.max_connections)?,
            max_idle_time: secs_or(get("DB_POOL_MAX_IDLE_TIME_SECS"), "DB_POOL_MAX_IDLE_TIME_SECS", defaults.max_idle_time)?,
            max_lifetime: secs_or(get("DB_POOL_MAX_LIFETIME_SECS"), "DB_POOL_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
            retry_attempts: parse_or(get("DB_POOL_RETRY_ATTEMPTS"), "DB_POOL_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: secs_or(get("DB_POOL_RETRY_DELAY_SECS"), "DB_POOL_RETRY_DELAY_SECS", defaults.retry_delay)?,
            connection_timeout: secs_or(
                get("DB_POOL_CONNECTION_TIMEOUT_SECS"),
                "DB_POOL_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout,
            )?,
            health_check_interval: secs_or(
                get("DB_POOL_HEALTH_CHECK_INTERVAL_SECS"),
                "DB_POOL_HEALTH_CHECK_INTERVAL_SECS",
                defaults.health_check_interval,
            )?,
            enable_health_check: match get("DB_POOL_ENABLE_HEALTH_CHECK") {
                Some(raw) => parse_bool(&raw).ok_or_else(|| invalid("DB_POOL_ENABLE_HEALTH_CHECK", &raw))?,
                None => defaults.enable_health_check,
            },
            cleanup_interval: secs_or(
                get("DB_POOL_CLEANUP_INTERVAL_SECS"),
                "DB_POOL_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval,
            )?,
            shutdown_join_timeout: defaults.shutdown_join_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pool cannot honour
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Configuration("max_connections must be at least 1".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(PoolError::Configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        let non_zero = [
            ("connection_timeout", self.connection_timeout),
            ("max_lifetime", self.max_lifetime),
            ("max_idle_time", self.max_idle_time),
            ("health_check_interval", self.health_check_interval),
            ("cleanup_interval", self.cleanup_interval),
        ];
        for (name, value) in non_zero {
            if value.is_zero() {
                return Err(PoolError::Configuration(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }

    /// Delay before creation retry number `attempt` (0-based): `retry_delay * 2^attempt`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn invalid(key: &str, raw: &str) -> PoolError {
    PoolError::Configuration(format!("{} has an invalid value: {}", key, raw))
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, PoolError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

/// Seconds as a float, e.g. `0.5`; negative, NaN and out-of-range values are rejected
fn secs_or(raw: Option<String>, key: &str, default: Duration) -> Result<Duration, PoolError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| invalid(key, &raw)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.max_idle_time, Duration::from_secs(300));
        assert_eq!(config.max_lifetime, Duration::from_secs(3600));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.health_check_interval, Duration::from_secs(60));
        assert!(config.enable_health_check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = PoolConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let config = PoolConfig {
            min_connections: 5,
            max_connections: 2,
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(PoolError::Configuration(_))));

        let config = PoolConfig {
            max_connections: 0,
            min_connections: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PoolConfig {
            connection_timeout: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DB_POOL_MIN_CONNECTIONS", "4"),
            ("DB_POOL_MAX_CONNECTIONS", " 8 "),
            ("DB_POOL_RETRY_DELAY_SECS", "0.25"),
            ("DB_POOL_ENABLE_HEALTH_CHECK", "off"),
            ("DB_POOL_CONNECTION_TIMEOUT_SECS", ""),
        ]))
        .unwrap();

        assert_eq!(config.min_connections, 4);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert!(!config.enable_health_check);
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        for (key, value) in [
            ("DB_POOL_MAX_CONNECTIONS", "abc"),
            ("DB_POOL_RETRY_ATTEMPTS", "-1"),
            ("DB_POOL_MAX_LIFETIME_SECS", "1e30"),
            ("DB_POOL_RETRY_DELAY_SECS", "-0.5"),
            ("DB_POOL_HEALTH_CHECK_INTERVAL_SECS", "NaN"),
            ("DB_POOL_ENABLE_HEALTH_CHECK", "maybe"),
        ] {
            let result = PoolConfig::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(&result, Err(PoolError::Configuration(msg)) if msg.contains(key)),
                "{}={} gave {:?}",
                key,
                value,
                result
            );
        }
    }

    #[test]
    fn test_from_lookup_validates_bounds() {
        let result = PoolConfig::from_lookup(lookup(&[
            ("DB_POOL_MIN_CONNECTIONS", "10"),
            ("DB_POOL_MAX_CONNECTIONS", "2"),
        ]));
        assert!(matches!(result, Err(PoolError::Configuration(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}

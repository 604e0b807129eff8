//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::topics::DEFAULT_CONSUMER_GROUP;
use event_bus::DEFAULT_MAX_PAYLOAD_BYTES;
use projections::RetryPolicy;

/// Upper bound on a single retry backoff.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Server and pipeline configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL URL for the plan repository; kept in memory when unset
/// - `PARTITION_COUNT` — partitions per topic (default: `4`)
/// - `CONSUMER_GROUP` — read-side consumer group (default: `"$Default"`)
/// - `MAX_EVENT_BYTES` — largest accepted event payload (default: 1 MiB)
/// - `RETRY_MAX_ATTEMPTS` — projection apply attempts (default: `3`)
/// - `RETRY_BASE_DELAY_MS` — first retry backoff (default: `1000`)
/// - `STALL_BACKOFF_MS` — wait before resubscribing a stalled partition (default: `5000`)
/// - `APP_PROFILE` — sample data is loaded unless this is `"prod"` (default: `"dev"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub partition_count: u32,
    pub consumer_group: String,
    pub max_event_bytes: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub stall_backoff: Duration,
    pub profile: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            partition_count: parse_or(&lookup, "PARTITION_COUNT", defaults.partition_count).max(1),
            consumer_group: lookup("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            max_event_bytes: parse_or(&lookup, "MAX_EVENT_BYTES", defaults.max_event_bytes),
            retry_max_attempts: parse_or(
                &lookup,
                "RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            ),
            retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                "RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            stall_backoff: Duration::from_millis(parse_or(
                &lookup,
                "STALL_BACKOFF_MS",
                defaults.stall_backoff.as_millis() as u64,
            )),
            profile: lookup("APP_PROFILE").unwrap_or(defaults.profile),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for projection applies.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            self.retry_base_delay,
            RETRY_MAX_DELAY,
        )
    }

    /// Whether the sample plans are loaded on startup.
    pub fn seed_sample_data(&self) -> bool {
        !self.profile.eq_ignore_ascii_case("prod")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            partition_count: 4,
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            max_event_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            stall_backoff: Duration::from_millis(5000),
            profile: "dev".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.partition_count, 4);
        assert_eq!(config.consumer_group, "$Default");
        assert_eq!(config.max_event_bytes, 1024 * 1024);
        assert!(config.seed_sample_data());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/plans"),
            ("PARTITION_COUNT", "8"),
            ("CONSUMER_GROUP", "query-side"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_BASE_DELAY_MS", "250"),
            ("STALL_BACKOFF_MS", "100"),
            ("APP_PROFILE", "prod"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/plans")
        );
        assert_eq!(config.partition_count, 8);
        assert_eq!(config.consumer_group, "query-side");
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(5, Duration::from_millis(250), Duration::from_secs(30))
        );
        assert_eq!(config.stall_backoff, Duration::from_millis(100));
        assert!(!config.seed_sample_data());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "not-a-port"), ("PARTITION_COUNT", "0")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.partition_count, 1);
    }

    #[test]
    fn test_durations_tolerate_surrounding_whitespace() {
        let config = from_pairs(&[
            ("RETRY_BASE_DELAY_MS", " 500"),
            ("STALL_BACKOFF_MS", "250 "),
        ]);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert_eq!(config.stall_backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_blank_database_url_is_ignored() {
        assert_eq!(from_pairs(&[("DATABASE_URL", "  ")]).database_url, None);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }
}

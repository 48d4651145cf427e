use std::str::FromStr;
use std::time::Duration;

use crate::model::Amount;

pub const DEFAULT_CAPACITY: u32 = 12;
pub const DEFAULT_RESERVATION_PROBABILITY: f64 = 0.15;
pub const DEFAULT_HOURLY_RATE: Amount = Amount(50);
pub const DEFAULT_CURRENCY_PREFIX: &str = "₹";
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_SYNC_QUEUE_CAPACITY: usize = 1024;

/// Shortest plate accepted at registration, counted in Unicode scalar
/// values (`char`s), not bytes or UTF-16 units.
pub const MIN_PLATE_LEN: usize = 3;

/// Ledger behaviour knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub capacity: u32,
    /// Chance that any one slot is drawn as reserved at initialization.
    pub reservation_probability: f64,
    pub hourly_rate: Amount,
    pub currency_prefix: String,
    /// Seed for the reservation draw. Entropy when `None`.
    pub seed: Option<u64>,
    /// Fall back to the demo vehicles when the directory can't seed us.
    pub demo_seed: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            reservation_probability: DEFAULT_RESERVATION_PROBABILITY,
            hourly_rate: DEFAULT_HOURLY_RATE,
            currency_prefix: DEFAULT_CURRENCY_PREFIX.to_string(),
            seed: None,
            demo_seed: true,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            capacity: parse(&lookup, "PARKLEDGER_CAPACITY").unwrap_or(defaults.capacity),
            reservation_probability: parse::<f64>(&lookup, "PARKLEDGER_RESERVATION_PROBABILITY")
                .filter(|p| (0.0..=1.0).contains(p))
                .unwrap_or(defaults.reservation_probability),
            hourly_rate: parse(&lookup, "PARKLEDGER_HOURLY_RATE")
                .map(Amount)
                .unwrap_or(defaults.hourly_rate),
            currency_prefix: lookup("PARKLEDGER_CURRENCY_PREFIX").unwrap_or(defaults.currency_prefix),
            seed: parse(&lookup, "PARKLEDGER_SEED"),
            demo_seed: parse(&lookup, "PARKLEDGER_DEMO_SEED").unwrap_or(defaults.demo_seed),
        }
    }
}

/// Settings for the host process around the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL of the directory service. Offline when `None`.
    pub directory_url: Option<String>,
    pub health_interval: Duration,
    pub directory_timeout: Duration,
    pub metrics_port: Option<u16>,
    pub sync_queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            directory_url: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            directory_timeout: DEFAULT_DIRECTORY_TIMEOUT,
            metrics_port: None,
            sync_queue_capacity: DEFAULT_SYNC_QUEUE_CAPACITY,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            directory_url: lookup("PARKLEDGER_DIRECTORY_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            health_interval: parse::<u64>(&lookup, "PARKLEDGER_HEALTH_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.health_interval),
            directory_timeout: parse::<u64>(&lookup, "PARKLEDGER_DIRECTORY_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.directory_timeout),
            metrics_port: parse(&lookup, "PARKLEDGER_METRICS_PORT"),
            sync_queue_capacity: parse::<usize>(&lookup, "PARKLEDGER_SYNC_QUEUE")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sync_queue_capacity),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        assert_eq!(LedgerConfig::from_lookup(|_| None), LedgerConfig::default());
        assert_eq!(ServiceConfig::from_lookup(|_| None), ServiceConfig::default());
    }

    #[test]
    fn ledger_values_parsed() {
        let cfg = LedgerConfig::from_lookup(lookup_from(&[
            ("PARKLEDGER_CAPACITY", "20"),
            ("PARKLEDGER_RESERVATION_PROBABILITY", "0.5"),
            ("PARKLEDGER_HOURLY_RATE", "75"),
            ("PARKLEDGER_CURRENCY_PREFIX", "$"),
            ("PARKLEDGER_SEED", "7"),
            ("PARKLEDGER_DEMO_SEED", "false"),
        ]));
        assert_eq!(cfg.capacity, 20);
        assert_eq!(cfg.reservation_probability, 0.5);
        assert_eq!(cfg.hourly_rate, Amount(75));
        assert_eq!(cfg.currency_prefix, "$");
        assert_eq!(cfg.seed, Some(7));
        assert!(!cfg.demo_seed);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = LedgerConfig::from_lookup(lookup_from(&[
            ("PARKLEDGER_CAPACITY", "twelve"),
            ("PARKLEDGER_RESERVATION_PROBABILITY", "1.5"),
            ("PARKLEDGER_HOURLY_RATE", "-3"),
        ]));
        assert_eq!(cfg.capacity, DEFAULT_CAPACITY);
        assert_eq!(cfg.reservation_probability, DEFAULT_RESERVATION_PROBABILITY);
        assert_eq!(cfg.hourly_rate, DEFAULT_HOURLY_RATE);
    }

    #[test]
    fn service_values_parsed() {
        let cfg = ServiceConfig::from_lookup(lookup_from(&[
            ("PARKLEDGER_DIRECTORY_URL", "http://localhost:8080/"),
            ("PARKLEDGER_HEALTH_INTERVAL_SECS", "5"),
            ("PARKLEDGER_DIRECTORY_TIMEOUT_MS", "250"),
            ("PARKLEDGER_METRICS_PORT", "9100"),
            ("PARKLEDGER_SYNC_QUEUE", "0"),
        ]));
        assert_eq!(cfg.directory_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(cfg.health_interval, Duration::from_secs(5));
        assert_eq!(cfg.directory_timeout, Duration::from_millis(250));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.sync_queue_capacity, DEFAULT_SYNC_QUEUE_CAPACITY);
    }
}

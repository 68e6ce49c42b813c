//! Configuration file parsing and management.
//!
//! Settings come from four layers, highest precedence first: explicit CLI
//! flags, `DV_*` environment variables, TOML config files, and the
//! [`VerifyConfig`] defaults. This module handles the two middle layers.

use crate::error::DomainVerifyError;
use crate::types::{VerifyConfig, WhoisErrorPolicy};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [dns]
/// timeout = "3s"
/// concurrency = 10
///
/// [whois]
/// timeout = "10s"
/// delay = "1.5s"
/// backoff = "5s"
/// on_error = "trust_dns"
///
/// [cache]
/// enabled = true
/// file = "data/results/checked_cache.json"
/// ttl = "24h"
///
/// [checkpoint]
/// file = "data/results/.intermediate_results.json"
/// interval = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointSection>,
}

/// `[dns]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DnsSection {
    /// Per-probe timeout, e.g. "3s"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Probes in flight at once (1-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// `[whois]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WhoisSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Base spacing between queries, e.g. "1.5s"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,

    /// Sleep before retrying a rate-limited query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error: Option<WhoisErrorPolicy>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Maximum entry age, e.g. "24h"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

/// `[checkpoint]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// WHOIS-finalized results between checkpoint writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<usize>,
}

/// Field-by-field overlay, `higher` wins where it has a value.
macro_rules! overlay {
    ($lower:expr, $higher:expr, $($field:ident),+) => {
        match ($lower, $higher) {
            (Some(mut lower), Some(higher)) => {
                $(
                    if higher.$field.is_some() {
                        lower.$field = higher.$field;
                    }
                )+
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        }
    };
}

impl FileConfig {
    /// Layer this file's settings on top of `config`.
    ///
    /// Assumes the file passed validation, so every duration parses.
    pub fn apply_to(&self, mut config: VerifyConfig) -> VerifyConfig {
        if let Some(dns) = &self.dns {
            if let Some(timeout) = dns.timeout.as_deref().and_then(parse_duration) {
                config = config.with_dns_timeout(timeout);
            }
            if let Some(concurrency) = dns.concurrency {
                config = config.with_max_concurrent(concurrency);
            }
        }

        if let Some(whois) = &self.whois {
            if let Some(timeout) = whois.timeout.as_deref().and_then(parse_duration) {
                config = config.with_whois_timeout(timeout);
            }
            if let Some(delay) = whois.delay.as_deref().and_then(parse_duration) {
                config = config.with_whois_delay(delay);
            }
            if let Some(backoff) = whois.backoff.as_deref().and_then(parse_duration) {
                config = config.with_whois_backoff(backoff);
            }
            if let Some(policy) = whois.on_error {
                config = config.with_whois_error_policy(policy);
            }
        }

        if let Some(cache) = &self.cache {
            if let Some(file) = &cache.file {
                config = config.with_cache_file(file);
            }
            if let Some(ttl) = cache.ttl.as_deref().and_then(parse_duration) {
                config = config.with_cache_ttl(ttl);
            }
            if cache.enabled == Some(false) {
                config = config.without_cache();
            }
        }

        if let Some(checkpoint) = &self.checkpoint {
            if let Some(file) = &checkpoint.file {
                config = config.with_checkpoint_file(file);
            }
            if let Some(interval) = checkpoint.interval {
                config = config.with_checkpoint_interval(interval);
            }
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate a single configuration file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainVerifyError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            DomainVerifyError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainVerifyError::config(format!(
                "Failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Discover configuration files in precedence order and merge them.
    ///
    /// Looks at the XDG config dir, then the home directory, then the
    /// current directory; later files override earlier ones field by field.
    /// A file that fails to parse or validate is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainVerifyError> {
        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        let mut merged = FileConfig::default();
        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            if self.verbose {
                eprintln!("Using config file {}", path.display());
            }
            merged = self.merge_configs(merged, config);
        }

        Ok(merged)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domain-verify.toml", "./.domain-verify.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-verify.toml", "domain-verify.toml"]
            .iter()
            .map(|name| Path::new(&home).join(name))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-verify").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations; values from `higher` take precedence.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            dns: overlay!(lower.dns, higher.dns, timeout, concurrency),
            whois: overlay!(lower.whois, higher.whois, timeout, delay, backoff, on_error),
            cache: overlay!(lower.cache, higher.cache, enabled, file, ttl),
            checkpoint: overlay!(lower.checkpoint, higher.checkpoint, file, interval),
        }
    }

    /// Reject out-of-range numbers and unparseable durations.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), DomainVerifyError> {
        let mut durations: Vec<(&str, &Option<String>)> = Vec::new();

        if let Some(dns) = &config.dns {
            if let Some(concurrency) = dns.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(DomainVerifyError::config(
                        "dns.concurrency must be between 1 and 100",
                    ));
                }
            }
            durations.push(("dns.timeout", &dns.timeout));
        }

        if let Some(whois) = &config.whois {
            durations.push(("whois.timeout", &whois.timeout));
            durations.push(("whois.delay", &whois.delay));
            durations.push(("whois.backoff", &whois.backoff));
        }

        if let Some(cache) = &config.cache {
            durations.push(("cache.ttl", &cache.ttl));
        }

        if let Some(checkpoint) = &config.checkpoint {
            if checkpoint.interval == Some(0) {
                return Err(DomainVerifyError::config(
                    "checkpoint.interval must be at least 1",
                ));
            }
        }

        for (key, value) in durations {
            if let Some(value) = value {
                if parse_duration(value).is_none() {
                    return Err(DomainVerifyError::config(format!(
                        "Invalid duration '{}' for {}. Use a format like '3s', '1.5s', '2m', '24h'",
                        value, key
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Settings taken from `DV_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub dns_timeout: Option<Duration>,
    pub concurrency: Option<usize>,
    pub whois_delay: Option<Duration>,
    pub whois_timeout: Option<Duration>,
    pub cache_file: Option<PathBuf>,
    pub cache_ttl: Option<Duration>,
    pub no_cache: Option<bool>,
    pub checkpoint_file: Option<PathBuf>,
}

impl EnvConfig {
    /// Layer the environment settings on top of `config`.
    pub fn apply_to(&self, mut config: VerifyConfig) -> VerifyConfig {
        if let Some(timeout) = self.dns_timeout {
            config = config.with_dns_timeout(timeout);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_max_concurrent(concurrency);
        }
        if let Some(delay) = self.whois_delay {
            config = config.with_whois_delay(delay);
        }
        if let Some(timeout) = self.whois_timeout {
            config = config.with_whois_timeout(timeout);
        }
        if let Some(file) = &self.cache_file {
            config = config.with_cache_file(file);
        }
        if let Some(ttl) = self.cache_ttl {
            config = config.with_cache_ttl(ttl);
        }
        if self.no_cache == Some(true) {
            config = config.without_cache();
        }
        if let Some(file) = &self.checkpoint_file {
            config = config.with_checkpoint_file(file);
        }
        config
    }
}

/// Load configuration from `DV_*` environment variables.
///
/// Invalid values are logged and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let duration = |key: &str| {
        let raw = lookup(key)?;
        let parsed = parse_duration(&raw);
        if parsed.is_none() {
            warn!(key, value = %raw, "ignoring invalid duration");
        }
        parsed
    };
    let path = |key: &str| {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    };

    let concurrency = lookup("DV_CONCURRENCY").and_then(|raw| match raw.trim().parse::<usize>() {
        Ok(n) if (1..=100).contains(&n) => Some(n),
        _ => {
            warn!(value = %raw, "ignoring DV_CONCURRENCY, must be 1-100");
            None
        }
    });

    let no_cache = lookup("DV_NO_CACHE").and_then(|raw| match parse_bool(&raw) {
        Some(flag) => Some(flag),
        None => {
            warn!(value = %raw, "ignoring DV_NO_CACHE, use true/false");
            None
        }
    });

    EnvConfig {
        dns_timeout: duration("DV_DNS_TIMEOUT"),
        concurrency,
        whois_delay: duration("DV_WHOIS_DELAY"),
        whois_timeout: duration("DV_WHOIS_TIMEOUT"),
        cache_file: path("DV_CACHE_FILE"),
        cache_ttl: duration("DV_CACHE_TTL"),
        no_cache,
        checkpoint_file: path("DV_CHECKPOINT_FILE"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration like "3s", "1.5s", "500ms", "2m" or "24h".
///
/// A bare number means seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    // (number, multiplier, divisor) to seconds
    let (number, mul, div) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, 1.0, 1000.0)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, 1.0, 1.0)
    } else if let Some(m) = value.strip_suffix('m') {
        (m, 60.0, 1.0)
    } else if let Some(h) = value.strip_suffix('h') {
        (h, 3600.0, 1.0)
    } else {
        (value.as_str(), 1.0, 1.0)
    };

    let number: f64 = number.trim().parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(number * mul / div))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("24h"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(
            r#"
[dns]
timeout = "2s"
concurrency = 25

[whois]
delay = "1.5s"
on_error = "mark_unknown"

[cache]
ttl = "12h"
file = "/tmp/dv-cache.json"

[checkpoint]
interval = 5
"#,
        );

        let config = ConfigManager::new(false).load_file(file.path()).unwrap();
        assert_eq!(config.dns.as_ref().unwrap().concurrency, Some(25));

        let verify = config.apply_to(VerifyConfig::default());
        assert_eq!(verify.dns_timeout, Duration::from_secs(2));
        assert_eq!(verify.max_concurrent, 25);
        assert_eq!(verify.whois_delay, Duration::from_millis(1500));
        assert_eq!(verify.whois_error_policy, WhoisErrorPolicy::MarkUnknown);
        assert_eq!(verify.cache_ttl, Duration::from_secs(12 * 3600));
        assert_eq!(verify.cache_file, PathBuf::from("/tmp/dv-cache.json"));
        assert_eq!(verify.checkpoint_interval, 5);
        // Untouched fields keep their defaults
        assert_eq!(verify.whois_timeout, Duration::from_secs(10));
        assert!(verify.use_cache);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let manager = ConfigManager::new(false);

        for content in [
            "[dns]\nconcurrency = 0\n",
            "[whois]\ndelay = \"fast\"\n",
            "[checkpoint]\ninterval = 0\n",
            "[dns\n",
        ] {
            let file = write_config(content);
            assert!(
                matches!(
                    manager.load_file(file.path()),
                    Err(DomainVerifyError::ConfigError { .. })
                ),
                "accepted {:?}",
                content
            );
        }

        assert!(matches!(
            manager.load_file("/nonexistent/domain-verify.toml"),
            Err(DomainVerifyError::FileError { .. })
        ));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            dns: Some(DnsSection {
                timeout: Some("5s".to_string()),
                concurrency: Some(10),
            }),
            cache: Some(CacheSection {
                enabled: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let higher = FileConfig {
            dns: Some(DnsSection {
                concurrency: Some(50),
                ..Default::default()
            }),
            checkpoint: Some(CheckpointSection {
                interval: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = manager.merge_configs(lower, higher);
        let dns = merged.dns.unwrap();
        assert_eq!(dns.concurrency, Some(50));
        assert_eq!(dns.timeout, Some("5s".to_string()));
        assert_eq!(merged.cache.unwrap().enabled, Some(true));
        assert_eq!(merged.checkpoint.unwrap().interval, Some(3));
    }

    #[test]
    fn test_cache_can_be_disabled_from_file() {
        let file = write_config("[cache]\nenabled = false\n");
        let config = ConfigManager::new(false).load_file(file.path()).unwrap();
        assert!(!config.apply_to(VerifyConfig::default()).use_cache);
    }

    #[test]
    fn test_env_config() {
        let vars: HashMap<&str, &str> = [
            ("DV_DNS_TIMEOUT", "4s"),
            ("DV_CONCURRENCY", "20"),
            ("DV_WHOIS_DELAY", "2.5"),
            ("DV_CACHE_TTL", "1h"),
            ("DV_NO_CACHE", "yes"),
            ("DV_CHECKPOINT_FILE", "/tmp/checkpoint.json"),
        ]
        .into_iter()
        .collect();

        let env = env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env.dns_timeout, Some(Duration::from_secs(4)));
        assert_eq!(env.concurrency, Some(20));
        assert_eq!(env.whois_delay, Some(Duration::from_millis(2500)));
        assert_eq!(env.whois_timeout, None);

        let verify = env.apply_to(VerifyConfig::default());
        assert!(!verify.use_cache);
        assert_eq!(verify.cache_ttl, Duration::from_secs(3600));
        assert_eq!(verify.checkpoint_file, PathBuf::from("/tmp/checkpoint.json"));
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let vars: HashMap<&str, &str> = [
            ("DV_CONCURRENCY", "500"),
            ("DV_DNS_TIMEOUT", "quick"),
            ("DV_NO_CACHE", "maybe"),
            ("DV_CACHE_FILE", "  "),
        ]
        .into_iter()
        .collect();

        let env = env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env, EnvConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            dns: Some(DnsSection {
                timeout: Some("5s".to_string()),
                concurrency: Some(10),
            }),
            ..Default::default()
        };
        let env = EnvConfig {
            dns_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };

        let config = env.apply_to(file.apply_to(VerifyConfig::default()));
        assert_eq!(config.dns_timeout, Duration::from_secs(1));
        assert_eq!(config.max_concurrent, 10);
    }
}

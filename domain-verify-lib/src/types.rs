//! Core data types for domain availability verification.
//!
//! This module defines the verdicts, check results, cache entries and
//! checkpoints that flow through the pipeline, plus the configuration
//! struct that tunes every stage.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Registration status of a domain as far as the pipeline could tell.
///
/// `Unknown` means the check could not decide. It is never a positive
/// signal and is never written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Domain looks unregistered
    Available,
    /// Domain is registered or in use
    Unavailable,
    /// Status could not be determined
    Unknown,
}

impl Verdict {
    /// Convert a definite boolean outcome into a verdict.
    pub fn from_available(available: bool) -> Self {
        if available {
            Verdict::Available
        } else {
            Verdict::Unavailable
        }
    }

    /// The boolean form used in JSON files: `None` for `Unknown`.
    pub fn as_available(&self) -> Option<bool> {
        match self {
            Verdict::Available => Some(true),
            Verdict::Unavailable => Some(false),
            Verdict::Unknown => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Verdict::Available)
    }

    pub fn is_definite(&self) -> bool {
        !matches!(self, Verdict::Unknown)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Available => write!(f, "available"),
            Verdict::Unavailable => write!(f, "unavailable"),
            Verdict::Unknown => write!(f, "unknown"),
        }
    }
}

/// Stage of the pipeline that produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Method {
    /// Served from the result cache
    #[serde(rename = "cache")]
    Cache,

    /// Decided by the DNS pre-filter
    #[serde(rename = "dns")]
    Dns,

    /// Decided by a WHOIS lookup
    #[serde(rename = "whois")]
    Whois,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Cache => write!(f, "cache"),
            Method::Dns => write!(f, "dns"),
            Method::Whois => write!(f, "whois"),
        }
    }
}

/// Result of checking one requested domain.
///
/// Serialized as `{domain, available, method, cached, error?}` where
/// `available` is `true`, `false` or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The domain name that was checked (e.g., "example.com")
    pub domain: String,

    /// Registration verdict
    #[serde(rename = "available", with = "verdict_as_available")]
    pub verdict: Verdict,

    /// Which stage produced the verdict
    pub method: Method,

    /// Whether the verdict came from the cache
    pub cached: bool,

    /// Error swallowed while producing the verdict, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    /// A freshly computed result with no error attached.
    pub fn fresh<D: Into<String>>(domain: D, verdict: Verdict, method: Method) -> Self {
        Self {
            domain: domain.into(),
            verdict,
            method,
            cached: false,
            error: None,
        }
    }

    /// A result served from a cache entry.
    pub fn from_cache(entry: &CacheEntry) -> Self {
        Self {
            domain: entry.domain.clone(),
            verdict: Verdict::from_available(entry.available),
            method: Method::Cache,
            cached: true,
            error: None,
        }
    }

    pub fn with_error<E: Into<String>>(mut self, error: E) -> Self {
        self.error = Some(error.into());
        self
    }
}

mod verdict_as_available {
    use super::Verdict;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(verdict: &Verdict, serializer: S) -> Result<S::Ok, S::Error> {
        verdict.as_available().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Verdict, D::Error> {
        let available = Option::<bool>::deserialize(deserializer)?;
        Ok(available.map_or(Verdict::Unknown, Verdict::from_available))
    }
}

/// A definite outcome remembered by the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Filled from the map key when the cache file is loaded
    #[serde(skip)]
    pub domain: String,

    /// Boolean availability; `Unknown` is never cached
    pub available: bool,

    /// Stage that originally produced the outcome (`dns` or `whois`)
    pub method: Method,

    /// When the outcome was recorded; offset-less timestamps read as local time
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub checked_at: DateTime<Utc>,
}

/// Parse an ISO-8601 timestamp, with or without a UTC offset.
///
/// Timestamps without an offset are taken to be in local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

fn deserialize_timestamp<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Counts reported by [`ResultCache::stats`](crate::ResultCache::stats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub available_domains: usize,
    pub unavailable_domains: usize,
}

/// Snapshot of batch progress written for manual crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Number of results finalized when the snapshot was taken
    pub checked_count: usize,

    /// Number of entries in `available_domains`
    pub available_count: usize,

    /// Available results found so far, in the order they were finalized
    pub available_domains: Vec<CheckResult>,
}

/// Detailed registration information parsed from a WHOIS reply.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DomainInfo {
    /// The registrar that manages this domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    /// When the domain was first registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    /// When the domain registration expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    /// Last update date of the domain record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,

    /// Domain status codes (e.g., "clientTransferProhibited")
    pub status: Vec<String>,

    /// Nameservers associated with the domain
    pub nameservers: Vec<String>,
}

/// Batch phase reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "whois")]
    Whois,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Cache => write!(f, "cache"),
            Phase::Dns => write!(f, "dns"),
            Phase::Whois => write!(f, "whois"),
        }
    }
}

/// What the orchestrator does when the WHOIS verifier fails outright
/// (as opposed to answering `Unknown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhoisErrorPolicy {
    /// Keep the DNS signal: report `Available` and attach the error text
    #[default]
    TrustDns,

    /// Report `Unknown` and attach the error text
    MarkUnknown,
}

/// Configuration options for the verification pipeline.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Per-probe DNS timeout
    /// Default: 3 seconds
    pub dns_timeout: Duration,

    /// Maximum DNS probes in flight at once
    /// Default: 10, Range: 1-100
    pub max_concurrent: usize,

    /// Per-query WHOIS timeout
    /// Default: 10 seconds
    pub whois_timeout: Duration,

    /// Minimum spacing between WHOIS queries before error penalties
    /// Default: 1.5 seconds
    pub whois_delay: Duration,

    /// Sleep before the single retry of a rate-limited WHOIS query
    /// Default: 5 seconds
    pub whois_backoff: Duration,

    /// Handling of WHOIS verifier failures during a batch
    /// Default: trust the DNS signal
    pub whois_error_policy: WhoisErrorPolicy,

    /// Whether finalized results are cached at all
    /// Default: true
    pub use_cache: bool,

    /// Backing file for the result cache
    pub cache_file: PathBuf,

    /// Maximum age of a cache entry
    /// Default: 24 hours
    pub cache_ttl: Duration,

    /// Where crash-recovery checkpoints are written
    pub checkpoint_file: PathBuf,

    /// WHOIS-finalized results between two checkpoint writes
    /// Default: 10
    pub checkpoint_interval: usize,
}

pub const DEFAULT_CACHE_FILE: &str = "data/results/checked_cache.json";
pub const DEFAULT_CHECKPOINT_FILE: &str = "data/results/.intermediate_results.json";

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            dns_timeout: Duration::from_secs(3),
            max_concurrent: 10,
            whois_timeout: Duration::from_secs(10),
            whois_delay: Duration::from_millis(1500),
            whois_backoff: Duration::from_secs(5),
            whois_error_policy: WhoisErrorPolicy::TrustDns,
            use_cache: true,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            checkpoint_file: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            checkpoint_interval: 10,
        }
    }
}

impl VerifyConfig {
    /// Set the DNS probe concurrency, capped at 100.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.clamp(1, 100);
        self
    }

    pub fn with_dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Set the base spacing between WHOIS queries.
    pub fn with_whois_delay(mut self, delay: Duration) -> Self {
        self.whois_delay = delay;
        self
    }

    pub fn with_whois_backoff(mut self, backoff: Duration) -> Self {
        self.whois_backoff = backoff;
        self
    }

    pub fn with_whois_error_policy(mut self, policy: WhoisErrorPolicy) -> Self {
        self.whois_error_policy = policy;
        self
    }

    pub fn with_cache_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_file = path.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Disable the result cache entirely.
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_checkpoint_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.checkpoint_file = path.into();
        self
    }

    /// Set how many WHOIS-finalized results trigger a checkpoint (at least 1).
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_json_shape() {
        let result = CheckResult::fresh("abc.com", Verdict::Available, Method::Whois)
            .with_error("whois exploded");
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["domain"], "abc.com");
        assert_eq!(json["available"], true);
        assert_eq!(json["method"], "whois");
        assert_eq!(json["cached"], false);
        assert_eq!(json["error"], "whois exploded");
    }

    #[test]
    fn test_unknown_serializes_as_null_and_omits_error() {
        let result = CheckResult::fresh("abc.com", Verdict::Unknown, Method::Dns);
        let json = serde_json::to_value(&result).unwrap();

        assert!(json["available"].is_null());
        assert!(json.get("error").is_none());

        let back: CheckResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.verdict, Verdict::Unknown);
    }

    #[test]
    fn test_verdict_boolean_forms() {
        assert_eq!(Verdict::from_available(true), Verdict::Available);
        assert_eq!(Verdict::from_available(false), Verdict::Unavailable);
        assert_eq!(Verdict::Unknown.as_available(), None);
        assert!(!Verdict::Unknown.is_definite());
        assert!(!Verdict::Unknown.is_available());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let utc = parse_timestamp("2026-10-19T18:47:44.617310+00:00").unwrap();
        assert_eq!(utc, parse_timestamp("2026-10-19T18:47:44.617310Z").unwrap());

        let naive = NaiveDateTime::parse_from_str("2026-10-19T18:47:44", "%Y-%m-%dT%H:%M:%S").unwrap();
        let expected = Local.from_local_datetime(&naive).earliest().unwrap().with_timezone(&Utc);
        assert_eq!(parse_timestamp("2026-10-19T18:47:44").unwrap(), expected);
        assert!(parse_timestamp("2026-10-19T18:47:44.617310").is_some());
        assert!(parse_timestamp("2026-10-19 18:47:44").is_some());

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_config_builders_clamp() {
        let config = VerifyConfig::default()
            .with_max_concurrent(0)
            .with_checkpoint_interval(0);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.checkpoint_interval, 1);

        let config = VerifyConfig::default().with_max_concurrent(500);
        assert_eq!(config.max_concurrent, 100);
    }

    #[test]
    fn test_default_config() {
        let config = VerifyConfig::default();
        assert_eq!(config.dns_timeout, Duration::from_secs(3));
        assert_eq!(config.whois_delay, Duration::from_millis(1500));
        assert_eq!(config.whois_backoff, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.whois_error_policy, WhoisErrorPolicy::TrustDns);
        assert!(config.use_cache);
    }
}

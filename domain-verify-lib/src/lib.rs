//! # Domain Verify Library
//!
//! Decides whether domain names are available for registration, at the
//! scale of thousands of names per batch.
//!
//! A cheap DNS probe filters out names that obviously resolve; only the
//! names that look free are confirmed with WHOIS, which is slow and rate
//! limited. Definite outcomes are cached on disk with a TTL, and long
//! batches write periodic checkpoints so a killed run is not wasted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_verify_lib::{AvailabilityChecker, NoProgress, VerifyConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = VerifyConfig::default()
//!         .with_max_concurrent(20)
//!         .with_whois_delay(Duration::from_secs(2));
//!     let mut checker = AvailabilityChecker::with_config(config);
//!
//!     let domains = vec!["google.com".to_string(), "abcxyz9912.com".to_string()];
//!     for result in checker.check_batch(&domains, true, &mut NoProgress).await {
//!         println!("{} -> {} ({})", result.domain, result.verdict, result.method);
//!     }
//! }
//! ```
//!
//! ## Verdicts
//!
//! Every result carries a tri-state [`Verdict`]: `Available`, `Unavailable`
//! or `Unknown`. `Unknown` means the evidence was inconclusive (a DNS
//! timeout, an unsupported TLD, a rate limit that outlived the retry) and
//! is never cached.

pub use cache::ResultCache;
pub use checker::AvailabilityChecker;
pub use checkpoint::CheckpointStore;
pub use config::{
    load_env_config, parse_duration, CacheSection, CheckpointSection, ConfigManager, DnsSection,
    EnvConfig, FileConfig, WhoisSection,
};
pub use error::DomainVerifyError;
pub use progress::{NoProgress, ProgressCallbacks, ProgressReporter};
pub use protocols::{
    classify_dns_outcome, parse_domain_info, DnsLookup, DnsOutcome, DnsProber, HickoryLookup,
    PatternClassifier, WhoisClass, WhoisClassifier, WhoisClient, WhoisLookup, WhoisReply,
    WhoisSignal, WhoisVerifier,
};
pub use types::{
    parse_timestamp, CacheEntry, CacheStats, CheckResult, Checkpoint, DomainInfo, Method, Phase,
    Verdict, VerifyConfig, WhoisErrorPolicy, DEFAULT_CACHE_FILE, DEFAULT_CHECKPOINT_FILE,
};
pub use utils::{
    expand_domain_inputs, is_valid_fqdn, normalize_domain, read_domain_file, validate_domain,
    word_tld_combinations, DEFAULT_TLD,
};

mod cache;
mod checker;
mod checkpoint;
mod config;
mod error;
mod progress;
mod protocols;
mod types;
mod utils;

pub type Result<T> = std::result::Result<T, DomainVerifyError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

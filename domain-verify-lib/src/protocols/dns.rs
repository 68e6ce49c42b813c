//! DNS pre-filter for domain availability.
//!
//! A single A-record lookup is a fast but noisy availability signal. This
//! module runs those lookups with a bounded number in flight and maps each
//! raw resolver outcome onto a [`Verdict`]. Nothing is retried here: an
//! `Unknown` is an acceptable answer from this stage.

use crate::types::Verdict;
use futures::stream::{self, StreamExt};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// What the resolver reported for an A-record query, before any
/// availability inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOutcome {
    /// At least one address record came back
    Resolved,
    /// The name does not exist
    NxDomain,
    /// The name exists but has no A record
    NoAnswer,
    /// Every nameserver refused or failed to serve the name
    NoNameservers,
    /// No answer within the probe timeout
    Timeout,
    /// Any other resolver failure
    Failed(String),
}

/// Map a resolver outcome onto an availability verdict.
///
/// | outcome         | verdict     |
/// |-----------------|-------------|
/// | `Resolved`      | Unavailable |
/// | `NxDomain`      | Available   |
/// | `NoAnswer`      | Unavailable |
/// | `NoNameservers` | Available   |
/// | anything else   | Unknown     |
pub fn classify_dns_outcome(outcome: &DnsOutcome) -> Verdict {
    match outcome {
        DnsOutcome::Resolved => Verdict::Unavailable,
        DnsOutcome::NxDomain => Verdict::Available,
        DnsOutcome::NoAnswer => Verdict::Unavailable,
        DnsOutcome::NoNameservers => Verdict::Available,
        DnsOutcome::Timeout | DnsOutcome::Failed(_) => Verdict::Unknown,
    }
}

/// Backend that performs a single A-record query.
pub trait DnsLookup {
    fn lookup(&self, domain: &str) -> impl Future<Output = DnsOutcome> + Send;
}

/// [`DnsLookup`] backed by `hickory-resolver` and the system resolver configuration.
#[derive(Clone)]
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Build a resolver from the system configuration, falling back to the
    /// library defaults when it cannot be read.
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "could not read system resolver config, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl DnsLookup for HickoryLookup {
    async fn lookup(&self, domain: &str) -> DnsOutcome {
        // Trailing dot keeps search domains out of the query
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        match self.resolver.ipv4_lookup(fqdn).await {
            Ok(_) => DnsOutcome::Resolved,
            Err(e) => outcome_from_error(&e),
        }
    }
}

fn outcome_from_error(err: &ResolveError) -> DnsOutcome {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => DnsOutcome::NxDomain,
            ResponseCode::ServFail | ResponseCode::Refused => DnsOutcome::NoNameservers,
            ResponseCode::NoError => DnsOutcome::NoAnswer,
            other => DnsOutcome::Failed(format!("unexpected response code {}", other)),
        },
        ResolveErrorKind::Timeout => DnsOutcome::Timeout,
        _ => DnsOutcome::Failed(err.to_string()),
    }
}

/// Bounded-concurrency DNS prober.
pub struct DnsProber<L = HickoryLookup> {
    lookup: L,
    timeout: Duration,
    max_concurrent: usize,
}

impl DnsProber<HickoryLookup> {
    /// Create a prober on the system resolver.
    pub fn new(timeout: Duration, max_concurrent: usize) -> Self {
        Self::with_lookup(HickoryLookup::new(timeout), timeout, max_concurrent)
    }
}

impl<L: DnsLookup> DnsProber<L> {
    /// Create a prober on a custom lookup backend.
    pub fn with_lookup(lookup: L, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            lookup,
            timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Probe a single domain.
    pub async fn probe(&self, domain: &str) -> Verdict {
        let outcome = match tokio::time::timeout(self.timeout, self.lookup.lookup(domain)).await {
            Ok(outcome) => outcome,
            Err(_) => DnsOutcome::Timeout,
        };
        let verdict = classify_dns_outcome(&outcome);
        debug!(domain, ?outcome, %verdict, "dns probe");
        verdict
    }

    /// Probe many domains concurrently, at most `max_concurrent` at a time.
    ///
    /// Results arrive in completion order, so they are returned keyed by
    /// domain. Repeated input domains are probed once.
    pub async fn probe_batch(&self, domains: &[String]) -> HashMap<String, Verdict> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = domains
            .iter()
            .map(String::as_str)
            .filter(|d| seen.insert(*d))
            .collect();

        stream::iter(unique)
            .map(|domain| async move { (domain.to_string(), self.probe(domain).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Lookup that answers from a table after a fixed delay and tracks
    /// how many lookups are in flight.
    #[derive(Default)]
    struct ScriptedLookup {
        outcomes: HashMap<String, DnsOutcome>,
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl DnsLookup for ScriptedLookup {
        async fn lookup(&self, domain: &str) -> DnsOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.outcomes
                .get(domain)
                .cloned()
                .unwrap_or(DnsOutcome::NxDomain)
        }
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(classify_dns_outcome(&DnsOutcome::NxDomain), Verdict::Available);
        assert_eq!(classify_dns_outcome(&DnsOutcome::Resolved), Verdict::Unavailable);
        assert_eq!(classify_dns_outcome(&DnsOutcome::NoAnswer), Verdict::Unavailable);
        assert_eq!(classify_dns_outcome(&DnsOutcome::NoNameservers), Verdict::Available);
        assert_eq!(classify_dns_outcome(&DnsOutcome::Timeout), Verdict::Unknown);
        assert_eq!(
            classify_dns_outcome(&DnsOutcome::Failed("io".to_string())),
            Verdict::Unknown
        );
    }

    fn no_records(response_code: ResponseCode) -> ResolveError {
        use hickory_resolver::proto::op::Query;
        use hickory_resolver::proto::rr::{Name, RecordType};

        let name = Name::from_ascii("abcxyz9912.com.").unwrap();
        ResolveError::from(ResolveErrorKind::NoRecordsFound {
            query: Box::new(Query::query(name, RecordType::A)),
            soa: None,
            negative_ttl: None,
            response_code,
            trusted: true,
        })
    }

    #[test]
    fn test_resolver_errors_map_to_outcomes() {
        assert_eq!(outcome_from_error(&no_records(ResponseCode::NXDomain)), DnsOutcome::NxDomain);
        assert_eq!(
            outcome_from_error(&no_records(ResponseCode::ServFail)),
            DnsOutcome::NoNameservers
        );
        assert_eq!(
            outcome_from_error(&no_records(ResponseCode::Refused)),
            DnsOutcome::NoNameservers
        );
        assert_eq!(outcome_from_error(&no_records(ResponseCode::NoError)), DnsOutcome::NoAnswer);
        assert!(matches!(
            outcome_from_error(&no_records(ResponseCode::FormErr)),
            DnsOutcome::Failed(_)
        ));
        assert_eq!(
            outcome_from_error(&ResolveError::from(ResolveErrorKind::Timeout)),
            DnsOutcome::Timeout
        );
        assert!(matches!(
            outcome_from_error(&ResolveError::from(ResolveErrorKind::Message("no connections available"))),
            DnsOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_single_probe_uses_lookup() {
        let mut outcomes = HashMap::new();
        outcomes.insert("taken.com".to_string(), DnsOutcome::Resolved);
        let prober = DnsProber::with_lookup(
            ScriptedLookup {
                outcomes,
                ..Default::default()
            },
            Duration::from_secs(3),
            10,
        );

        assert_eq!(tokio_test::block_on(prober.probe("taken.com")), Verdict::Unavailable);
        assert_eq!(tokio_test::block_on(prober.probe("free.com")), Verdict::Available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out_as_unknown() {
        let prober = DnsProber::with_lookup(
            ScriptedLookup {
                delay: Duration::from_secs(30),
                ..Default::default()
            },
            Duration::from_secs(3),
            10,
        );

        assert_eq!(prober.probe("slow.com").await, Verdict::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_never_exceeds_concurrency_bound() {
        let lookup = ScriptedLookup {
            delay: Duration::from_millis(200),
            ..Default::default()
        };
        let peak = lookup.peak.clone();
        let prober = DnsProber::with_lookup(lookup, Duration::from_secs(3), 4);

        let domains: Vec<String> = (0..25).map(|i| format!("name{}.com", i)).collect();
        let results = prober.probe_batch(&domains).await;

        assert_eq!(results.len(), 25);
        assert!(results.values().all(|v| *v == Verdict::Available));
        assert_eq!(peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_probes_duplicates_once() {
        let lookup = ScriptedLookup::default();
        let calls = lookup.calls.clone();
        let prober = DnsProber::with_lookup(lookup, Duration::from_secs(3), 10);

        let domains = vec![
            "dup.com".to_string(),
            "other.com".to_string(),
            "dup.com".to_string(),
        ];
        let results = prober.probe_batch(&domains).await;

        assert_eq!(results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[ignore = "requires live DNS"]
    async fn test_live_probe_known_domains() {
        let prober = DnsProber::new(Duration::from_secs(3), 10);
        assert_eq!(prober.probe("google.com").await, Verdict::Unavailable);
        assert_eq!(prober.probe("abcxyz9912.com").await, Verdict::Available);
    }
}

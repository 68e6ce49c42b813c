//! Batch orchestrator for domain availability verification.
//!
//! This module provides the `AvailabilityChecker` that runs each batch
//! through three phases:
//!
//! 1. **cache**: reuse definite outcomes younger than the TTL,
//! 2. **dns**: probe the rest concurrently; anything that resolves is taken,
//! 3. **whois**: verify DNS-available names one at a time, rate limited.
//!
//! Results come back in input order, one per input domain.

use crate::cache::ResultCache;
use crate::checkpoint::CheckpointStore;
use crate::error::DomainVerifyError;
use crate::progress::{NoProgress, ProgressReporter};
use crate::protocols::{
    DnsLookup, DnsProber, HickoryLookup, PatternClassifier, WhoisClassifier, WhoisClient,
    WhoisLookup, WhoisVerifier,
};
use crate::types::{
    CheckResult, Checkpoint, DomainInfo, Method, Phase, Verdict, VerifyConfig, WhoisErrorPolicy,
};
use crate::utils::word_tld_combinations;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Coordinates the cache, the DNS prober and the WHOIS verifier.
///
/// # Example
///
/// ```rust,no_run
/// use domain_verify_lib::{AvailabilityChecker, NoProgress, VerifyConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let mut checker = AvailabilityChecker::with_config(VerifyConfig::default());
///     let domains = vec!["example.com".to_string(), "abcxyz9912.com".to_string()];
///
///     for result in checker.check_batch(&domains, true, &mut NoProgress).await {
///         println!("{}: {} via {}", result.domain, result.verdict, result.method);
///     }
/// }
/// ```
pub struct AvailabilityChecker<L = HickoryLookup, W = WhoisClient, C = PatternClassifier> {
    config: VerifyConfig,
    dns: DnsProber<L>,
    whois: WhoisVerifier<W, C>,
    cache: Option<ResultCache>,
    checkpoints: CheckpointStore,
}

impl AvailabilityChecker {
    /// Create a checker with default configuration on the system resolver
    /// and the system `whois` command.
    pub fn new() -> Self {
        Self::with_config(VerifyConfig::default())
    }

    /// Create a checker with custom configuration.
    pub fn with_config(config: VerifyConfig) -> Self {
        let dns = DnsProber::new(config.dns_timeout, config.max_concurrent);
        let whois = WhoisVerifier::new(config.whois_timeout, config.whois_delay, config.whois_backoff);
        let cache = config
            .use_cache
            .then(|| ResultCache::open(&config.cache_file, config.cache_ttl));

        Self::with_components(config, dns, whois, cache)
    }
}

impl Default for AvailabilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, W, C> AvailabilityChecker<L, W, C>
where
    L: DnsLookup,
    W: WhoisLookup,
    C: WhoisClassifier,
{
    /// Assemble a checker from prebuilt parts.
    ///
    /// Pass `None` as the cache to run without one regardless of
    /// `config.use_cache`.
    pub fn with_components(
        config: VerifyConfig,
        dns: DnsProber<L>,
        whois: WhoisVerifier<W, C>,
        cache: Option<ResultCache>,
    ) -> Self {
        let checkpoints = CheckpointStore::new(&config.checkpoint_file);
        Self {
            config,
            dns,
            whois,
            cache,
            checkpoints,
        }
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub fn cache_mut(&mut self) -> Option<&mut ResultCache> {
        self.cache.as_mut()
    }

    /// Read the crash-recovery checkpoint left by the last batch.
    pub fn load_checkpoint(&self) -> Result<Option<Checkpoint>, DomainVerifyError> {
        self.checkpoints.load()
    }

    /// Delete the checkpoint file. Returns whether there was one.
    pub fn clear_checkpoint(&self) -> Result<bool, DomainVerifyError> {
        self.checkpoints.clear()
    }

    /// Fetch WHOIS registration details through the shared rate limiter.
    pub async fn whois_info(&mut self, domain: &str) -> Option<DomainInfo> {
        self.whois.whois_info(domain).await
    }

    /// Check one domain: cache, then DNS, then WHOIS if requested.
    ///
    /// Writes no checkpoint.
    pub async fn check_single(&mut self, domain: &str, verify_with_whois: bool) -> CheckResult {
        if let Some(entry) = self.cache.as_mut().and_then(|c| c.get(domain)) {
            return CheckResult::from_cache(&entry);
        }

        match self.dns.probe(domain).await {
            Verdict::Unavailable => {
                self.remember(domain, false, Method::Dns);
                CheckResult::fresh(domain, Verdict::Unavailable, Method::Dns)
            }
            Verdict::Unknown => CheckResult::fresh(domain, Verdict::Unknown, Method::Dns),
            Verdict::Available if verify_with_whois => self.verify_candidate(domain).await,
            Verdict::Available => {
                self.remember(domain, true, Method::Dns);
                CheckResult::fresh(domain, Verdict::Available, Method::Dns)
            }
        }
    }

    /// Check a batch of fully-qualified domains.
    ///
    /// Never fails: resolver, WHOIS, cache and checkpoint errors all end up
    /// as verdicts or log lines. The result has one entry per input domain,
    /// in input order, repeated domains included.
    pub async fn check_batch(
        &mut self,
        domains: &[String],
        verify_with_whois: bool,
        progress: &mut dyn ProgressReporter,
    ) -> Vec<CheckResult> {
        let total = domains.len();
        let mut finalized: Vec<(usize, CheckResult)> = Vec::with_capacity(total);

        // Cache phase
        let to_check: Vec<usize> = match self.cache.as_mut() {
            Some(cache) => {
                let mut misses = Vec::new();
                for (i, domain) in domains.iter().enumerate() {
                    match cache.get(domain) {
                        Some(entry) => finalized.push((i, CheckResult::from_cache(&entry))),
                        None => misses.push(i),
                    }
                    progress.phase(Phase::Cache, i + 1, total);
                    progress.overall(finalized.len(), total);
                }
                misses
            }
            None => {
                progress.phase(Phase::Cache, total, total);
                progress.overall(0, total);
                (0..total).collect()
            }
        };
        info!(total, cached = finalized.len(), "cache phase done");

        // DNS phase
        let mut maybe_available: Vec<usize> = Vec::new();
        if !to_check.is_empty() {
            let names: Vec<String> = to_check.iter().map(|&i| domains[i].clone()).collect();
            let verdicts = self.dns.probe_batch(&names).await;

            for (n, &i) in to_check.iter().enumerate() {
                let domain = domains[i].as_str();
                match verdicts.get(domain).copied().unwrap_or(Verdict::Unknown) {
                    Verdict::Unavailable => {
                        self.remember(domain, false, Method::Dns);
                        finalized.push((i, CheckResult::fresh(domain, Verdict::Unavailable, Method::Dns)));
                    }
                    // Ambiguous DNS is not worth a WHOIS query
                    Verdict::Unknown => {
                        finalized.push((i, CheckResult::fresh(domain, Verdict::Unknown, Method::Dns)));
                    }
                    Verdict::Available => maybe_available.push(i),
                }
                progress.phase(Phase::Dns, n + 1, to_check.len());
                progress.overall(finalized.len(), total);
            }
            info!(
                probed = to_check.len(),
                maybe_available = maybe_available.len(),
                "dns phase done"
            );
        }

        // WHOIS phase
        if verify_with_whois && !maybe_available.is_empty() {
            self.whois_phase(domains, &maybe_available, &mut finalized, progress)
                .await;
        } else if !maybe_available.is_empty() {
            let trusted: HashMap<String, bool> = maybe_available
                .iter()
                .map(|&i| (domains[i].clone(), true))
                .collect();
            if let Some(cache) = self.cache.as_mut() {
                if let Err(e) = cache.set_batch(&trusted, Method::Dns) {
                    warn!(error = %e, "failed to cache dns results");
                }
            }
            for &i in &maybe_available {
                finalized.push((i, CheckResult::fresh(&domains[i], Verdict::Available, Method::Dns)));
            }
        }

        // Assembly
        finalized.sort_by_key(|(i, _)| *i);
        let results: Vec<CheckResult> = finalized.into_iter().map(|(_, r)| r).collect();
        let available: Vec<CheckResult> = results
            .iter()
            .filter(|r| r.verdict.is_available())
            .cloned()
            .collect();
        self.write_checkpoint(results.len(), &available);
        progress.overall(results.len(), total);

        info!(total, available = available.len(), "batch complete");
        results
    }

    async fn whois_phase(
        &mut self,
        domains: &[String],
        candidates: &[usize],
        finalized: &mut Vec<(usize, CheckResult)>,
        progress: &mut dyn ProgressReporter,
    ) {
        let total = domains.len();
        let mut fresh_count = finalized.iter().filter(|(_, r)| !r.cached).count();
        let mut available_so_far: Vec<CheckResult> = Vec::new();
        let mut verified: HashMap<&str, CheckResult> = HashMap::new();
        let mut since_checkpoint = 0;

        info!(candidates = candidates.len(), "whois phase starting");
        for (n, &i) in candidates.iter().enumerate() {
            let domain = domains[i].as_str();
            let result = match verified.get(domain) {
                Some(previous) => previous.clone(),
                None => {
                    let result = self.verify_candidate(domain).await;
                    verified.insert(domain, result.clone());
                    result
                }
            };

            if result.verdict.is_available() {
                available_so_far.push(result.clone());
            }
            finalized.push((i, result));
            fresh_count += 1;

            since_checkpoint += 1;
            if since_checkpoint >= self.config.checkpoint_interval {
                self.write_checkpoint(fresh_count, &available_so_far);
                since_checkpoint = 0;
            }

            progress.phase(Phase::Whois, n + 1, candidates.len());
            progress.overall(finalized.len(), total);
        }
    }

    /// WHOIS-verify a domain the DNS probe reported as available.
    async fn verify_candidate(&mut self, domain: &str) -> CheckResult {
        match self.whois.verify(domain).await {
            Ok(verdict) => {
                if let Some(available) = verdict.as_available() {
                    self.remember(domain, available, Method::Whois);
                }
                CheckResult::fresh(domain, verdict, Method::Whois)
            }
            Err(e) => {
                let verdict = match self.config.whois_error_policy {
                    WhoisErrorPolicy::TrustDns => Verdict::Available,
                    WhoisErrorPolicy::MarkUnknown => Verdict::Unknown,
                };
                warn!(domain, error = %e, %verdict, "whois verification failed");
                CheckResult::fresh(domain, verdict, Method::Whois).with_error(e.to_string())
            }
        }
    }

    /// Check one word under each TLD (`com` when `tlds` is empty).
    pub async fn check_word_across_tlds(
        &mut self,
        word: &str,
        tlds: &[String],
        verify_with_whois: bool,
    ) -> HashMap<String, CheckResult> {
        let domains = word_tld_combinations(&[word.to_string()], tlds);
        self.check_batch(&domains, verify_with_whois, &mut NoProgress)
            .await
            .into_iter()
            .map(|r| (r.domain.clone(), r))
            .collect()
    }

    /// Check every word under every TLD and keep only available results.
    pub async fn find_available(
        &mut self,
        words: &[String],
        tlds: &[String],
        verify_with_whois: bool,
        progress: &mut dyn ProgressReporter,
    ) -> Vec<CheckResult> {
        let domains = word_tld_combinations(words, tlds);
        self.check_batch(&domains, verify_with_whois, progress)
            .await
            .into_iter()
            .filter(|r| r.verdict.is_available())
            .collect()
    }

    fn remember(&mut self, domain: &str, available: bool, method: Method) {
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.set(domain, available, method) {
                warn!(domain, error = %e, "failed to write result cache");
            }
        }
    }

    fn write_checkpoint(&self, checked_count: usize, available: &[CheckResult]) {
        match self.checkpoints.save(checked_count, available) {
            Ok(_) => debug!(checked_count, "checkpoint saved"),
            Err(e) => warn!(error = %e, "failed to write checkpoint"),
        }
    }
}

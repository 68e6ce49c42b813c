//! WHOIS verification for domains the DNS pre-filter marked as maybe available.
//!
//! WHOIS is slow, rate limited by source address and answers in free-form
//! text, so this module splits the work three ways:
//!
//! - [`WhoisLookup`] performs one raw query (the default [`WhoisClient`]
//!   shells out to the system `whois` command),
//! - [`WhoisClassifier`] turns a reply or error text into a [`WhoisClass`],
//! - [`WhoisVerifier`] spaces queries out, backs off on errors and retries
//!   a rate-limited query exactly once.

use crate::error::DomainVerifyError;
use crate::types::{DomainInfo, Verdict};
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Retries allowed after a rate-limited query.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 1;

/// Extra spacing added per consecutive error.
const ERROR_PENALTY: Duration = Duration::from_secs(2);

/// Upper bound on the accumulated error penalty.
const MAX_ERROR_PENALTY: Duration = Duration::from_secs(30);

/// Raw text returned by a WHOIS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisReply {
    pub text: String,
}

impl WhoisReply {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self { text: text.into() }
    }
}

/// Backend that performs a single WHOIS query.
///
/// Errors from an attempted query should be reported as
/// [`DomainVerifyError::WhoisError`], `Timeout`, `NetworkError` or
/// `RateLimited` so the verifier can classify them. Any other error variant
/// is treated as a failure of the backend itself and handed to the caller.
pub trait WhoisLookup {
    fn query(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<WhoisReply, DomainVerifyError>> + Send;
}

/// WHOIS client for querying domains using the system's whois command.
#[derive(Clone)]
pub struct WhoisClient {
    /// Timeout for WHOIS requests
    timeout: Duration,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Create a new WHOIS client with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn execute_whois_command(&self, domain: &str) -> Result<WhoisReply, DomainVerifyError> {
        let output = Command::new("whois")
            .arg(domain)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DomainVerifyError::internal(format!(
                    "Failed to execute whois command: {}. Make sure 'whois' is installed.",
                    e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            return Ok(WhoisReply::new(stdout));
        }

        // Nothing on stdout: the client's complaint on stderr is the answer
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => "empty WHOIS response".to_string(),
            text => text.to_string(),
        };
        Err(DomainVerifyError::whois(domain, message))
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisLookup for WhoisClient {
    async fn query(&self, domain: &str) -> Result<WhoisReply, DomainVerifyError> {
        match tokio::time::timeout(self.timeout, self.execute_whois_command(domain)).await {
            Ok(result) => result,
            Err(_) => Err(DomainVerifyError::timeout("WHOIS query", self.timeout)),
        }
    }
}

/// Something the WHOIS backend produced for a query.
#[derive(Debug, Clone, Copy)]
pub enum WhoisSignal<'a> {
    /// A reply body
    Reply(&'a str),
    /// The text of a query error
    Error(&'a str),
}

/// Interpretation of a [`WhoisSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhoisClass {
    /// Server is throttling us
    RateLimited,
    /// No registration exists
    NotFound,
    /// Registration data is present
    Registered,
    /// Nothing conclusive
    Unknown,
}

/// Policy that reads WHOIS replies and error texts.
///
/// For error texts, implementations must check for rate limiting first,
/// then for "not found", then for registration, and fall back to `Unknown`.
/// A reply carrying populated registration fields is `Registered` whatever
/// boilerplate surrounds them.
pub trait WhoisClassifier {
    fn classify(&self, signal: WhoisSignal<'_>) -> WhoisClass;
}

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate-limited",
    "too many requests",
    "quota exceeded",
    "limit exceeded",
    "try again later",
    "throttled",
    "blocked",
];

/// Explicit status lines that override the record fields around them,
/// as in the `.de` style `Domain: x.de` / `Status: free` reply.
const REPLY_FREE_STATUS_PATTERNS: &[&str] = &[
    "status: available",
    "status: free",
    "domain status: no object found",
];

/// Replies that say nothing about the name because the TLD is not served.
const UNSUPPORTED_PATTERNS: &[&str] = &[
    "no whois server is known",
    "no whois server",
    "invalid tld",
    "unknown tld",
    "tld not found",
    "no such tld",
];

/// Error texts meaning the name is not registered.
///
/// The bare `available` also matches transport complaints such as
/// "Service not available", which then read as an availability signal.
const ERROR_NOT_FOUND_PATTERNS: &[&str] = &[
    "no match",
    "not found",
    "no entries",
    "not registered",
    "available",
    "domain not found",
];

/// Error texts meaning the name is registered.
const ERROR_REGISTERED_PATTERNS: &[&str] = &["registered", "exists"];

lazy_static::lazy_static! {
    static ref RECORD_FIELD: Regex = Regex::new(
        r"(?im)^[ \t]*(?:(?:domain name|domain|registrant(?: name| organization)?|registrar|registry domain id)[ \t]*:|(?:[a-z]\.[ \t]*)?\[(?:domain name|registrant)\])[ \t]*\S"
    ).unwrap();
    static ref REGISTRAR: Regex = Regex::new(r"(?im)^\s*registrar\s*:\s*(.+?)\s*$").unwrap();
    static ref CREATED: Regex = Regex::new(
        r"(?im)^\s*(?:creation date|created(?: on)?|registered on|registration time)\s*:\s*(.+?)\s*$"
    ).unwrap();
    static ref EXPIRES: Regex = Regex::new(
        r"(?im)^\s*(?:registry expiry date|registrar registration expiration date|expiration date|expiry date|expires(?: on)?|paid-till)\s*:\s*(.+?)\s*$"
    ).unwrap();
    static ref UPDATED: Regex = Regex::new(
        r"(?im)^\s*(?:updated date|last updated(?: on)?|last modified|changed)\s*:\s*(.+?)\s*$"
    ).unwrap();
    static ref STATUS: Regex = Regex::new(r"(?im)^\s*(?:domain status|status)\s*:\s*(\S+)").unwrap();
    static ref NAMESERVER: Regex = Regex::new(r"(?im)^\s*(?:name server|nserver|nameservers?)\s*:\s*(\S+)").unwrap();
}

fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| text.contains(pattern))
}

/// Default substring-based classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl WhoisClassifier for PatternClassifier {
    fn classify(&self, signal: WhoisSignal<'_>) -> WhoisClass {
        match signal {
            WhoisSignal::Reply(text) => {
                let lower = text.to_lowercase();
                if contains_any(&lower, REPLY_FREE_STATUS_PATTERNS) {
                    WhoisClass::NotFound
                } else if RECORD_FIELD.is_match(text) {
                    // Terms-of-use text may mention blocking or "not found"
                    WhoisClass::Registered
                } else if contains_any(&lower, RATE_LIMIT_PATTERNS) {
                    WhoisClass::RateLimited
                } else if contains_any(&lower, UNSUPPORTED_PATTERNS) {
                    WhoisClass::Unknown
                } else {
                    // "No match", "0 objects" and the like: no registration described
                    WhoisClass::NotFound
                }
            }
            WhoisSignal::Error(text) => {
                let lower = text.to_lowercase();
                if contains_any(&lower, RATE_LIMIT_PATTERNS) {
                    WhoisClass::RateLimited
                } else if contains_any(&lower, ERROR_NOT_FOUND_PATTERNS) {
                    WhoisClass::NotFound
                } else if contains_any(&lower, ERROR_REGISTERED_PATTERNS) {
                    WhoisClass::Registered
                } else {
                    WhoisClass::Unknown
                }
            }
        }
    }
}

/// Extract registration details from a WHOIS reply.
pub fn parse_domain_info(text: &str) -> DomainInfo {
    let first = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    let all = |re: &Regex| {
        let mut values: Vec<String> = Vec::new();
        for capture in re.captures_iter(text) {
            if let Some(m) = capture.get(1) {
                let value = m.as_str().to_string();
                if !values.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                    values.push(value);
                }
            }
        }
        values
    };

    DomainInfo {
        registrar: first(&REGISTRAR),
        creation_date: first(&CREATED),
        expiration_date: first(&EXPIRES),
        updated_date: first(&UPDATED),
        status: all(&STATUS),
        nameservers: all(&NAMESERVER)
            .into_iter()
            .map(|ns| ns.to_lowercase())
            .collect(),
    }
}

/// Error text handed to the classifier, without the domain name so the
/// name itself can never match a pattern.
fn query_error_text(err: &DomainVerifyError) -> String {
    match err {
        DomainVerifyError::WhoisError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Sequential, rate-limited WHOIS verifier.
///
/// Holds the only cursor that spaces queries out: the instant of the last
/// query and the number of consecutive errors. Every query waits until
/// `base_delay + min(2s * consecutive_errors, 30s)` has passed since the
/// previous one.
pub struct WhoisVerifier<W = WhoisClient, C = PatternClassifier> {
    lookup: W,
    classifier: C,
    base_delay: Duration,
    backoff: Duration,
    last_query: Option<Instant>,
    consecutive_errors: u32,
}

impl WhoisVerifier<WhoisClient, PatternClassifier> {
    /// Create a verifier on the system `whois` command.
    pub fn new(timeout: Duration, base_delay: Duration, backoff: Duration) -> Self {
        Self::with_lookup(WhoisClient::with_timeout(timeout), base_delay, backoff)
    }
}

impl<W: WhoisLookup> WhoisVerifier<W, PatternClassifier> {
    /// Create a verifier on a custom lookup backend with the default classifier.
    pub fn with_lookup(lookup: W, base_delay: Duration, backoff: Duration) -> Self {
        Self::with_classifier(lookup, PatternClassifier, base_delay, backoff)
    }
}

impl<W: WhoisLookup, C: WhoisClassifier> WhoisVerifier<W, C> {
    pub fn with_classifier(lookup: W, classifier: C, base_delay: Duration, backoff: Duration) -> Self {
        Self {
            lookup,
            classifier,
            base_delay,
            backoff,
            last_query: None,
            consecutive_errors: 0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Spacing required before the next query.
    pub fn current_delay(&self) -> Duration {
        let penalty = (ERROR_PENALTY * self.consecutive_errors).min(MAX_ERROR_PENALTY);
        self.base_delay + penalty
    }

    async fn wait_for_rate_limit(&mut self) {
        let delay = self.current_delay();
        if let Some(last) = self.last_query {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        self.last_query = Some(Instant::now());
    }

    /// Verify a single domain.
    ///
    /// Returns `Ok(Verdict::Unknown)` when the query ran but proved nothing
    /// (including a rate limit that survived the retry). Returns `Err` only
    /// when the lookup backend itself failed.
    pub async fn verify(&mut self, domain: &str) -> Result<Verdict, DomainVerifyError> {
        let mut retries = 0;

        loop {
            self.wait_for_rate_limit().await;

            let class = match self.lookup.query(domain).await {
                Ok(reply) => self.classifier.classify(WhoisSignal::Reply(&reply.text)),
                Err(DomainVerifyError::RateLimited { .. }) => WhoisClass::RateLimited,
                Err(e) if e.is_query_error() => {
                    let message = query_error_text(&e);
                    self.classifier.classify(WhoisSignal::Error(&message))
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    warn!(domain, error = %e, "whois backend failed");
                    return Err(e);
                }
            };
            debug!(domain, ?class, retries, "whois query");

            match class {
                WhoisClass::NotFound => {
                    self.consecutive_errors = 0;
                    return Ok(Verdict::Available);
                }
                WhoisClass::Registered => {
                    self.consecutive_errors = 0;
                    return Ok(Verdict::Unavailable);
                }
                WhoisClass::RateLimited => {
                    self.consecutive_errors += 1;
                    if retries >= MAX_RATE_LIMIT_RETRIES {
                        warn!(domain, "whois still rate limited after retry");
                        return Ok(Verdict::Unknown);
                    }
                    retries += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                WhoisClass::Unknown => {
                    self.consecutive_errors += 1;
                    return Ok(Verdict::Unknown);
                }
            }
        }
    }

    /// Verify domains one after another.
    ///
    /// With `stop_on_found`, stops right after the first `Available`
    /// verdict. Backend failures are logged and reported as `Unknown`.
    pub async fn verify_batch(
        &mut self,
        domains: &[String],
        stop_on_found: bool,
    ) -> Vec<(String, Verdict)> {
        let mut results = Vec::with_capacity(domains.len());

        for domain in domains {
            let verdict = self.verify(domain).await.unwrap_or(Verdict::Unknown);
            results.push((domain.clone(), verdict));

            if stop_on_found && verdict.is_available() {
                break;
            }
        }

        results
    }

    /// Fetch registration details for a registered domain.
    ///
    /// Goes through the same rate limiter as [`verify`](Self::verify).
    /// Returns `None` if the query fails or the domain is not registered.
    pub async fn whois_info(&mut self, domain: &str) -> Option<DomainInfo> {
        self.wait_for_rate_limit().await;

        match self.lookup.query(domain).await {
            Ok(reply) => match self.classifier.classify(WhoisSignal::Reply(&reply.text)) {
                WhoisClass::Registered => {
                    self.consecutive_errors = 0;
                    Some(parse_domain_info(&reply.text))
                }
                WhoisClass::NotFound => {
                    self.consecutive_errors = 0;
                    None
                }
                WhoisClass::RateLimited | WhoisClass::Unknown => {
                    self.consecutive_errors += 1;
                    None
                }
            },
            Err(e) => {
                self.consecutive_errors += 1;
                debug!(domain, error = %e, "whois info query failed");
                None
            }
        }
    }
}

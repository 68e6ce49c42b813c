//! Network backends for availability checks.
//!
//! [`dns`] is the fast pre-filter, [`whois`] the authoritative verifier.

pub mod dns;
pub mod whois;

pub use dns::{classify_dns_outcome, DnsLookup, DnsOutcome, DnsProber, HickoryLookup};
pub use whois::{
    parse_domain_info, PatternClassifier, WhoisClass, WhoisClassifier, WhoisClient, WhoisLookup,
    WhoisReply, WhoisSignal, WhoisVerifier,
};

//! Domain name validation and input expansion.

use crate::error::DomainVerifyError;
use std::fs;
use std::path::Path;
use tracing::warn;

/// TLD appended to bare names when none are given.
pub const DEFAULT_TLD: &str = "com";

/// Lowercase a domain and strip surrounding whitespace and a trailing root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Validate a fully-qualified domain name.
///
/// Returns the reason the name was rejected so callers can surface it.
pub fn validate_domain(domain: &str) -> Result<(), DomainVerifyError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(DomainVerifyError::invalid_domain(domain, "Domain name cannot be empty"));
    }
    if domain.len() > 253 {
        return Err(DomainVerifyError::invalid_domain(
            domain,
            "Domain name exceeds 253 characters",
        ));
    }
    if !domain.contains('.') {
        return Err(DomainVerifyError::invalid_domain(
            domain,
            "Domain name must include a TLD",
        ));
    }

    for label in domain.split('.') {
        if let Err(reason) = check_label(label) {
            return Err(DomainVerifyError::invalid_domain(domain, reason));
        }
    }

    Ok(())
}

fn check_label(label: &str) -> Result<(), &'static str> {
    if label.is_empty() {
        return Err("Empty label");
    }
    if label.len() > 63 {
        return Err("Label exceeds 63 characters");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err("Label cannot start or end with a hyphen");
    }
    if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err("Label contains invalid characters");
    }
    Ok(())
}

/// Whether `domain` is a syntactically valid FQDN.
pub fn is_valid_fqdn(domain: &str) -> bool {
    validate_domain(domain).is_ok()
}

/// Whether `name` can be used as the label in front of a TLD.
pub fn is_valid_base_name(name: &str) -> bool {
    name.len() >= 2 && check_label(name).is_ok()
}

/// Turn user input into the list of domains to check.
///
/// Inputs containing a dot are taken as FQDNs; bare names are expanded with
/// every TLD in `tlds`, or [`DEFAULT_TLD`] when it is empty. Invalid inputs are
/// dropped. Order follows the input and repeats are kept.
pub fn expand_domain_inputs(inputs: &[String], tlds: &[String]) -> Vec<String> {
    let tlds: Vec<String> = tlds
        .iter()
        .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    let mut domains = Vec::new();

    for input in inputs {
        let name = normalize_domain(input);
        if name.is_empty() {
            continue;
        }

        if name.contains('.') {
            if is_valid_fqdn(&name) {
                domains.push(name);
            }
        } else if is_valid_base_name(&name) {
            if tlds.is_empty() {
                domains.push(format!("{}.{}", name, DEFAULT_TLD));
            } else {
                domains.extend(tlds.iter().map(|tld| format!("{}.{}", name, tld)));
            }
        }
    }

    domains
}

/// Pair every word with every TLD as `word.tld`, words outer.
///
/// Unlike [`expand_domain_inputs`] words are not validated or treated as
/// FQDNs: `my.brand` with `com` becomes `my.brand.com`. Empty words are
/// skipped with a warning. An empty `tlds` means [`DEFAULT_TLD`].
pub fn word_tld_combinations(words: &[String], tlds: &[String]) -> Vec<String> {
    let mut tlds: Vec<String> = tlds
        .iter()
        .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if tlds.is_empty() {
        tlds.push(DEFAULT_TLD.to_string());
    }

    let mut domains = Vec::with_capacity(words.len() * tlds.len());
    for word in words {
        let word = normalize_domain(word);
        if word.is_empty() {
            warn!("skipping empty word");
            continue;
        }
        domains.extend(tlds.iter().map(|tld| format!("{}.{}", word, tld)));
    }
    domains
}

/// Read domain inputs from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped; anything after a
/// `#` on a line is ignored.
pub fn read_domain_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DomainVerifyError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| DomainVerifyError::file_error(path.to_string_lossy(), e.to_string()))?;

    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

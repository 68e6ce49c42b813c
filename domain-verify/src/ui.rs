//! Terminal output for the domain-verify CLI.
//!
//! Result lines and summaries go to stdout; the live progress line goes to
//! stderr so piped output stays clean. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use domain_verify_lib::{
    CacheStats, CheckResult, Checkpoint, DomainInfo, Phase, ProgressReporter, Verdict,
};
use std::collections::HashMap;
use std::time::Duration;

const DOMAIN_WIDTH: usize = 30;

// ── Progress ─────────────────────────────────────────────────────────────────

/// Single rewritten stderr line showing the current phase and overall count.
pub struct ProgressLine {
    term: Term,
    overall: (usize, usize),
}

impl ProgressLine {
    /// Returns `None` when stderr is not a terminal.
    pub fn stderr() -> Option<Self> {
        let term = Term::stderr();
        term.is_term().then_some(Self {
            term,
            overall: (0, 0),
        })
    }

    fn render(&self, phase: Phase, current: usize, total: usize) -> String {
        format!(
            "{} {:>5} {}/{}  {}",
            style("›").cyan(),
            style(phase_label(phase)).bold(),
            current,
            total,
            style(format!("{}/{} done", self.overall.0, self.overall.1)).dim(),
        )
    }

    pub fn finish(&self) {
        let _ = self.term.clear_line();
    }
}

impl ProgressReporter for ProgressLine {
    fn phase(&mut self, phase: Phase, current: usize, total: usize) {
        let line = self.render(phase, current, total);
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&line);
    }

    fn overall(&mut self, processed: usize, total: usize) {
        self.overall = (processed, total);
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Cache => "cache",
        Phase::Dns => "dns",
        Phase::Whois => "whois",
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Print one result line, with registration details when known.
pub fn print_result(result: &CheckResult, info: Option<&DomainInfo>) {
    let padded = pad_str(&result.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let source = if result.cached {
        "cached".to_string()
    } else {
        result.method.to_string()
    };

    let status = match result.verdict {
        Verdict::Available => style("AVAILABLE").green().bold(),
        Verdict::Unavailable => style("TAKEN").red().bold(),
        Verdict::Unknown => style("UNKNOWN").yellow(),
    };

    let mut detail = format!("({})", source);
    if let Some(error) = &result.error {
        detail.push_str(&format!(" {}", brief_error(error)));
    }
    if let Some(info) = info {
        detail.push_str(&format!("  {}", format_domain_info(info)));
    }

    println!("  {}  {}  {}", style(&padded).white(), status, style(detail).dim());
}

/// Print every result in input order.
pub fn print_results(results: &[CheckResult], info: &HashMap<String, DomainInfo>) {
    for result in results {
        print_result(result, info.get(&result.domain));
    }
}

/// Print the final summary bar with colored counts.
pub fn print_summary(results: &[CheckResult], duration: Duration) {
    let count = |verdict: Verdict| results.iter().filter(|r| r.verdict == verdict).count();
    let cached = results.iter().filter(|r| r.cached).count();

    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}  {}",
        style(results.len()).bold(),
        if results.len() == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", count(Verdict::Available))).green(),
        style("|").dim(),
        style(format!("{} taken", count(Verdict::Unavailable))).red(),
        style("|").dim(),
        style(format!("{} unknown", count(Verdict::Unknown))).yellow(),
        style(format!("({} cached)", cached)).dim(),
    );
}

// ── Checkpoint and cache ─────────────────────────────────────────────────────

pub fn print_checkpoint(checkpoint: &Checkpoint) {
    println!(
        "{} {}",
        style("Checkpoint from").bold(),
        checkpoint.timestamp.to_rfc3339()
    );
    println!(
        "  {} checked, {} available",
        checkpoint.checked_count,
        style(checkpoint.available_count).green().bold()
    );
    for result in &checkpoint.available_domains {
        println!("    {}", result.domain);
    }
}

pub fn print_cache_stats(stats: &CacheStats, path: &str) {
    println!("{} {}", style("Cache").bold(), style(path).dim());
    println!("  {} entries", stats.total_entries);
    println!("  {} available", style(stats.available_domains).green());
    println!("  {} unavailable", style(stats.unavailable_domains).red());
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Format domain info (registrar, dates) into a concise string.
pub fn format_domain_info(info: &DomainInfo) -> String {
    let mut parts = Vec::new();
    if let Some(registrar) = &info.registrar {
        parts.push(format!("Registrar: {}", registrar));
    }
    if let Some(created) = &info.creation_date {
        parts.push(format!("Created: {}", created));
    }
    if let Some(expires) = &info.expiration_date {
        parts.push(format!("Expires: {}", expires));
    }
    if parts.is_empty() {
        "No info available".to_string()
    } else {
        parts.join(", ")
    }
}

/// Short reason shown next to a result that carries an error.
fn brief_error(error: &str) -> &'static str {
    let e = error.to_lowercase();
    if e.contains("timeout") || e.contains("timed out") {
        "[whois timeout]"
    } else if e.contains("rate limit") {
        "[rate limited]"
    } else if e.contains("network") || e.contains("connect") {
        "[network error]"
    } else {
        "[whois error]"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief_error() {
        assert_eq!(brief_error("Timeout: whois query exceeded 10s"), "[whois timeout]");
        assert_eq!(brief_error("Rate limited by whois: slow down"), "[rate limited]");
        assert_eq!(brief_error("Network error: connection reset"), "[network error]");
        assert_eq!(brief_error("failed to spawn whois"), "[whois error]");
    }

    #[test]
    fn test_format_domain_info() {
        let info = DomainInfo {
            registrar: Some("MarkMonitor Inc.".to_string()),
            creation_date: Some("1997-09-15".to_string()),
            ..Default::default()
        };
        assert_eq!(
            format_domain_info(&info),
            "Registrar: MarkMonitor Inc., Created: 1997-09-15"
        );
        assert_eq!(format_domain_info(&DomainInfo::default()), "No info available");
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(phase_label(Phase::Cache), "cache");
        assert_eq!(phase_label(Phase::Whois), "whois");
    }
}

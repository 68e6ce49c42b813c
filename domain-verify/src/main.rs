//! Domain Verify CLI Application
//!
//! Operator front-end for domain-verify-lib: runs verification batches with
//! a live progress line, inspects and clears the crash-recovery checkpoint,
//! and manages the on-disk result cache.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};
use domain_verify_lib::{
    expand_domain_inputs, load_env_config, read_domain_file, AvailabilityChecker,
    CheckpointStore, ConfigManager, DomainInfo, DomainVerifyError, FileConfig, NoProgress,
    ResultCache, Verdict, VerifyConfig,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-verify
#[derive(Parser, Debug)]
#[command(name = "domain-verify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check domain availability with a DNS pre-filter and WHOIS verification")]
#[command(
    long_about = "Check domain availability at scale.\n\nA concurrent DNS probe weeds out names that resolve; the rest are confirmed with rate-limited WHOIS queries. Results are cached on disk and long runs write a checkpoint that `recover` can display."
)]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check domains for availability
    Check(CheckArgs),

    /// Show what the last interrupted batch had found
    Recover {
        /// Print the checkpoint as JSON
        #[arg(short = 'j', long = "json")]
        json: bool,
    },

    /// Delete the checkpoint file
    ClearCheckpoint,

    /// Inspect or prune the result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show entry counts
    Stats {
        #[arg(short = 'j', long = "json")]
        json: bool,
    },

    /// Remove entries older than the TTL
    Prune,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Domain names to check (base names or FQDNs)
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # starts a comment)
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Domain Selection")]
    pub file: Option<PathBuf>,

    /// TLDs for base names (comma-separated or multiple -t flags, default: com)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Domain Selection")]
    pub tlds: Vec<String>,

    /// Trust the DNS pre-filter and skip WHOIS verification
    #[arg(long = "no-verify", help_heading = "Verification")]
    pub no_verify: bool,

    /// Max concurrent DNS probes (max: 100)
    #[arg(short = 'c', long = "concurrency", help_heading = "Verification")]
    pub concurrency: Option<usize>,

    /// Minimum spacing between WHOIS queries, e.g. "1.5s"
    #[arg(long = "whois-delay", value_name = "DURATION", value_parser = parse_duration_arg, help_heading = "Verification")]
    pub whois_delay: Option<Duration>,

    /// Ignore and do not update the result cache
    #[arg(long = "no-cache", help_heading = "Verification")]
    pub no_cache: bool,

    /// Look up registrar and dates for taken domains
    #[arg(short = 'i', long = "info", help_heading = "Output Format")]
    pub info: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    domain_verify_lib::parse_duration(value)
        .ok_or_else(|| format!("invalid duration '{}', use a format like '1.5s' or '2m'", value))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` wins unless `--verbose` is given.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("domain_verify=debug,domain_verify_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let file_config = load_file_config(&cli)?;

    match cli.command {
        Command::Check(args) => {
            let config = apply_check_args(build_config(&file_config), &args);
            run_check(args, config).await
        }
        Command::Recover { json } => {
            let store = CheckpointStore::new(build_config(&file_config).checkpoint_file);
            match store.load()? {
                Some(checkpoint) if json => {
                    println!("{}", serde_json::to_string_pretty(&checkpoint)?)
                }
                Some(checkpoint) => ui::print_checkpoint(&checkpoint),
                None => println!("No checkpoint found at {}", store.path().display()),
            }
            Ok(())
        }
        Command::ClearCheckpoint => {
            let store = CheckpointStore::new(build_config(&file_config).checkpoint_file);
            if store.clear()? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No checkpoint found at {}", store.path().display());
            }
            Ok(())
        }
        Command::Cache { action } => {
            let config = build_config(&file_config);
            let mut cache = ResultCache::open(&config.cache_file, config.cache_ttl);
            match action {
                CacheCommand::Stats { json: true } => {
                    println!("{}", serde_json::to_string_pretty(&cache.stats())?)
                }
                CacheCommand::Stats { json: false } => {
                    ui::print_cache_stats(&cache.stats(), &config.cache_file.to_string_lossy())
                }
                CacheCommand::Prune => {
                    let removed = cache.clear_expired()?;
                    println!("Removed {} expired entr{}", removed, if removed == 1 { "y" } else { "ies" });
                }
            }
            Ok(())
        }
    }
}

/// Explicit `--config` must load; discovered files only warn on failure.
fn load_file_config(cli: &Cli) -> Result<FileConfig, DomainVerifyError> {
    let manager = ConfigManager::new(cli.verbose);
    match &cli.config {
        Some(path) => manager.load_file(path),
        None => Ok(manager.discover_and_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring config files");
            FileConfig::default()
        })),
    }
}

/// Defaults, then config files, then `DV_*` variables.
fn build_config(file_config: &FileConfig) -> VerifyConfig {
    load_env_config().apply_to(file_config.apply_to(VerifyConfig::default()))
}

fn apply_check_args(mut config: VerifyConfig, args: &CheckArgs) -> VerifyConfig {
    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrent(concurrency);
    }
    if let Some(delay) = args.whois_delay {
        config = config.with_whois_delay(delay);
    }
    if args.no_cache {
        config = config.without_cache();
    }
    config
}

async fn run_check(args: CheckArgs, config: VerifyConfig) -> Result<(), Box<dyn std::error::Error>> {
    let domains = collect_domains(&args)?;
    tracing::info!(count = domains.len(), "checking domains");

    let mut checker = AvailabilityChecker::with_config(config);
    let started = Instant::now();

    let results = match ui::ProgressLine::stderr() {
        Some(mut progress) if !args.json => {
            let results = checker.check_batch(&domains, !args.no_verify, &mut progress).await;
            progress.finish();
            results
        }
        _ => checker.check_batch(&domains, !args.no_verify, &mut NoProgress).await,
    };

    let mut info: HashMap<String, DomainInfo> = HashMap::new();
    if args.info {
        for result in results.iter().filter(|r| r.verdict == Verdict::Unavailable) {
            if info.contains_key(&result.domain) {
                continue;
            }
            if let Some(details) = checker.whois_info(&result.domain).await {
                info.insert(result.domain.clone(), details);
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        ui::print_results(&results, &info);
        if results.len() > 1 {
            println!();
            ui::print_summary(&results, started.elapsed());
        }
    }

    Ok(())
}

/// Gather positional and file inputs and expand base names over the TLDs.
fn collect_domains(args: &CheckArgs) -> Result<Vec<String>, DomainVerifyError> {
    let mut inputs = args.domains.clone();
    if let Some(path) = &args.file {
        inputs.extend(read_domain_file(path)?);
    }

    let domains = expand_domain_inputs(&inputs, &args.tlds);
    if domains.is_empty() {
        return Err(DomainVerifyError::invalid_domain(
            inputs.join(" "),
            "No valid domains to check",
        ));
    }
    if domains.len() < inputs.len() {
        tracing::warn!(
            skipped = inputs.len() - domains.len(),
            "some inputs were not valid domain names"
        );
    }
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn check_args(domains: &[&str]) -> CheckArgs {
        CheckArgs {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["domain-verify", "check", "brand", "-t", "com,io", "--no-verify"]);
        match cli.command {
            Command::Check(args) => {
                assert_eq!(args.domains, vec!["brand"]);
                assert_eq!(args.tlds, vec!["com", "io"]);
                assert!(args.no_verify);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["domain-verify", "cache", "stats", "--json", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheCommand::Stats { json: true }
            }
        ));
    }

    #[test]
    fn test_whois_delay_flag() {
        let cli = Cli::parse_from(["domain-verify", "check", "a.com", "--whois-delay", "2.5s"]);
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.whois_delay, Some(Duration::from_millis(2500)));

        assert!(Cli::try_parse_from(["domain-verify", "check", "a.com", "--whois-delay", "soon"]).is_err());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let args = CheckArgs {
            concurrency: Some(500),
            no_cache: true,
            ..check_args(&["a.com"])
        };
        let config = apply_check_args(VerifyConfig::default(), &args);
        assert_eq!(config.max_concurrent, 100);
        assert!(!config.use_cache);
    }

    #[test]
    fn test_collect_domains_from_args_and_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# shortlist\nbeta.io\ngamma").unwrap();
        file.flush().unwrap();

        let args = CheckArgs {
            file: Some(file.path().to_path_buf()),
            tlds: vec!["com".to_string(), "dev".to_string()],
            ..check_args(&["alpha"])
        };
        assert_eq!(
            collect_domains(&args).unwrap(),
            vec!["alpha.com", "alpha.dev", "beta.io", "gamma.com", "gamma.dev"]
        );
    }

    #[test]
    fn test_collect_domains_rejects_empty_input() {
        assert!(collect_domains(&check_args(&["-", "x"])).is_err());
    }
}

//! ruleset-report: load a policy directory and emit the ruleset_loaded event.
//!
//! The event payload is printed to stdout as JSON. Every custom event is
//! also handed to the tracing reporter, so logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use secprobe_core::config::{load_dotenv, Config};
use secprobe_probe::{
    new_ruleset_loaded_event, new_self_test_event, CustomEventDispatcher, TracingReporter,
};
use secprobe_rules::{LoadOutcome, LoadStatus, PolicyLoader};

// ── CLI ─────────────────────────────────────────────────────────────

/// Load runtime security policies and report what was activated.
#[derive(Parser, Debug)]
#[command(name = "ruleset-report", version, about)]
struct Cli {
    /// Directory holding the policy files. Overrides `POLICIES_DIR` and its
    /// profile-prefixed form.
    #[arg(long)]
    policies_dir: Option<PathBuf>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Also emit a self_test event describing the load pass.
    #[arg(long)]
    self_test: bool,
}

/// Apply command-line overrides on top of the environment config.
fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(dir) = &cli.policies_dir {
        config.policies.dir = dir.clone();
    }
    config
}

// ── Self test ───────────────────────────────────────────────────────

/// Checks run against a finished load pass, partitioned into passed and
/// failed test names.
fn self_test(outcome: &LoadOutcome) -> (Vec<String>, Vec<String>) {
    let checks = [
        (
            "policy_files_parsed",
            outcome
                .files
                .iter()
                .all(|f| !matches!(f.status, LoadStatus::Failed { .. })),
        ),
        ("rules_loaded", !outcome.rule_set.is_empty()),
        ("no_rule_errors", outcome.errors.rule_errors().next().is_none()),
    ];

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for (name, ok) in checks {
        if ok {
            passed.push(name.to_string());
        } else {
            failed.push(name.to_string());
        }
    }
    (passed, failed)
}

// ── Main ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let config = apply_overrides(Config::from_env(), &cli);
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let loader = PolicyLoader::new(config.policies.dir.clone())
        .with_source(config.policies.source.as_str())
        .with_enabled_event_types(config.policies.enabled_event_types.iter().copied());
    let outcome = loader.load_all().with_context(|| {
        format!("failed to load policies from {}", config.policies.dir.display())
    })?;

    info!(
        rules = outcome.rule_set.rule_count(),
        errors = outcome.errors.len(),
        files = outcome.files.len(),
        "Policies loaded"
    );

    let dispatcher =
        CustomEventDispatcher::from_config(&config.custom_events, vec![Box::new(TracingReporter)]);

    let (rule, event) = new_ruleset_loaded_event(Some(&outcome.rule_set), Some(&outcome.errors));
    let bytes = event
        .marshal_json()
        .context("failed to serialize ruleset report")?;
    dispatcher.dispatch(&rule, event);

    if cli.pretty {
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", String::from_utf8_lossy(&bytes));
    }

    if cli.self_test {
        let (passed, failed) = self_test(&outcome);
        if !failed.is_empty() {
            warn!(failed = ?failed, "self test failures");
        }
        let (rule, event) = new_self_test_event(passed, failed);
        dispatcher.dispatch(&rule, event);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(&move |key: &str| vars.get(key).cloned())
    }

    const PROFILED: &[(&str, &str)] = &[
        ("SECPROBE_PROFILE", "prod"),
        ("PROD_POLICIES_DIR", "/tmp/pa"),
        ("POLICIES_DIR", "/tmp/pb"),
    ];

    #[test]
    fn profiled_policies_dir_wins_without_flag() {
        let cli = Cli::try_parse_from(["ruleset-report"]).unwrap();
        let config = apply_overrides(config_from(PROFILED), &cli);
        assert_eq!(config.policies.dir, PathBuf::from("/tmp/pa"));
    }

    #[test]
    fn explicit_flag_overrides_environment() {
        let cli =
            Cli::try_parse_from(["ruleset-report", "--policies-dir", "/tmp/cli", "--pretty"])
                .unwrap();
        let config = apply_overrides(config_from(PROFILED), &cli);
        assert_eq!(config.policies.dir, PathBuf::from("/tmp/cli"));
        assert!(cli.pretty);
        assert!(!cli.self_test);
    }
}

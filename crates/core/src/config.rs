use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SecprobeError};
use crate::event_type::EventType;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key/value source the config is read from. Production uses the process
/// environment; tests pass a closure over a map.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_opt(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|s| !s.is_empty())
}

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(lookup, &prefixed) {
            return Some(v);
        }
    }
    env_opt(lookup, key)
}

fn profiled_env_or(lookup: Lookup<'_>, profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(lookup, profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_bool(lookup: Lookup<'_>, profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(lookup, profile, key).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        Some(other) => {
            tracing::warn!(key, value = other, default, "unrecognized boolean, using default");
            default
        }
        None => default,
    }
}

fn profiled_env_list(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<Vec<String>> {
    profiled_env_opt(lookup, profile, key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub policies: PoliciesConfig,
    pub custom_events: CustomEventsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SECPROBE_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    /// Build config from an arbitrary key/value source.
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let profile = env_opt(lookup, "SECPROBE_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        let p = profile.as_str();
        Self {
            profile: p.to_string(),
            policies: PoliciesConfig::from_env_profiled(lookup, p),
            custom_events: CustomEventsConfig::from_env_profiled(lookup, p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject configurations the probe cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.policies.dir.as_os_str().is_empty() {
            return Err(SecprobeError::InvalidConfig {
                key: "POLICIES_DIR".to_string(),
                value: String::new(),
            });
        }
        if self.policies.enabled_event_types.is_empty() {
            return Err(SecprobeError::InvalidConfig {
                key: "ENABLED_EVENT_TYPES".to_string(),
                value: "(empty)".to_string(),
            });
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  policies:      dir={}, source={}, event_types={}",
            self.policies.dir.display(),
            self.policies.source,
            self.policies.enabled_event_types.len()
        );
        tracing::info!(
            "  custom_events: enabled={}, self_test={}, tags={:?}",
            self.custom_events.enabled,
            self.custom_events.self_test_enabled,
            self.custom_events.tags
        );
    }
}

// ── Policies ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesConfig {
    pub dir: PathBuf,
    /// Origin label stamped on every loaded policy (e.g. "file", "remote-config").
    pub source: String,
    pub enabled_event_types: Vec<EventType>,
}

impl PoliciesConfig {
    fn from_env_profiled(lookup: Lookup<'_>, p: &str) -> Self {
        let enabled_event_types = match profiled_env_list(lookup, p, "ENABLED_EVENT_TYPES") {
            Some(names) => names
                .iter()
                .filter_map(|name| match name.parse::<EventType>() {
                    Ok(t) => Some(t),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring entry in ENABLED_EVENT_TYPES");
                        None
                    }
                })
                .collect(),
            None => EventType::kernel_types().to_vec(),
        };

        Self {
            dir: PathBuf::from(profiled_env_or(
                lookup,
                p,
                "POLICIES_DIR",
                "/etc/secprobe/runtime-security.d",
            )),
            source: profiled_env_or(lookup, p, "POLICY_SOURCE", "file"),
            enabled_event_types,
        }
    }
}

// ── Custom events ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEventsConfig {
    pub enabled: bool,
    pub self_test_enabled: bool,
    /// Extra tags appended to every custom event before it is reported.
    pub tags: Vec<String>,
}

impl CustomEventsConfig {
    fn from_env_profiled(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(lookup, p, "CUSTOM_EVENTS_ENABLED", true),
            self_test_enabled: profiled_env_bool(lookup, p, "SELF_TEST_ENABLED", true),
            tags: profiled_env_list(lookup, p, "CUSTOM_EVENT_TAGS").unwrap_or_default(),
        }
    }
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

    #[test]
    fn defaults_when_nothing_set() {
        let config = config_from(&[]);
        assert_eq!(config.profile_label(), "default");
        assert_eq!(config.policies.source, "file");
        assert_eq!(
            config.policies.enabled_event_types.len(),
            EventType::kernel_types().len()
        );
        assert!(config.custom_events.enabled);
        assert!(config.custom_events.self_test_enabled);
        assert!(config.custom_events.tags.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn profile_prefixed_keys_win() {
        let config = config_from(&[
            ("SECPROBE_PROFILE", "prod"),
            ("POLICIES_DIR", "/tmp/default"),
            ("PROD_POLICIES_DIR", "/tmp/prod"),
            ("POLICY_SOURCE", "remote-config"),
        ]);
        assert_eq!(config.profile, "PROD");
        assert_eq!(config.policies.dir, PathBuf::from("/tmp/prod"));
        // Falls back to the unprefixed key.
        assert_eq!(config.policies.source, "remote-config");
    }

    #[test]
    fn lists_are_trimmed_and_unknown_types_dropped() {
        let config = config_from(&[
            ("ENABLED_EVENT_TYPES", "exec, open,teleport,,"),
            ("CUSTOM_EVENT_TAGS", "env:prod , team:sec"),
        ]);
        assert_eq!(
            config.policies.enabled_event_types,
            vec![EventType::Exec, EventType::Open]
        );
        assert_eq!(config.custom_events.tags, vec!["env:prod", "team:sec"]);
    }

    #[test]
    fn booleans_fall_back_on_garbage() {
        let config = config_from(&[
            ("CUSTOM_EVENTS_ENABLED", "0"),
            ("SELF_TEST_ENABLED", "maybe"),
        ]);
        assert!(!config.custom_events.enabled);
        assert!(config.custom_events.self_test_enabled);
    }

    #[test]
    fn validate_rejects_empty_event_types() {
        let config = config_from(&[("ENABLED_EVENT_TYPES", "teleport")]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            SecprobeError::InvalidConfig { ref key, .. } if key == "ENABLED_EVENT_TYPES"
        ));
    }
}

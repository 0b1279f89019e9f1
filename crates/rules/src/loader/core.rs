//! Core [`PolicyLoader`] struct: filesystem-backed policy loading.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use secprobe_core::EventType;

use crate::definition::{Policy, RuleDefinition};
use crate::error::{LoadErrors, RuleLoadErrorKind};
use crate::ruleset::RuleSet;

use super::error::{LoadResult, LoadStatus, LoaderError, Result, RuleCheckError};

const POLICY_EXTENSIONS: &[&str] = &["policy", "yaml", "yml"];

/// On-disk shape of a policy file. The policy name is the file stem.
#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

/// Entries default every field so that a missing `id` or `expression` is
/// reported against the rule rather than failing the whole file.
#[derive(Debug, Deserialize)]
struct RuleEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    expression: String,
    #[serde(default)]
    disabled: bool,
}

/// Everything a load pass produced.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub rule_set: RuleSet,
    pub errors: LoadErrors,
    pub files: Vec<LoadResult>,
}

/// Filesystem-backed policy loader.
///
/// Scans a directory (recursively) for `*.policy` / `*.yaml` / `*.yml` files,
/// deserializes them into [`Policy`] values and checks each rule entry for
/// structural problems. Expressions are not compiled.
pub struct PolicyLoader {
    /// Root directory containing policy files.
    policies_dir: PathBuf,
    /// Origin label stamped on every loaded policy.
    source: String,
    /// Event types rules may target.
    enabled_event_types: HashSet<EventType>,
}

impl PolicyLoader {
    /// Create a loader for the given directory with every kernel event type enabled.
    pub fn new(policies_dir: impl Into<PathBuf>) -> Self {
        Self {
            policies_dir: policies_dir.into(),
            source: "file".to_string(),
            enabled_event_types: EventType::kernel_types().iter().copied().collect(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_enabled_event_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.enabled_event_types = types.into_iter().collect();
        self
    }

    /// Get the policies directory path.
    pub fn policies_dir(&self) -> &Path {
        &self.policies_dir
    }

    /// Recursively scan the policies directory and load every policy file.
    ///
    /// Only a failure to read the root directory aborts the pass. Per-file and
    /// per-rule problems are returned in [`LoadOutcome::errors`].
    pub fn load_all(&self) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();
        let mut seen_ids: HashMap<String, String> = HashMap::new();

        let mut files = Vec::new();
        collect_files(&self.policies_dir, &mut files, &mut outcome.files, true)?;
        files.sort();

        for path in files {
            match self.load_file(&path) {
                Ok(file) => {
                    let (policy, rejected) =
                        self.build_policy(&path, file, &mut seen_ids, &mut outcome.errors);
                    info!(
                        policy = %policy.name,
                        rules = policy.rules.len(),
                        rejected,
                        path = %path.display(),
                        "loaded policy"
                    );
                    outcome.files.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded {
                            policy: policy.name.clone(),
                            rules: policy.rules.len(),
                            rejected,
                        },
                    });
                    outcome.rule_set.add_policy(policy);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load policy file");
                    outcome.files.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                    outcome.errors.push(e);
                }
            }
        }

        Ok(outcome)
    }

    fn load_file(&self, path: &Path) -> Result<PolicyFile> {
        let contents = fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|source| LoaderError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Turn a parsed file into a policy, recording rejected entries as
    /// rule-load errors. Returns the policy and the number of rejected rules.
    fn build_policy(
        &self,
        path: &Path,
        file: PolicyFile,
        seen_ids: &mut HashMap<String, String>,
        errors: &mut LoadErrors,
    ) -> (Policy, usize) {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let mut policy = Policy::new(name, file.version, self.source.as_str());
        let mut rejected = 0;

        for entry in file.rules {
            if entry.disabled {
                debug!(policy = %policy.name, rule_id = %entry.id, "skipping disabled rule");
                continue;
            }

            let def = policy.define(entry.id, entry.version, entry.expression);
            match self.check(&def, seen_ids) {
                Ok(()) => {
                    seen_ids.insert(def.id.clone(), policy.name.clone());
                    policy.rules.push(def);
                }
                Err((kind, cause)) => {
                    warn!(
                        policy = %policy.name,
                        rule_id = %def.id,
                        kind = %kind,
                        error = %cause,
                        "rejected rule"
                    );
                    rejected += 1;
                    errors.push_rule_error(def, kind, cause);
                }
            }
        }

        (policy, rejected)
    }

    fn check(
        &self,
        def: &Arc<RuleDefinition>,
        seen_ids: &HashMap<String, String>,
    ) -> std::result::Result<(), (RuleLoadErrorKind, RuleCheckError)> {
        use RuleLoadErrorKind::*;

        if def.id.trim().is_empty() {
            return Err((SyntaxError, RuleCheckError::EmptyId));
        }
        if def.expression.trim().is_empty() {
            return Err((SyntaxError, RuleCheckError::EmptyExpression));
        }
        if let Some(policy) = seen_ids.get(&def.id) {
            return Err((
                IdConflict,
                RuleCheckError::DuplicateId {
                    policy: policy.clone(),
                },
            ));
        }

        let event_type = expression_event_type(&def.expression).map_err(|e| (SyntaxError, e))?;
        if !self.enabled_event_types.contains(&event_type) {
            return Err((EventTypeDisabled, RuleCheckError::EventTypeDisabled(event_type)));
        }
        Ok(())
    }
}

/// Event type targeted by an expression: the prefix of its first field path,
/// e.g. `exec` for `exec.file.name == "sh"`.
pub(super) fn expression_event_type(
    expression: &str,
) -> std::result::Result<EventType, RuleCheckError> {
    let trimmed =
        expression.trim_start_matches(|c: char| c == '(' || c == '!' || c.is_whitespace());
    let field: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();

    let prefix = match field.split_once('.') {
        Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => prefix,
        _ => return Err(RuleCheckError::MissingEventType(expression.to_string())),
    };

    prefix
        .parse::<EventType>()
        .ok()
        .filter(|t| !t.is_custom() && *t != EventType::Unknown)
        .ok_or_else(|| RuleCheckError::UnknownEventType(prefix.to_string()))
}

/// Path of a directory entry. An unreadable entry is fatal on the root and
/// logged and skipped (`None`) below it.
pub(super) fn entry_path(
    dir: &Path,
    entry: std::io::Result<fs::DirEntry>,
    is_root: bool,
) -> Result<Option<PathBuf>> {
    match entry {
        Ok(entry) => Ok(Some(entry.path())),
        Err(e) if is_root => Err(LoaderError::Io(e)),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory entry");
            Ok(None)
        }
    }
}

/// Recursively collect candidate policy files. Skipped files are recorded in
/// `results`. A read failure on the root is fatal; below the root it is logged.
fn collect_files(
    dir: &Path,
    files: &mut Vec<PathBuf>,
    results: &mut Vec<LoadResult>,
    is_root: bool,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if is_root => return Err(LoaderError::Io(e)),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory");
            return Ok(());
        }
    };

    for entry in entries {
        let Some(path) = entry_path(dir, entry, is_root)? else {
            continue;
        };

        // Skip dotfiles/dotdirs
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }
        }

        if path.is_dir() {
            collect_files(&path, files, results, false)?;
            continue;
        }

        let is_policy = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| POLICY_EXTENSIONS.contains(&e))
            .unwrap_or(false);

        if !is_policy {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped {
                    reason: "not a policy file".to_string(),
                },
            });
            continue;
        }

        files.push(path);
    }

    Ok(())
}

//! Per-policy report of a ruleset load pass.
//!
//! A load pass yields the rules that were activated plus an aggregate of
//! errors, some of which concern individual rule definitions. The report
//! merges both into one [`PolicyState`] per policy name, listing every rule
//! that either loaded or failed with a reportable error.
//!
//! Grouping uses each definition's own policy back-reference rather than the
//! policy it was reached through. Definitions without a policy share a bucket
//! with an empty name.
//!
//! Policies appear in first-seen order: loaded rules are visited first, then
//! errors, each in input order. Rules within a policy keep their append order.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use secprobe_core::EventType;
use secprobe_rules::{LoadErrors, Rule, RuleDefinition, RuleLoadError, RuleSet};

use crate::custom_event::CustomEvent;
use crate::meta_rules::{meta_rule, RULESET_LOADED_RULE_ID};

/// Status reported for a rule that was activated.
pub const RULE_STATUS_LOADED: &str = "loaded";

/// Load outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub expression: String,
    /// `"loaded"` or the kind of the load error.
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl RuleState {
    pub fn from_definition(def: &RuleDefinition, status: &str, message: String) -> Self {
        Self {
            id: def.id.clone(),
            version: def.version.clone(),
            expression: def.expression.clone(),
            status: status.to_string(),
            message,
        }
    }
}

/// Load outcome of every reported rule of one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyState {
    pub name: String,
    pub version: String,
    pub source: String,
    pub rules: Vec<RuleState>,
}

impl PolicyState {
    /// Empty state for the policy a definition points back to.
    pub fn from_definition(def: &RuleDefinition) -> Self {
        let policy = def.policy.clone().unwrap_or_default();
        Self {
            name: policy.name,
            version: policy.version,
            source: policy.source,
            rules: Vec::new(),
        }
    }
}

/// A new ruleset was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetLoadedEvent {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub policies: Vec<PolicyState>,
}

#[derive(Default)]
struct PolicyStates {
    by_name: IndexMap<String, PolicyState>,
}

impl PolicyStates {
    fn push(&mut self, def: &RuleDefinition, rule: RuleState) {
        self.by_name
            .entry(def.policy_name().to_string())
            .or_insert_with(|| PolicyState::from_definition(def))
            .rules
            .push(rule);
    }

    fn into_policies(self) -> Vec<PolicyState> {
        self.by_name.into_values().collect()
    }
}

/// Merge loaded rules and rule-load errors into per-policy states.
///
/// Errors that are not [`RuleLoadError`]s are skipped. Never fails: missing
/// inputs produce an empty list.
pub fn build_policy_states(
    rule_set: Option<&RuleSet>,
    errors: Option<&LoadErrors>,
) -> Vec<PolicyState> {
    let mut states = PolicyStates::default();

    for def in rule_set.into_iter().flat_map(RuleSet::definitions) {
        states.push(
            def,
            RuleState::from_definition(def, RULE_STATUS_LOADED, String::new()),
        );
    }

    for err in errors.into_iter().flat_map(LoadErrors::iter) {
        match err.downcast_ref::<RuleLoadError>() {
            Some(rerr) => {
                let message = rerr.cause().to_string();
                states.push(
                    &rerr.definition,
                    RuleState::from_definition(&rerr.definition, rerr.kind(), message),
                );
            }
            None => debug!(error = %err, "load error is not attached to a rule, not reported"),
        }
    }

    states.into_policies()
}

/// Returns the rule and a populated custom event for a ruleset_loaded event.
pub fn new_ruleset_loaded_event(
    rule_set: Option<&RuleSet>,
    errors: Option<&LoadErrors>,
) -> (Rule, CustomEvent) {
    (
        meta_rule(RULESET_LOADED_RULE_ID),
        CustomEvent::new(
            EventType::RulesetLoaded,
            RulesetLoadedEvent {
                timestamp: Utc::now(),
                policies: build_policy_states(rule_set, errors),
            },
        ),
    )
}

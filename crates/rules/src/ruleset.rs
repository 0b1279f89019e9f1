//! Rule set and routing handle.

use std::sync::Arc;

use crate::definition::{Policy, RuleDefinition};

/// Routing handle attached to everything the pipeline dispatches.
///
/// Detections carry the expression of the rule that matched. Meta-events
/// carry only an ID from a fixed set and no expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub expression: Option<String>,
}

impl Rule {
    /// A rule with no expression, used to route engine-generated events.
    pub fn meta(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: None,
        }
    }

    pub fn from_definition(def: &RuleDefinition) -> Self {
        Self {
            id: def.id.clone(),
            expression: Some(def.expression.clone()),
        }
    }

    pub fn is_meta(&self) -> bool {
        self.expression.is_none()
    }
}

/// The active detection rules, grouped by policy.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    policies: Vec<Policy>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_policies(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn add_policy(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Iterate over every definition of every policy.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<RuleDefinition>> {
        self.policies.iter().flat_map(|p| p.rules.iter())
    }

    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|p| p.rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }
}

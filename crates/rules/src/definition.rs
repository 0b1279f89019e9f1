//! Policy and rule definition types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identity of the policy a rule definition was declared in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    pub name: String,
    pub version: String,
    pub source: String,
}

/// A single rule as declared in a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub version: String,
    pub expression: String,
    /// Policy this definition belongs to. Authoritative for grouping, even
    /// when the definition is reached through a different `Policy`.
    #[serde(default)]
    pub policy: Option<PolicyRef>,
}

impl RuleDefinition {
    pub fn new(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_policy(mut self, policy: PolicyRef) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Name of the owning policy, or `""` when the definition has none.
    pub fn policy_name(&self) -> &str {
        self.policy.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}

/// A named, versioned, sourced bundle of rule definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub version: String,
    pub source: String,
    pub rules: Vec<Arc<RuleDefinition>>,
}

impl Policy {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: source.into(),
            rules: Vec::new(),
        }
    }

    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef {
            name: self.name.clone(),
            version: self.version.clone(),
            source: self.source.clone(),
        }
    }

    /// Build a definition pointing back at this policy. It is not added to
    /// `rules`; use [`Policy::add_rule`] for that.
    pub fn define(
        &self,
        id: impl Into<String>,
        version: impl Into<String>,
        expression: impl Into<String>,
    ) -> Arc<RuleDefinition> {
        Arc::new(
            RuleDefinition::new(id, expression)
                .with_version(version)
                .with_policy(self.policy_ref()),
        )
    }

    /// Define a rule in this policy and append it.
    pub fn add_rule(
        &mut self,
        id: impl Into<String>,
        version: impl Into<String>,
        expression: impl Into<String>,
    ) -> Arc<RuleDefinition> {
        let def = self.define(id, version, expression);
        self.rules.push(Arc::clone(&def));
        def
    }
}

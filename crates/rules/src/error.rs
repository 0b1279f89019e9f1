//! Rule-load errors and the aggregate collected during a load pass.

use std::fmt;
use std::sync::Arc;

use crate::definition::RuleDefinition;

/// Why a rule definition could not be activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleLoadErrorKind {
    /// The rule requires a different agent version.
    AgentVersionMismatch,
    /// The rule's agent filter excludes this host.
    AgentFilterMismatch,
    /// The rule targets an event type that is not enabled.
    EventTypeDisabled,
    /// The definition is malformed.
    SyntaxError,
    /// Another rule already uses this ID.
    IdConflict,
    Other,
}

impl RuleLoadErrorKind {
    /// Status string reported for a rule that failed with this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLoadErrorKind::AgentVersionMismatch => "agent_version_mismatch",
            RuleLoadErrorKind::AgentFilterMismatch => "agent_filter_mismatch",
            RuleLoadErrorKind::EventTypeDisabled => "event_type_disabled",
            RuleLoadErrorKind::SyntaxError => "syntax_error",
            RuleLoadErrorKind::IdConflict => "id_conflict",
            RuleLoadErrorKind::Other => "error",
        }
    }
}

impl fmt::Display for RuleLoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A specific rule definition failed to load.
#[derive(Debug, thiserror::Error)]
#[error("rule `{}` ({kind}): {cause}", .definition.id)]
pub struct RuleLoadError {
    pub definition: Arc<RuleDefinition>,
    pub kind: RuleLoadErrorKind,
    #[source]
    pub cause: Cause,
}

impl RuleLoadError {
    pub fn new(
        definition: Arc<RuleDefinition>,
        kind: RuleLoadErrorKind,
        cause: impl Into<Cause>,
    ) -> Self {
        Self {
            definition,
            kind,
            cause: cause.into(),
        }
    }

    /// Status string for this failure, e.g. `"agent_version_mismatch"`.
    pub fn kind(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

/// Every error raised during one load pass, in the order they occurred.
///
/// Elements are not necessarily [`RuleLoadError`]s: file-level failures
/// (unreadable or unparseable policies) are collected here too.
#[derive(Debug, Default)]
pub struct LoadErrors {
    errors: Vec<anyhow::Error>,
}

impl LoadErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<anyhow::Error>) {
        self.errors.push(error.into());
    }

    pub fn push_rule_error(
        &mut self,
        definition: Arc<RuleDefinition>,
        kind: RuleLoadErrorKind,
        cause: impl Into<Cause>,
    ) {
        self.push(RuleLoadError::new(definition, kind, cause));
    }

    pub fn iter(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.errors.iter()
    }

    /// Only the elements that are rule-load errors.
    pub fn rule_errors(&self) -> impl Iterator<Item = &RuleLoadError> {
        self.errors.iter().filter_map(|e| e.downcast_ref::<RuleLoadError>())
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred while loading rules", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  * {:#}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadErrors {}

impl FromIterator<anyhow::Error> for LoadErrors {
    fn from_iter<I: IntoIterator<Item = anyhow::Error>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

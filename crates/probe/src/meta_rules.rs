//! Rule IDs used to route custom events.
//!
//! Every instance of a condition shares the same rule ID; instances are told
//! apart by their payload only.

use secprobe_rules::Rule;

/// Rule ID for the lost_events_* events.
pub const LOST_EVENTS_RULE_ID: &str = "lost_events";
/// Rule ID for the ruleset_loaded events.
pub const RULESET_LOADED_RULE_ID: &str = "ruleset_loaded";
/// Rule ID for the noisy_process events.
pub const NOISY_PROCESS_RULE_ID: &str = "noisy_process";
/// Rule ID for the abnormal_path events.
pub const ABNORMAL_PATH_RULE_ID: &str = "abnormal_path";
/// Rule ID for the self_test events.
pub const SELF_TEST_RULE_ID: &str = "self_test";

const ALL_CUSTOM_RULE_IDS: &[&str] = &[
    LOST_EVENTS_RULE_ID,
    RULESET_LOADED_RULE_ID,
    NOISY_PROCESS_RULE_ID,
    ABNORMAL_PATH_RULE_ID,
    SELF_TEST_RULE_ID,
];

/// The closed set of rule IDs reserved for custom events.
pub fn all_custom_rule_ids() -> Vec<&'static str> {
    ALL_CUSTOM_RULE_IDS.to_vec()
}

pub fn is_custom_rule_id(id: &str) -> bool {
    ALL_CUSTOM_RULE_IDS.contains(&id)
}

pub(crate) fn meta_rule(id: &'static str) -> Rule {
    Rule::meta(id)
}

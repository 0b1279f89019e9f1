//! Custom events: the engine's own health signals, shaped like detections.
//!
//! This crate provides:
//! - [`CustomEvent`], a type-tagged envelope over any serializable payload
//! - One factory per engine condition (lost events, ruleset loaded, noisy
//!   process, abnormal path, self test), each returning a routing [`Rule`]
//!   alongside the event
//! - The per-policy report merged from a ruleset load pass
//! - Classification of path-resolution errors into event types
//! - Reporters and a dispatcher that hands events to them
//!
//! [`Rule`]: secprobe_rules::Rule

pub mod custom_event;
pub mod events;
pub mod meta_rules;
pub mod probe_event;
pub mod reporter;
pub mod resolution;
pub mod ruleset_report;

pub use custom_event::{CustomEvent, CustomEventError, PayloadMarshaler};
pub use events::{
    new_abnormal_path_event, new_event_lost_read_event, new_event_lost_write_event,
    new_noisy_process_event, new_self_test_event, AbnormalPathEvent, EventLostRead,
    EventLostWrite, NoisyProcessEvent, SelfTestEvent,
};
pub use meta_rules::{all_custom_rule_ids, is_custom_rule_id};
pub use probe_event::ProbeEvent;
pub use reporter::{
    CustomEventDispatcher, CustomEventReporter, MemoryReporter, ReportedEvent, TracingReporter,
};
pub use resolution::{classify, PathResolutionError};
pub use ruleset_report::{
    build_policy_states, new_ruleset_loaded_event, PolicyState, RuleState, RulesetLoadedEvent,
};

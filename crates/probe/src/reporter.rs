//! Hands custom events to reporters.
//!
//! Delivery to a backend is the reporter's concern. The dispatcher only
//! decides whether an event goes out, stamps configured tags on it, and
//! fans it out. One reporter misbehaving does not stop the others.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use secprobe_core::config::CustomEventsConfig;
use secprobe_core::EventType;
use secprobe_rules::Rule;

use crate::custom_event::CustomEvent;
use crate::meta_rules::all_custom_rule_ids;

/// Receives custom events once they are ready to leave the engine.
pub trait CustomEventReporter: Send + Sync {
    fn report(&self, rule: &Rule, event: &CustomEvent);

    /// Human-readable name for this reporter (e.g., "tracing", "memory").
    fn name(&self) -> &str;
}

/// Lets a reporter be registered with a dispatcher and still be inspected
/// by its owner.
impl<R: CustomEventReporter + ?Sized> CustomEventReporter for Arc<R> {
    fn report(&self, rule: &Rule, event: &CustomEvent) {
        (**self).report(rule, event);
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logs each event as a structured `tracing` record.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl CustomEventReporter for TracingReporter {
    fn report(&self, rule: &Rule, event: &CustomEvent) {
        match event.marshal_json() {
            Ok(bytes) => tracing::info!(
                rule_id = %rule.id,
                event_type = event.type_name(),
                tags = ?event.tags(),
                payload = %String::from_utf8_lossy(&bytes),
                "custom event"
            ),
            Err(e) => tracing::warn!(
                rule_id = %rule.id,
                event_type = event.type_name(),
                error = %e,
                "dropping custom event with unserializable payload"
            ),
        }
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// A custom event as captured by [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedEvent {
    pub rule_id: String,
    pub event_type: EventType,
    pub tags: Vec<String>,
    pub json: String,
}

/// Keeps every reported event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportedEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events reported so far.
    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events.lock().expect("memory reporter lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("memory reporter lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CustomEventReporter for MemoryReporter {
    fn report(&self, rule: &Rule, event: &CustomEvent) {
        let record = ReportedEvent {
            rule_id: rule.id.clone(),
            event_type: event.event_type(),
            tags: event.tags(),
            json: event.to_string(),
        };
        self.events
            .lock()
            .expect("memory reporter lock poisoned")
            .push(record);
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Routes custom events to every registered reporter.
pub struct CustomEventDispatcher {
    reporters: Vec<Box<dyn CustomEventReporter>>,
    /// Rule IDs allowed through. Defaults to every custom rule ID.
    allowed_rule_ids: HashSet<String>,
    /// Tags appended to each event before it is reported.
    extra_tags: Vec<String>,
    enabled: bool,
    self_test_enabled: bool,
}

impl CustomEventDispatcher {
    pub fn new(reporters: Vec<Box<dyn CustomEventReporter>>) -> Self {
        Self {
            reporters,
            allowed_rule_ids: all_custom_rule_ids().into_iter().map(str::to_string).collect(),
            extra_tags: Vec::new(),
            enabled: true,
            self_test_enabled: true,
        }
    }

    pub fn from_config(
        config: &CustomEventsConfig,
        reporters: Vec<Box<dyn CustomEventReporter>>,
    ) -> Self {
        let mut dispatcher = Self::new(reporters).with_extra_tags(config.tags.clone());
        dispatcher.enabled = config.enabled;
        dispatcher.self_test_enabled = config.self_test_enabled;
        dispatcher
    }

    /// Replace the rule-ID allow list.
    pub fn with_allowed_rule_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_rule_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra_tags(mut self, tags: Vec<String>) -> Self {
        self.extra_tags = tags;
        self
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn CustomEventReporter>) {
        self.reporters.push(reporter);
    }

    /// Whether an event routed by `rule` would be handed to the reporters.
    pub fn accepts(&self, rule: &Rule, event: &CustomEvent) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.self_test_enabled && event.event_type() == EventType::SelfTest {
            return false;
        }
        self.allowed_rule_ids.contains(&rule.id)
    }

    /// Tag and fan out an event. Returns `false` when the event was dropped.
    pub fn dispatch(&self, rule: &Rule, mut event: CustomEvent) -> bool {
        if !self.accepts(rule, &event) {
            tracing::debug!(
                rule_id = %rule.id,
                event_type = event.type_name(),
                "custom event filtered out"
            );
            return false;
        }

        for tag in &self.extra_tags {
            event.add_tag(tag.as_str());
        }

        if self.reporters.is_empty() {
            tracing::debug!(rule_id = %rule.id, "No custom event reporters configured");
        }

        for reporter in &self.reporters {
            tracing::trace!(
                rule_id = %rule.id,
                reporter = reporter.name(),
                "reporting custom event"
            );
            reporter.report(rule, &event);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{new_event_lost_read_event, new_self_test_event};

    fn dispatcher_with_memory() -> (CustomEventDispatcher, Arc<MemoryReporter>) {
        let memory = Arc::new(MemoryReporter::new());
        let dispatcher = CustomEventDispatcher::new(vec![Box::new(Arc::clone(&memory))]);
        (dispatcher, memory)
    }

    #[test]
    fn dispatch_appends_extra_tags_before_type_tag() {
        let (dispatcher, memory) = dispatcher_with_memory();
        let dispatcher = dispatcher.with_extra_tags(vec!["env:prod".to_string()]);

        let (rule, event) = new_event_lost_read_event("events", 3.0);
        assert!(dispatcher.dispatch(&rule, event));

        let events = memory.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule_id, "lost_events");
        assert_eq!(events[0].event_type, EventType::LostEventsRead);
        assert_eq!(events[0].tags, vec!["env:prod", "type:lost_events_read"]);
        assert!(events[0].json.contains("\"map\":\"events\""));
    }

    #[test]
    fn detection_rules_are_not_allowed_by_default() {
        let (dispatcher, memory) = dispatcher_with_memory();
        let (_, event) = new_event_lost_read_event("events", 1.0);
        let detection = Rule {
            id: "shell_exec".to_string(),
            expression: Some("exec.file.name == \"sh\"".to_string()),
        };

        assert!(!dispatcher.dispatch(&detection, event));
        assert!(memory.is_empty());
    }

    #[test]
    fn allow_list_can_be_narrowed() {
        let (dispatcher, memory) = dispatcher_with_memory();
        let dispatcher = dispatcher.with_allowed_rule_ids(["self_test"]);

        let (rule, event) = new_event_lost_read_event("events", 1.0);
        assert!(!dispatcher.dispatch(&rule, event));

        let (rule, event) = new_self_test_event(vec!["open".to_string()], vec![]);
        assert!(dispatcher.dispatch(&rule, event));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn config_disables_dispatch() {
        let memory = Arc::new(MemoryReporter::new());
        let config = CustomEventsConfig {
            enabled: true,
            self_test_enabled: false,
            tags: vec!["team:sec".to_string()],
        };
        let dispatcher = CustomEventDispatcher::from_config(
            &config,
            vec![Box::new(Arc::clone(&memory))],
        );

        let (rule, event) = new_self_test_event(vec![], vec!["exec".to_string()]);
        assert!(!dispatcher.dispatch(&rule, event));

        let (rule, event) = new_event_lost_read_event("events", 1.0);
        assert!(dispatcher.dispatch(&rule, event));
        assert_eq!(memory.events()[0].tags[0], "team:sec");

        let disabled = CustomEventDispatcher::from_config(
            &CustomEventsConfig {
                enabled: false,
                ..config
            },
            vec![Box::new(Arc::clone(&memory))],
        );
        let (rule, event) = new_event_lost_read_event("events", 1.0);
        assert!(!disabled.dispatch(&rule, event));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn dispatch_does_not_touch_callers_clone() {
        let (dispatcher, memory) = dispatcher_with_memory();
        let dispatcher = dispatcher.with_extra_tags(vec!["extra".to_string()]);

        let (rule, event) = new_event_lost_read_event("events", 1.0);
        let kept = event.clone();
        dispatcher.dispatch(&rule, event);

        assert_eq!(kept.tags(), vec!["type:lost_events_read"]);
        assert_eq!(memory.events()[0].tags.len(), 2);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn events_are_reported_from_other_threads() {
        assert_send_sync::<CustomEvent>();
        assert_send_sync::<crate::ruleset_report::RulesetLoadedEvent>();
        assert_send_sync::<CustomEventDispatcher>();

        let (dispatcher, memory) = dispatcher_with_memory();
        let dispatcher = Arc::new(dispatcher);
        let (rule, event) = new_event_lost_read_event("events", 5.0);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let rule = rule.clone();
                let event = event.clone();
                std::thread::spawn(move || dispatcher.dispatch(&rule, event))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let reported = memory.events();
        assert_eq!(reported.len(), 4);
        assert!(reported.iter().all(|e| e.json == event.to_string()));
    }

    #[test]
    fn tracing_reporter_never_panics() {
        let (rule, event) = new_event_lost_read_event("events", 1.0);
        TracingReporter.report(&rule, &event);
        assert_eq!(TracingReporter.name(), "tracing");
    }
}

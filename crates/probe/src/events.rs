//! Meta-event payloads and their factories.
//!
//! Each factory returns the routing rule together with a populated
//! [`CustomEvent`]. The ruleset-loaded factory lives in
//! [`ruleset_report`](crate::ruleset_report).

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use secprobe_core::EventType;
use secprobe_rules::Rule;

use crate::custom_event::CustomEvent;
use crate::meta_rules::{
    meta_rule, ABNORMAL_PATH_RULE_ID, LOST_EVENTS_RULE_ID, NOISY_PROCESS_RULE_ID,
    SELF_TEST_RULE_ID,
};
use crate::probe_event::ProbeEvent;
use crate::resolution::classify;

// ── Lost events ─────────────────────────────────────────────────────

/// Events dropped in user space, detected while reading a perf/ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLostRead {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "map")]
    pub name: String,
    /// Non-finite counts are written as `"NaN"`, `"Infinity"` or `"-Infinity"`.
    #[serde(with = "lenient_f64")]
    pub lost: f64,
}

/// Returns the rule and a populated custom event for a lost_events_read event.
pub fn new_event_lost_read_event(map_name: &str, lost: f64) -> (Rule, CustomEvent) {
    (
        meta_rule(LOST_EVENTS_RULE_ID),
        CustomEvent::new(
            EventType::LostEventsRead,
            EventLostRead {
                timestamp: Utc::now(),
                name: map_name.to_string(),
                lost,
            },
        ),
    )
}

/// Events dropped in kernel space, counted per event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLostWrite {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "map")]
    pub name: String,
    #[serde(rename = "per_event")]
    pub lost: BTreeMap<String, u64>,
}

/// Returns the rule and a populated custom event for a lost_events_write event.
pub fn new_event_lost_write_event(
    map_name: &str,
    per_event: BTreeMap<String, u64>,
) -> (Rule, CustomEvent) {
    (
        meta_rule(LOST_EVENTS_RULE_ID),
        CustomEvent::new(
            EventType::LostEventsWrite,
            EventLostWrite {
                timestamp: Utc::now(),
                name: map_name.to_string(),
                lost: per_event,
            },
        ),
    )
}

// ── Noisy process ───────────────────────────────────────────────────

/// A process was temporarily discarded after exceeding its event-rate threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoisyProcessEvent {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "pid_count")]
    pub count: u64,
    pub threshold: i64,
    /// Serialized as integer nanoseconds.
    #[serde(with = "duration_nanos")]
    pub control_period: Duration,
    pub discarded_until: DateTime<Utc>,
    pub pid: u32,
    pub comm: String,
}

/// Returns the rule and a populated custom event for a noisy_process event.
///
/// Packages the outcome of the rate limiter; no throttling happens here.
pub fn new_noisy_process_event(
    count: u64,
    threshold: i64,
    control_period: Duration,
    discarded_until: DateTime<Utc>,
    pid: u32,
    comm: &str,
    timestamp: DateTime<Utc>,
) -> (Rule, CustomEvent) {
    if discarded_until < timestamp {
        warn!(
            pid,
            comm,
            %discarded_until,
            %timestamp,
            "noisy process discarded until a time before the event"
        );
    }

    (
        meta_rule(NOISY_PROCESS_RULE_ID),
        CustomEvent::new(
            EventType::NoisyProcess,
            NoisyProcessEvent {
                timestamp,
                count,
                threshold,
                control_period,
                discarded_until,
                pid,
                comm: comm.to_string(),
            },
        ),
    )
}

// ── Abnormal path ───────────────────────────────────────────────────

/// A path resolution failed for a suspicious reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalPathEvent {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "triggering_event")]
    pub event: serde_json::Value,
    pub path_resolution_error: String,
}

/// Returns the rule and a populated custom event for an abnormal_path event.
///
/// The event type depends on the resolution error, see [`classify`].
pub fn new_abnormal_path_event(
    event: &dyn ProbeEvent,
    resolution_error: &(dyn StdError + 'static),
) -> (Rule, CustomEvent) {
    (
        meta_rule(ABNORMAL_PATH_RULE_ID),
        CustomEvent::new(
            classify(resolution_error),
            AbnormalPathEvent {
                timestamp: event.resolve_event_timestamp(),
                event: event.snapshot(),
                path_resolution_error: resolution_error.to_string(),
            },
        ),
    )
}

// ── Self test ───────────────────────────────────────────────────────

/// Result of the self test run at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestEvent {
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "succeeded_tests")]
    pub success: Vec<String>,
    #[serde(rename = "failed_tests")]
    pub fails: Vec<String>,
}

/// Returns the rule and the result of the self test.
///
/// `success` and `fails` are expected to partition the executed tests.
pub fn new_self_test_event(success: Vec<String>, fails: Vec<String>) -> (Rule, CustomEvent) {
    (
        meta_rule(SELF_TEST_RULE_ID),
        CustomEvent::new(
            EventType::SelfTest,
            SelfTestEvent {
                timestamp: Utc::now(),
                success,
                fails,
            },
        ),
    )
}

/// Serde helper: `Duration` as integer nanoseconds.
mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

/// Serde helper: `f64` as a JSON number, or a string when it is not finite
/// (JSON has no representation for NaN or infinities).
mod lenient_f64 {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_f64(*v)
        } else if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_sign_positive() {
            s.serialize_str("Infinity")
        } else {
            s.serialize_str("-Infinity")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float `{}`", other))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::resolution::PathResolutionError;

    struct OpenEvent {
        at: DateTime<Utc>,
    }

    impl ProbeEvent for OpenEvent {
        fn event_type(&self) -> EventType {
            EventType::Open
        }

        fn resolve_event_timestamp(&self) -> DateTime<Utc> {
            self.at
        }

        fn snapshot(&self) -> serde_json::Value {
            serde_json::json!({
                "evt": { "name": self.event_type().as_str() },
                "file": { "inode": 1234 }
            })
        }
    }

    fn decode<T: for<'de> Deserialize<'de>>(event: &CustomEvent) -> T {
        serde_json::from_slice(&event.marshal_json().unwrap()).unwrap()
    }

    #[test]
    fn lost_read_event() {
        let before = Utc::now();
        let (rule, event) = new_event_lost_read_event("cpu_map", 42.0);
        let after = Utc::now();

        assert_eq!(rule.id, "lost_events");
        assert!(rule.is_meta());
        assert_eq!(event.event_type(), EventType::LostEventsRead);

        let payload: EventLostRead = decode(&event);
        assert_eq!(payload.name, "cpu_map");
        assert_eq!(payload.lost, 42.0);
        assert!(payload.timestamp >= before && payload.timestamp <= after);
    }

    #[test]
    fn lost_read_keeps_full_precision() {
        let lost = 9_007_199_254_740_991.0_f64;
        let (_, event) = new_event_lost_read_event("events", lost);
        let payload: EventLostRead = decode(&event);
        assert_eq!(payload.lost.to_bits(), lost.to_bits());
    }

    #[test]
    fn lost_read_non_finite_counts_survive_decoding() {
        let (_, event) = new_event_lost_read_event("m", f64::NAN);
        let json: serde_json::Value = decode(&event);
        assert_eq!(json["lost"], "NaN");
        assert!(decode::<EventLostRead>(&event).lost.is_nan());

        for lost in [f64::INFINITY, f64::NEG_INFINITY] {
            let (_, event) = new_event_lost_read_event("m", lost);
            assert_eq!(decode::<EventLostRead>(&event).lost, lost);
        }

        let bad = r#"{"date":"2024-01-01T00:00:00Z","map":"m","lost":"lots"}"#;
        assert!(serde_json::from_str::<EventLostRead>(bad).is_err());
    }

    #[test]
    fn lost_write_event_keeps_every_key() {
        let per_event = BTreeMap::from([
            ("exec".to_string(), 3),
            ("open".to_string(), u64::MAX),
            ("mmap".to_string(), 0),
        ]);
        let (rule, event) = new_event_lost_write_event("events", per_event.clone());
        assert_eq!(rule.id, "lost_events");
        assert_eq!(event.type_name(), "lost_events_write");

        let json: serde_json::Value = decode(&event);
        assert_eq!(json["map"], "events");
        assert_eq!(json["per_event"]["exec"], 3);

        let payload: EventLostWrite = decode(&event);
        assert_eq!(payload.lost, per_event);
    }

    #[test]
    fn noisy_process_event_packages_decision() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let discarded_until = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 2).unwrap();
        let (rule, event) = new_noisy_process_event(
            500,
            250,
            Duration::from_secs(2),
            discarded_until,
            4242,
            "stress-ng",
            timestamp,
        );

        assert_eq!(rule.id, "noisy_process");
        assert_eq!(event.event_type(), EventType::NoisyProcess);

        let json: serde_json::Value = decode(&event);
        assert_eq!(json["pid_count"], 500);
        assert_eq!(json["control_period"], 2_000_000_000u64);
        assert_eq!(json["comm"], "stress-ng");

        let payload: NoisyProcessEvent = decode(&event);
        assert_eq!(payload.timestamp, timestamp);
        assert_eq!(payload.discarded_until, discarded_until);
        assert!(payload.discarded_until >= payload.timestamp);
        assert_eq!(payload.control_period, Duration::from_secs(2));
    }

    #[test]
    fn noisy_process_event_built_even_when_discard_precedes_event() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();
        let discarded_until = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let (rule, event) = new_noisy_process_event(
            10,
            5,
            Duration::from_millis(500),
            discarded_until,
            7,
            "yes",
            timestamp,
        );

        assert_eq!(rule.id, "noisy_process");
        let payload: NoisyProcessEvent = decode(&event);
        assert_eq!(payload.discarded_until, discarded_until);
        assert_eq!(payload.control_period, Duration::from_millis(500));
    }

    #[test]
    fn abnormal_path_event_type_follows_error() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let trigger = OpenEvent { at };

        let (rule, event) =
            new_abnormal_path_event(&trigger, &PathResolutionError::TruncatedParentsErpc);
        assert_eq!(rule.id, "abnormal_path");
        assert_eq!(event.event_type(), EventType::TruncatedParents);

        let payload: AbnormalPathEvent = decode(&event);
        assert_eq!(payload.timestamp, at);
        assert_eq!(payload.path_resolution_error, "truncated parents (eRPC)");
        assert_eq!(payload.event["file"]["inode"], 1234);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let (rule, event) = new_abnormal_path_event(&trigger, &other);
        assert_eq!(rule.id, "abnormal_path");
        assert_eq!(event.event_type(), EventType::Unknown);
        assert_eq!(event.tags(), vec!["type:unknown"]);
    }

    #[test]
    fn self_test_event() {
        let before = Utc::now();
        let (rule, event) = new_self_test_event(
            vec!["open".to_string(), "exec".to_string()],
            vec!["chmod".to_string()],
        );
        assert_eq!(rule.id, "self_test");
        assert_eq!(event.type_name(), "self_test");

        let json: serde_json::Value = decode(&event);
        assert_eq!(json["succeeded_tests"], serde_json::json!(["open", "exec"]));
        assert_eq!(json["failed_tests"], serde_json::json!(["chmod"]));

        let payload: SelfTestEvent = decode(&event);
        assert!(payload.timestamp >= before);
    }
}

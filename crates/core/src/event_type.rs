//! Closed enumeration of the event types flowing through the probe pipeline.
//!
//! Kernel event types describe activity captured by the probes; custom event
//! types describe the engine's own health and state. Both share one namespace
//! because custom events are routed through the same dispatch machinery as
//! detections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SecprobeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // ── Kernel events ─────────────────────────────────────────
    Exec,
    Fork,
    Exit,
    Open,
    Chmod,
    Chown,
    Mkdir,
    Rmdir,
    Rename,
    Unlink,
    Link,
    Setxattr,
    Removexattr,
    Utimes,
    Mount,
    Umount,
    Bpf,
    Ptrace,
    Mmap,
    Mprotect,
    LoadModule,
    UnloadModule,
    Signal,
    Splice,
    Selinux,

    // ── Custom events ─────────────────────────────────────────
    LostEventsRead,
    LostEventsWrite,
    RulesetLoaded,
    NoisyProcess,
    TruncatedParents,
    SelfTest,

    /// Reserved type for anything that cannot be classified.
    Unknown,
}

const KERNEL_TYPES: &[EventType] = &[
    EventType::Exec,
    EventType::Fork,
    EventType::Exit,
    EventType::Open,
    EventType::Chmod,
    EventType::Chown,
    EventType::Mkdir,
    EventType::Rmdir,
    EventType::Rename,
    EventType::Unlink,
    EventType::Link,
    EventType::Setxattr,
    EventType::Removexattr,
    EventType::Utimes,
    EventType::Mount,
    EventType::Umount,
    EventType::Bpf,
    EventType::Ptrace,
    EventType::Mmap,
    EventType::Mprotect,
    EventType::LoadModule,
    EventType::UnloadModule,
    EventType::Signal,
    EventType::Splice,
    EventType::Selinux,
];

const CUSTOM_TYPES: &[EventType] = &[
    EventType::LostEventsRead,
    EventType::LostEventsWrite,
    EventType::RulesetLoaded,
    EventType::NoisyProcess,
    EventType::TruncatedParents,
    EventType::SelfTest,
];

impl EventType {
    /// Stable wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Exec => "exec",
            EventType::Fork => "fork",
            EventType::Exit => "exit",
            EventType::Open => "open",
            EventType::Chmod => "chmod",
            EventType::Chown => "chown",
            EventType::Mkdir => "mkdir",
            EventType::Rmdir => "rmdir",
            EventType::Rename => "rename",
            EventType::Unlink => "unlink",
            EventType::Link => "link",
            EventType::Setxattr => "setxattr",
            EventType::Removexattr => "removexattr",
            EventType::Utimes => "utimes",
            EventType::Mount => "mount",
            EventType::Umount => "umount",
            EventType::Bpf => "bpf",
            EventType::Ptrace => "ptrace",
            EventType::Mmap => "mmap",
            EventType::Mprotect => "mprotect",
            EventType::LoadModule => "load_module",
            EventType::UnloadModule => "unload_module",
            EventType::Signal => "signal",
            EventType::Splice => "splice",
            EventType::Selinux => "selinux",
            EventType::LostEventsRead => "lost_events_read",
            EventType::LostEventsWrite => "lost_events_write",
            EventType::RulesetLoaded => "ruleset_loaded",
            EventType::NoisyProcess => "noisy_process",
            EventType::TruncatedParents => "truncated_parents",
            EventType::SelfTest => "self_test",
            EventType::Unknown => "unknown",
        }
    }

    /// Whether this type describes engine state rather than kernel activity.
    pub fn is_custom(&self) -> bool {
        CUSTOM_TYPES.contains(self)
    }

    /// All kernel event types, in declaration order.
    pub fn kernel_types() -> &'static [EventType] {
        KERNEL_TYPES
    }

    /// All custom event types, in declaration order. Excludes `Unknown`.
    pub fn custom_types() -> &'static [EventType] {
        CUSTOM_TYPES
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = SecprobeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        KERNEL_TYPES
            .iter()
            .chain(CUSTOM_TYPES)
            .chain(std::iter::once(&EventType::Unknown))
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| SecprobeError::UnknownEventType(s.to_string()))
    }
}

//! Lifecycle events recorded for every pipeline transition.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::ForgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ResearchStart,
    ResearchDone,
    Drafting,
    Validating,
    ValidatedOk,
    ValidatedFail,
    Saved,
    Error,
}

impl EventKind {
    pub const ALL: [Self; 8] = [
        Self::ResearchStart,
        Self::ResearchDone,
        Self::Drafting,
        Self::Validating,
        Self::ValidatedOk,
        Self::ValidatedFail,
        Self::Saved,
        Self::Error,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResearchStart => "research_start",
            Self::ResearchDone => "research_done",
            Self::Drafting => "drafting",
            Self::Validating => "validating",
            Self::ValidatedOk => "validated_ok",
            Self::ValidatedFail => "validated_fail",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }

    /// Whether this event closes a run.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Saved | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ForgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ForgeError::Store(format!("unknown event kind: {value}")))
    }
}

/// Immutable record of one pipeline state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub kind: EventKind,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            topic: topic.into(),
            skill_name: None,
            message: message.into(),
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_skill(mut self, name: impl Into<String>) -> Self {
        self.skill_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Metadata value as an unsigned integer.
    #[must_use]
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(JsonValue::as_u64)
    }

    #[must_use]
    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(JsonValue::as_bool)
    }

    /// Metadata value as a string.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("writing".parse::<EventKind>().is_err());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::ValidatedFail).unwrap();
        assert_eq!(json, "\"validated_fail\"");
    }

    #[test]
    fn builder_sets_skill_and_metadata() {
        let event = Event::new(EventKind::ResearchDone, "docker", "Collected 5 sources")
            .with_skill("docker-basics")
            .with_meta("sources_count", 5);
        assert_eq!(event.skill_name.as_deref(), Some("docker-basics"));
        assert_eq!(event.meta_u64("sources_count"), Some(5));
        assert!(!event.id.is_empty());
    }

    #[test]
    fn final_kinds() {
        assert!(EventKind::Saved.is_final());
        assert!(EventKind::Error.is_final());
        assert!(!EventKind::ValidatedOk.is_final());
    }
}

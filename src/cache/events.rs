//! Cache lifecycle events.

use serde::Serialize;

// == Cache Event ==
/// State transitions published by [`TtlCache`](super::TtlCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// `get` found a live entry
    #[serde(rename = "cache-hit")]
    Hit { key: String },
    /// `get` found nothing, or only an expired entry
    #[serde(rename = "cache-miss")]
    Miss { key: String },
    /// An entry was inserted or replaced
    #[serde(rename = "cache-set")]
    Set { key: String },
    /// An entry was removed, explicitly or by lazy expiry
    #[serde(rename = "cache-delete")]
    Delete { key: String },
    /// A sweep removed at least one expired entry
    #[serde(rename = "cache-cleanup", rename_all = "camelCase")]
    Cleanup { deleted_count: usize },
}

impl CacheEvent {
    /// Returns the event name as published on the event stream.
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "cache-hit",
            CacheEvent::Miss { .. } => "cache-miss",
            CacheEvent::Set { .. } => "cache-set",
            CacheEvent::Delete { .. } => "cache-delete",
            CacheEvent::Cleanup { .. } => "cache-cleanup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let hit = serde_json::to_value(CacheEvent::Hit { key: "k".into() }).unwrap();
        assert_eq!(hit, json!({"event": "cache-hit", "key": "k"}));

        let cleanup = serde_json::to_value(CacheEvent::Cleanup { deleted_count: 3 }).unwrap();
        assert_eq!(cleanup, json!({"event": "cache-cleanup", "deletedCount": 3}));
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let events = [
            CacheEvent::Hit { key: "a".into() },
            CacheEvent::Miss { key: "a".into() },
            CacheEvent::Set { key: "a".into() },
            CacheEvent::Delete { key: "a".into() },
            CacheEvent::Cleanup { deleted_count: 1 },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}

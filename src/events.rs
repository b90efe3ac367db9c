use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

pub type CharacterId = u64;

pub const VEHICLE_DESTROY_EVENT: &str = "VehicleDestroy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyEvent {
    pub timestamp: DateTime<Utc>,
    pub zone_id: u32,
    pub world_id: u32,
    pub vehicle_id: u32,
    pub victim_id: CharacterId,
    pub victim_team_id: u32,
    pub attacker_id: CharacterId,
    pub attacker_team_id: u32,
}

impl DestroyEvent {
    // Census sends ids as strings; plain numbers are accepted too.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if payload.get("event_name").and_then(Value::as_str) != Some(VEHICLE_DESTROY_EVENT) {
            return None;
        }
        let timestamp = value_to_i64(payload.get("timestamp"))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())?;
        Some(Self {
            timestamp,
            zone_id: value_to_u32(payload.get("zone_id"))?,
            world_id: value_to_u32(payload.get("world_id"))?,
            vehicle_id: value_to_u32(payload.get("vehicle_id"))?,
            victim_id: value_to_u64(payload.get("character_id"))?,
            victim_team_id: value_to_u32(payload.get("team_id"))
                .or_else(|| value_to_u32(payload.get("faction_id")))
                .unwrap_or(0),
            attacker_id: value_to_u64(payload.get("attacker_character_id")).unwrap_or(0),
            attacker_team_id: value_to_u32(payload.get("attacker_team_id")).unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FilterTarget {
    pub zone_id: u32,
    pub world_id: u32,
    pub vehicle_ids: HashSet<u32>,
}

#[derive(Debug, Clone)]
pub struct EventFilter {
    target: FilterTarget,
}

impl EventFilter {
    pub fn new(target: FilterTarget) -> Self {
        Self { target }
    }

    pub fn accept(&self, payload: &Value) -> Option<DestroyEvent> {
        let event = DestroyEvent::from_payload(payload)?;
        self.matches(&event).then_some(event)
    }

    pub fn matches(&self, event: &DestroyEvent) -> bool {
        event.zone_id == self.target.zone_id
            && event.world_id == self.target.world_id
            && self.target.vehicle_ids.contains(&event.vehicle_id)
    }
}

fn value_to_i64(value: Option<&Value>) -> Option<i64> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<i64>().ok())
        .or_else(|| value.and_then(Value::as_i64))
}

fn value_to_u64(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .or_else(|| value.and_then(Value::as_u64))
}

fn value_to_u32(value: Option<&Value>) -> Option<u32> {
    value_to_u64(value).and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use super::{DestroyEvent, EventFilter, FilterTarget};

    fn indar_jaeger_filter(vehicles: &[u32]) -> EventFilter {
        EventFilter::new(FilterTarget {
            zone_id: 2,
            world_id: 19,
            vehicle_ids: vehicles.iter().copied().collect::<HashSet<_>>(),
        })
    }

    fn sunderer_payload() -> Value {
        json!({
            "event_name": "VehicleDestroy",
            "timestamp": "1700000001",
            "world_id": "19",
            "zone_id": "2",
            "vehicle_id": "2",
            "character_id": "5428010618015189713",
            "team_id": "2",
            "attacker_character_id": "5428010618015189714",
            "attacker_team_id": "3",
            "attacker_vehicle_id": "0",
            "facility_id": "0"
        })
    }

    #[test]
    fn decodes_string_encoded_payload() {
        let event = DestroyEvent::from_payload(&sunderer_payload()).expect("payload should decode");
        assert_eq!(
            event.timestamp,
            Utc.timestamp_opt(1_700_000_001, 0).single().expect("valid timestamp")
        );
        assert_eq!(event.zone_id, 2);
        assert_eq!(event.world_id, 19);
        assert_eq!(event.vehicle_id, 2);
        assert_eq!(event.victim_id, 5_428_010_618_015_189_713);
        assert_eq!(event.victim_team_id, 2);
        assert_eq!(event.attacker_id, 5_428_010_618_015_189_714);
        assert_eq!(event.attacker_team_id, 3);
    }

    #[test]
    fn decodes_numeric_fields_and_faction_fallback() {
        let payload = json!({
            "event_name": "VehicleDestroy",
            "timestamp": 1700000001,
            "world_id": 19,
            "zone_id": 2,
            "vehicle_id": 7,
            "character_id": 100,
            "faction_id": 1
        });
        let event = DestroyEvent::from_payload(&payload).expect("payload should decode");
        assert_eq!(event.vehicle_id, 7);
        assert_eq!(event.victim_team_id, 1);
        assert_eq!(event.attacker_id, 0);
        assert_eq!(event.attacker_team_id, 0);
    }

    #[test]
    fn malformed_payloads_are_dropped() {
        let filter = indar_jaeger_filter(&[2]);
        let mut missing_zone = sunderer_payload();
        missing_zone
            .as_object_mut()
            .expect("object payload")
            .remove("zone_id");
        assert!(filter.accept(&missing_zone).is_none());

        let mut bad_victim = sunderer_payload();
        bad_victim["character_id"] = json!("not-a-number");
        assert!(filter.accept(&bad_victim).is_none());

        let mut death = sunderer_payload();
        death["event_name"] = json!("Death");
        assert!(filter.accept(&death).is_none());

        assert!(filter.accept(&json!("heartbeat")).is_none());
    }

    #[test]
    fn rejects_other_zone_or_world() {
        let filter = indar_jaeger_filter(&[2]);
        let mut other_zone = sunderer_payload();
        other_zone["zone_id"] = json!("4");
        assert!(filter.accept(&other_zone).is_none());

        let mut other_world = sunderer_payload();
        other_world["world_id"] = json!("1");
        assert!(filter.accept(&other_world).is_none());
    }

    #[test]
    fn rejects_untracked_vehicle_types() {
        let filter = indar_jaeger_filter(&[10, 11]);
        assert!(filter.accept(&sunderer_payload()).is_none());

        let mut unknown_vehicle = sunderer_payload();
        unknown_vehicle["vehicle_id"] = json!("2010");
        assert!(filter.accept(&unknown_vehicle).is_none());
    }

    #[test]
    fn tracked_event_passes_through_unchanged() {
        let filter = indar_jaeger_filter(&[2, 12]);
        let payload = sunderer_payload();
        let accepted = filter.accept(&payload).expect("tracked event should pass");
        let decoded = DestroyEvent::from_payload(&payload).expect("payload should decode");
        assert_eq!(accepted, decoded);
    }
}

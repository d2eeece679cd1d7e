//! Store events and their wire framing.
//!
//! Every event is serialized as a flat JSON object tagged by `type`, with the
//! variant's payload fields alongside and a `timestamp` appended, then framed
//! as a text/event-stream `data:` line.

use crate::state::ConnectionId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to the connections of a store.
///
/// Payload keys outside a variant's fields are rejected rather than dropped,
/// and optional fields that were sent are forwarded as sent (an empty
/// `peopleIds` list stays an empty list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum StoreEvent {
    /// Registration confirmation. Only the registry emits this.
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { client_id: ConnectionId },

    /// People or their space assignments changed.
    #[serde(rename = "people:changed", rename_all = "camelCase")]
    PeopleChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        people_ids: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_by: Option<String>,
    },

    /// A saved people list was loaded onto the labels.
    #[serde(rename = "list:loaded", rename_all = "camelCase")]
    ListLoaded {
        list: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loaded_by: Option<String>,
    },

    /// A loaded list was released.
    #[serde(rename = "list:freed", rename_all = "camelCase")]
    ListFreed {
        list: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        freed_by: Option<String>,
    },

    /// A list's contents were edited.
    #[serde(rename = "list:updated", rename_all = "camelCase")]
    ListUpdated {
        list: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_by: Option<String>,
    },

    /// A conference room's meeting state was toggled.
    #[serde(rename = "conference:changed", rename_all = "camelCase")]
    ConferenceChanged {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_meeting: Option<bool>,
    },
}

impl StoreEvent {
    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::PeopleChanged { .. } => "people:changed",
            Self::ListLoaded { .. } => "list:loaded",
            Self::ListFreed { .. } => "list:freed",
            Self::ListUpdated { .. } => "list:updated",
            Self::ConferenceChanged { .. } => "conference:changed",
        }
    }

    /// Whether callers outside the registry may publish this event.
    pub fn is_publishable(&self) -> bool {
        !matches!(self, Self::Connected { .. })
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a StoreEvent,
    timestamp: String,
}

/// Encode an event as a `data:` frame stamped with `at`.
///
/// Output is `data: {"type":..., <payload>, "timestamp": <ISO-8601>}\n\n`.
pub fn encode_frame(event: &StoreEvent, at: DateTime<Utc>) -> Result<String, serde_json::Error> {
    let envelope = Envelope {
        event,
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let json = serde_json::to_string(&envelope)?;
    Ok(format!("data: {json}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn decode(frame: &str) -> Value {
        let body = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("frame must be a data line followed by a blank line");
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_frame_is_flat_json_with_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let event = StoreEvent::PeopleChanged {
            count: Some(5),
            people_ids: None,
            updated_by: None,
        };

        let frame = encode_frame(&event, at).unwrap();
        let json = decode(&frame);

        assert_eq!(json["type"], "people:changed");
        assert_eq!(json["count"], 5);
        assert_eq!(json["timestamp"], "2026-03-01T09:30:00.000Z");
        assert!(json.get("peopleIds").is_none());
        assert!(json.get("updatedBy").is_none());
    }

    #[test]
    fn test_connected_frame_carries_client_id() {
        let event = StoreEvent::Connected {
            client_id: "c1".into(),
        };
        let json = decode(&encode_frame(&event, Utc::now()).unwrap());
        assert_eq!(json["type"], "connected");
        assert_eq!(json["clientId"], "c1");
        assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_payload_keys_are_camel_case() {
        let event = StoreEvent::ConferenceChanged {
            room_id: "room-7".into(),
            has_meeting: Some(true),
        };
        let json = decode(&encode_frame(&event, Utc::now()).unwrap());
        assert_eq!(json["type"], "conference:changed");
        assert_eq!(json["roomId"], "room-7");
        assert_eq!(json["hasMeeting"], true);
    }

    #[test]
    fn test_parse_published_events() {
        let event: StoreEvent =
            serde_json::from_str(r#"{"type":"list:loaded","list":"A","loadedBy":"Dana"}"#)
                .unwrap();
        assert_eq!(
            event,
            StoreEvent::ListLoaded {
                list: "A".into(),
                loaded_by: Some("Dana".into())
            }
        );
        assert_eq!(event.kind(), "list:loaded");
        assert!(event.is_publishable());

        let event: StoreEvent = serde_json::from_str(r#"{"type":"people:changed"}"#).unwrap();
        assert_eq!(event.kind(), "people:changed");
    }

    #[test]
    fn test_empty_people_ids_survive_to_frame() {
        let event: StoreEvent =
            serde_json::from_str(r#"{"type":"people:changed","count":2,"peopleIds":[]}"#)
                .unwrap();
        assert_eq!(
            event,
            StoreEvent::PeopleChanged {
                count: Some(2),
                people_ids: Some(vec![]),
                updated_by: None,
            }
        );

        let json = decode(&encode_frame(&event, Utc::now()).unwrap());
        assert_eq!(json["count"], 2);
        assert_eq!(json["peopleIds"], serde_json::json!([]));
    }

    #[test]
    fn test_unknown_payload_key_is_rejected() {
        let result = serde_json::from_str::<StoreEvent>(
            r#"{"type":"people:changed","count":1,"spaceId":"sp-4"}"#,
        );
        assert!(result.is_err());

        let result = serde_json::from_str::<StoreEvent>(
            r#"{"type":"conference:changed","roomId":"r1","hasMeeting":true,"extra":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<StoreEvent>(r#"{"type":"labels:exploded"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_connected_is_not_publishable() {
        let event: StoreEvent =
            serde_json::from_str(r#"{"type":"connected","clientId":"spoof"}"#).unwrap();
        assert!(!event.is_publishable());
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let events = [
            StoreEvent::ListFreed {
                list: "B".into(),
                freed_by: None,
            },
            StoreEvent::ListUpdated {
                list: "B".into(),
                updated_by: Some("Lee".into()),
            },
        ];
        for event in &events {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json["type"], event.kind());
        }
    }
}

//! Boundary validation of inbound bridge requests and id-based lookups.
//!
//! Requests arrive as loosely typed JSON objects. Each request type declares
//! the fields it needs; [`parse_request`] checks them once and hands back a
//! strongly typed value. Lookups scan the current room snapshot and return
//! `None` when nothing matches.

use serde_json::{Map, Value};

use crate::errors::BridgeError;
use crate::sdk::{Peer, Role, Room, Track, TrackKind};

/// Coarse JSON types a required field may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Array,
    Number,
    Object,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Number => value.is_number(),
            FieldType::Object => value.is_object(),
        }
    }
}

/// True when `data` is an object holding every key with the declared type.
pub fn has_required_keys(data: &Value, keys: &[(&str, FieldType)]) -> bool {
    let Some(map) = data.as_object() else {
        return false;
    };
    keys.iter()
        .all(|(key, ty)| map.get(*key).is_some_and(|v| ty.matches(v)))
}

/// Typed view over a request object that already passed validation.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn typed(&self, key: &str, ty: FieldType) -> Option<&'a Value> {
        self.map.get(key).filter(|v| ty.matches(v))
    }

    pub fn string(&self, key: &str) -> String {
        self.opt_string(key).unwrap_or_default()
    }

    pub fn boolean(&self, key: &str) -> bool {
        self.opt_boolean(key).unwrap_or_default()
    }

    pub fn number(&self, key: &str) -> f64 {
        self.typed(key, FieldType::Number)
            .and_then(Value::as_f64)
            .unwrap_or_default()
    }

    pub fn strings(&self, key: &str) -> Vec<String> {
        self.opt_strings(key).unwrap_or_default()
    }

    pub fn array(&self, key: &str) -> Vec<Value> {
        self.typed(key, FieldType::Array)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    /// Optional fields only count when their type matches.
    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.typed(key, FieldType::String)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn opt_boolean(&self, key: &str) -> Option<bool> {
        self.typed(key, FieldType::Boolean).and_then(Value::as_bool)
    }

    pub fn opt_strings(&self, key: &str) -> Option<Vec<String>> {
        self.typed(key, FieldType::Array)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
    }

    pub fn opt_object(&self, key: &str) -> Option<&'a Value> {
        self.typed(key, FieldType::Object)
    }

    /// Raw value, any type; `null` is reported as absent.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.map.get(key).filter(|v| !v.is_null()).cloned()
    }
}

/// A request shape accepted across the bridge.
pub trait BridgeRequest: Sized {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)];

    fn from_fields(fields: &Fields<'_>) -> Self;
}

/// Validate `data` against `T::REQUIRED_KEYS` and build the typed request.
pub fn parse_request<T: BridgeRequest>(data: &Value) -> Result<T, BridgeError> {
    if !has_required_keys(data, T::REQUIRED_KEYS) {
        return Err(BridgeError::RequiredKeysNotFound);
    }
    let map = data.as_object().ok_or(BridgeError::RequiredKeysNotFound)?;
    Ok(T::from_fields(&Fields { map }))
}

pub fn find_peer<'a>(peer_id: &str, room: Option<&'a Room>) -> Option<&'a Peer> {
    room?.peers.iter().find(|p| p.peer_id == peer_id)
}

/// Any track, local or remote, regular or auxiliary.
pub fn find_track<'a>(track_id: &str, room: Option<&'a Room>) -> Option<&'a Track> {
    room?
        .peers
        .iter()
        .flat_map(Peer::tracks)
        .find(|t| t.track_id == track_id)
}

fn find_remote_track_of_kind<'a>(
    track_id: &str,
    kind: TrackKind,
    room: Option<&'a Room>,
) -> Option<&'a Track> {
    room?
        .remote_peers()
        .flat_map(Peer::tracks)
        .find(|t| t.kind == kind && t.track_id == track_id)
}

pub fn find_remote_audio_track<'a>(track_id: &str, room: Option<&'a Room>) -> Option<&'a Track> {
    find_remote_track_of_kind(track_id, TrackKind::Audio, room)
}

pub fn find_remote_video_track<'a>(track_id: &str, room: Option<&'a Room>) -> Option<&'a Track> {
    find_remote_track_of_kind(track_id, TrackKind::Video, room)
}

pub fn find_role<'a>(name: &str, roles: &'a [Role]) -> Option<&'a Role> {
    roles.iter().find(|r| r.name == name)
}

/// Known roles whose names are listed, in SDK order. Unknown names are
/// skipped.
pub fn roles_from_names(names: &[String], roles: &[Role]) -> Vec<Role> {
    roles
        .iter()
        .filter(|r| names.iter().any(|n| n == &r.name))
        .cloned()
        .collect()
}

/// Every audio track in the room, including auxiliary audio.
pub fn all_audio_tracks(room: Option<&Room>) -> Vec<Track> {
    room.map(|r| {
        r.peers
            .iter()
            .flat_map(Peer::tracks)
            .filter(|t| t.kind == TrackKind::Audio)
            .cloned()
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_sdk::fixtures;
    use serde_json::json;

    struct Probe {
        name: String,
        loud: bool,
    }

    impl BridgeRequest for Probe {
        const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
            &[("name", FieldType::String), ("loud", FieldType::Boolean)];

        fn from_fields(fields: &Fields<'_>) -> Self {
            Self {
                name: fields.string("name"),
                loud: fields.boolean("loud"),
            }
        }
    }

    #[test]
    fn required_keys_need_presence_and_type() {
        let keys = [("a", FieldType::String), ("b", FieldType::Number)];
        assert!(has_required_keys(&json!({"a": "x", "b": 1.5}), &keys));
        assert!(!has_required_keys(&json!({"a": "x"}), &keys));
        assert!(!has_required_keys(&json!({"a": 1, "b": 1}), &keys));
        assert!(!has_required_keys(&json!({"a": null, "b": 1}), &keys));
        assert!(!has_required_keys(&json!(["a", "b"]), &keys));
        assert!(has_required_keys(&json!({}), &[]));
    }

    #[test]
    fn parse_request_builds_typed_value() {
        let probe: Probe = parse_request(&json!({"name": "n", "loud": true})).unwrap();
        assert_eq!(probe.name, "n");
        assert!(probe.loud);

        let err = parse_request::<Probe>(&json!({"name": "n"})).err();
        assert_eq!(err, Some(BridgeError::RequiredKeysNotFound));
    }

    #[test]
    fn optional_fields_with_wrong_type_are_ignored() {
        let data = json!({"endpoint": 42, "metadata": "m", "roles": ["a", 3, "b"]});
        let map = data.as_object().unwrap();
        let fields = Fields { map };
        assert_eq!(fields.opt_string("endpoint"), None);
        assert_eq!(fields.opt_string("metadata").as_deref(), Some("m"));
        assert_eq!(fields.strings("roles"), vec!["a", "b"]);
        assert_eq!(fields.opt_strings("missing"), None);
    }

    #[test]
    fn lookups_scan_room_snapshot() {
        let room = fixtures::room();
        assert_eq!(find_peer("local", Some(&room)).unwrap().name, "Me");
        assert_eq!(find_peer("p1", Some(&room)).unwrap().name, "Alice");
        assert!(find_peer("ghost", Some(&room)).is_none());
        assert!(find_peer("p1", None).is_none());
    }

    #[test]
    fn track_lookup_covers_auxiliary_tracks() {
        let room = fixtures::room();
        assert_eq!(find_track("p2-screen", Some(&room)).unwrap().kind, TrackKind::Video);
        assert!(find_track("local-audio", Some(&room)).is_some());
        assert!(find_track("abc", Some(&room)).is_none());
        assert!(find_remote_audio_track("local-audio", Some(&room)).is_none());
        assert!(find_remote_audio_track("p1-audio", Some(&room)).is_some());
        assert!(find_remote_video_track("p1-audio", Some(&room)).is_none());
    }

    #[test]
    fn roles_from_names_skips_unknown() {
        let roles = fixtures::roles();
        let picked = roles_from_names(&["viewer".into(), "nobody".into()], &roles);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "viewer");
        assert!(find_role("host", &roles).is_some());
    }

    #[test]
    fn all_audio_tracks_in_room() {
        let room = fixtures::room();
        let ids: Vec<_> = all_audio_tracks(Some(&room))
            .into_iter()
            .map(|t| t.track_id)
            .collect();
        assert_eq!(ids, vec!["local-audio", "p1-audio", "p2-audio"]);
        assert!(all_audio_tracks(None).is_empty());
    }
}

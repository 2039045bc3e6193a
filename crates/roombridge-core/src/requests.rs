//! Request shapes accepted by each bridge operation.

use serde_json::Value;

use crate::sdk::{HlsMeetingUrlVariant, HlsRecordingConfig, JoinConfig, TrackKind};
use crate::validate::{BridgeRequest, FieldType, Fields};

use crate::validate::FieldType::{Array, Boolean, Number, String as Str};

/// `{username, authToken, endpoint?, metadata?}` for preview and join.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials(pub JoinConfig);

impl BridgeRequest for Credentials {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("username", Str), ("authToken", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self(JoinConfig {
            username: fields.string("username"),
            auth_token: fields.string("authToken"),
            endpoint: fields.opt_string("endpoint"),
            metadata: fields.opt_string("metadata"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastMessage {
    pub message: String,
    pub message_type: String,
}

impl BridgeRequest for BroadcastMessage {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("message", Str), ("type", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            message: fields.string("message"),
            message_type: fields.string("type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMessage {
    pub message: String,
    pub message_type: String,
    pub roles: Vec<String>,
}

impl BridgeRequest for GroupMessage {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("message", Str), ("roles", Array), ("type", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            message: fields.string("message"),
            message_type: fields.string("type"),
            roles: fields.strings("roles"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectMessage {
    pub message: String,
    pub message_type: String,
    pub peer_id: String,
}

impl BridgeRequest for DirectMessage {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("message", Str), ("peerId", Str), ("type", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            message: fields.string("message"),
            message_type: fields.string("type"),
            peer_id: fields.string("peerId"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRole {
    pub peer_id: String,
    pub role: String,
    pub force: bool,
}

impl BridgeRequest for ChangeRole {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("peerId", Str), ("role", Str), ("force", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            peer_id: fields.string("peerId"),
            role: fields.string("role"),
            force: fields.boolean("force"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTrackState {
    pub track_id: String,
    pub mute: bool,
}

impl BridgeRequest for ChangeTrackState {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("trackId", Str), ("mute", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            track_id: fields.string("trackId"),
            mute: fields.boolean("mute"),
        }
    }
}

/// `{mute, type?, source?, roles?}`; each absent filter means "all".
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTrackStateForRoles {
    pub mute: bool,
    pub kind: Option<TrackKind>,
    pub source: Option<String>,
    pub roles: Option<Vec<String>>,
}

impl BridgeRequest for ChangeTrackStateForRoles {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("mute", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            mute: fields.boolean("mute"),
            // Anything but audio targets video.
            kind: fields.opt_string("type").map(|t| {
                if t.eq_ignore_ascii_case(TrackKind::Audio.as_str()) {
                    TrackKind::Audio
                } else {
                    TrackKind::Video
                }
            }),
            source: fields.opt_string("source"),
            roles: fields.opt_strings("roles"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemovePeer {
    pub peer_id: String,
    pub reason: String,
}

impl BridgeRequest for RemovePeer {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("peerId", Str), ("reason", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            peer_id: fields.string("peerId"),
            reason: fields.string("reason"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndRoom {
    pub lock: bool,
    pub reason: String,
}

impl BridgeRequest for EndRoom {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("lock", Boolean), ("reason", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            lock: fields.boolean("lock"),
            reason: fields.string("reason"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackId {
    pub track_id: String,
}

impl BridgeRequest for TrackId {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("trackId", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            track_id: fields.string("trackId"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetVolume {
    pub track_id: String,
    pub volume: f64,
}

impl BridgeRequest for SetVolume {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("trackId", Str), ("volume", Number)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            track_id: fields.string("trackId"),
            volume: fields.number("volume"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPlaybackAllowed {
    pub track_id: String,
    pub playback_allowed: bool,
}

impl BridgeRequest for SetPlaybackAllowed {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("trackId", Str), ("playbackAllowed", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            track_id: fields.string("trackId"),
            playback_allowed: fields.boolean("playbackAllowed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mute {
    pub mute: bool,
}

impl BridgeRequest for Mute {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("mute", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            mute: fields.boolean("mute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalMute {
    pub is_mute: bool,
}

impl BridgeRequest for LocalMute {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("isMute", Boolean)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            is_mute: fields.boolean("isMute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMetadata {
    pub metadata: String,
}

impl BridgeRequest for ChangeMetadata {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("metadata", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            metadata: fields.string("metadata"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeName {
    pub name: String,
}

impl BridgeRequest for ChangeName {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("name", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            name: fields.string("name"),
        }
    }
}

/// `{meetingURL, record, rtmpURLs?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRtmpOrRecording {
    pub meeting_url: String,
    pub record: bool,
    pub rtmp_urls: Vec<String>,
}

impl BridgeRequest for StartRtmpOrRecording {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] =
        &[("record", Boolean), ("meetingURL", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            meeting_url: fields.string("meetingURL"),
            record: fields.boolean("record"),
            rtmp_urls: fields.strings("rtmpURLs"),
        }
    }
}

/// `{meetingURLVariants: [{meetingUrl, metadata}], recordingConfig?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StartHlsStreaming {
    pub variants: Vec<HlsMeetingUrlVariant>,
    pub recording: Option<HlsRecordingConfig>,
}

impl BridgeRequest for StartHlsStreaming {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("meetingURLVariants", Array)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        let variants = fields
            .array("meetingURLVariants")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<HlsMeetingUrlVariant>(v).ok())
            .collect();
        let recording = fields
            .opt_object("recordingConfig")
            .and_then(|v| serde_json::from_value::<HlsRecordingConfig>(v.clone()).ok());
        Self {
            variants,
            recording,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStoreKey {
    pub key: String,
}

impl BridgeRequest for SessionStoreKey {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("key", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            key: fields.string("key"),
        }
    }
}

/// `{key, value?}`; an absent or null value clears the key.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStoreSet {
    pub key: String,
    pub value: Option<Value>,
}

impl BridgeRequest for SessionStoreSet {
    const REQUIRED_KEYS: &'static [(&'static str, FieldType)] = &[("key", Str)];

    fn from_fields(fields: &Fields<'_>) -> Self {
        Self {
            key: fields.string("key"),
            value: fields.raw("value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BridgeError;
    use crate::validate::parse_request;
    use serde_json::json;

    #[test]
    fn credentials_layer_optional_endpoint_and_metadata() {
        let Credentials(config) =
            parse_request(&json!({"username": "u", "authToken": "t"})).unwrap();
        assert_eq!(config.endpoint, None);
        assert_eq!(config.metadata, None);

        let Credentials(config) = parse_request(&json!({
            "username": "u", "authToken": "t", "endpoint": "https://init", "metadata": "{}"
        }))
        .unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://init"));
        assert_eq!(config.metadata.as_deref(), Some("{}"));
    }

    #[test]
    fn credentials_require_username_and_token() {
        for data in [
            json!({"authToken": "t"}),
            json!({"username": "u"}),
            json!({"username": 7, "authToken": "t"}),
            json!(null),
        ] {
            assert_eq!(
                parse_request::<Credentials>(&data).err(),
                Some(BridgeError::RequiredKeysNotFound)
            );
        }
    }

    #[test]
    fn track_state_for_roles_defaults_to_all() {
        let req: ChangeTrackStateForRoles = parse_request(&json!({"mute": true})).unwrap();
        assert!(req.mute);
        assert_eq!(req.kind, None);
        assert_eq!(req.source, None);
        assert_eq!(req.roles, None);

        let req: ChangeTrackStateForRoles =
            parse_request(&json!({"mute": false, "type": "AUDIO", "roles": ["guest"]})).unwrap();
        assert_eq!(req.kind, Some(TrackKind::Audio));
        assert_eq!(req.roles, Some(vec!["guest".to_string()]));

        let lower: ChangeTrackStateForRoles =
            parse_request(&json!({"mute": true, "type": "audio"})).unwrap();
        assert_eq!(lower.kind, Some(TrackKind::Audio));
        let other: ChangeTrackStateForRoles =
            parse_request(&json!({"mute": true, "type": "screen"})).unwrap();
        assert_eq!(other.kind, Some(TrackKind::Video));
    }

    #[test]
    fn hls_request_parses_variants_and_recording() {
        let req: StartHlsStreaming = parse_request(&json!({
            "meetingURLVariants": [{"meetingUrl": "https://m", "metadata": "x"}],
            "recordingConfig": {"singleFilePerLayer": true}
        }))
        .unwrap();
        assert_eq!(req.variants.len(), 1);
        assert_eq!(req.variants[0].meeting_url, "https://m");
        assert!(req.recording.unwrap().single_file_per_layer);
    }

    #[test]
    fn recording_request_defaults_rtmp_urls() {
        let req: StartRtmpOrRecording =
            parse_request(&json!({"meetingURL": "https://m", "record": true})).unwrap();
        assert!(req.rtmp_urls.is_empty());
    }
}

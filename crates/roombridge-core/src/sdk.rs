//! Object model and trait for the wrapped conferencing SDK.
//!
//! The vendor SDK owns every room, peer and track. This crate only observes
//! them through [`NativeSdk`] snapshots and drives them through its
//! asynchronous actions. Hosts implement the trait on top of the real
//! Kotlin/Swift SDK; tests implement it with an in-memory mock.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Completion of a native action-result listener.
pub type SdkResult<T> = BoxFuture<'static, Result<T, SdkError>>;

/// Channel the SDK pushes listener callbacks into.
pub type SdkEventSender = mpsc::UnboundedSender<SdkEvent>;
pub type SdkEventReceiver = mpsc::UnboundedReceiver<SdkEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "AUDIO",
            TrackKind::Video => "VIDEO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    #[default]
    Regular,
    Screen,
    Plugin,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Regular => "regular",
            TrackSource::Screen => "screen",
            TrackSource::Plugin => "plugin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub track_id: String,
    pub kind: TrackKind,
    #[serde(default)]
    pub source: TrackSource,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_mute: bool,
    /// Subscriber-side playback switch, only present on remote tracks.
    #[serde(default)]
    pub playback_allowed: Option<bool>,
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishSettings {
    /// Media kinds the role may publish: "audio", "video", "screen".
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub change_role: bool,
    pub end_room: bool,
    pub remove_others: bool,
    pub mute: bool,
    pub unmute: bool,
    pub rtmp_streaming: bool,
    pub hls_streaming: bool,
    pub browser_recording: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub publish_settings: Option<PublishSettings>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub peer_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub customer_user_id: Option<String>,
    #[serde(default)]
    pub audio_track: Option<Track>,
    #[serde(default)]
    pub video_track: Option<Track>,
    #[serde(default)]
    pub auxiliary_tracks: Vec<Track>,
    #[serde(default)]
    pub network_quality: Option<i32>,
}

impl Peer {
    /// Audio, video and auxiliary tracks in SDK order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.audio_track
            .iter()
            .chain(self.video_track.iter())
            .chain(self.auxiliary_tracks.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingState {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsVariant {
    pub hls_stream_url: Option<String>,
    pub meeting_url: Option<String>,
    pub metadata: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsStreamingState {
    pub running: bool,
    pub variants: Vec<HlsVariant>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Room {
    pub id: String,
    pub name: Option<String>,
    pub metadata: Option<String>,
    pub peer_count: Option<u32>,
    /// Every peer in the room, local peer included.
    pub peers: Vec<Peer>,
    pub browser_recording_state: RecordingState,
    pub server_recording_state: RecordingState,
    pub rtmp_streaming_state: RecordingState,
    pub hls_recording_state: RecordingState,
    pub hls_streaming_state: HlsStreamingState,
}

impl Room {
    pub fn local_peer(&self) -> Option<&Peer> {
        self.peers.iter().find(|p| p.is_local)
    }

    pub fn remote_peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().filter(|p| !p.is_local)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub sender: Option<Peer>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
    pub server_receive_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speaker {
    #[serde(default)]
    pub peer: Option<Peer>,
    pub level: i32,
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequest {
    #[serde(default)]
    pub requested_by: Option<Peer>,
    pub suggested_role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTrackStateRequest {
    #[serde(default)]
    pub requested_by: Option<Peer>,
    pub track_type: TrackKind,
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedFromRoom {
    #[serde(default)]
    pub peer_who_removed: Option<Peer>,
    #[serde(default)]
    pub room_was_ended: bool,
    #[serde(default)]
    pub reason: String,
}

/// Error reported by the native SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message}")]
pub struct SdkError {
    pub code: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub is_terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerUpdate {
    PeerJoined,
    PeerLeft,
    AudioToggled,
    VideoToggled,
    BecameDominantSpeaker,
    NoDominantSpeaker,
    ResignedDominantSpeaker,
    StartedSpeaking,
    StoppedSpeaking,
    RoleChanged,
    NameChanged,
    MetadataChanged,
    NetworkQualityUpdated,
}

impl PeerUpdate {
    /// Updates never forwarded across the bridge.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PeerUpdate::AudioToggled
                | PeerUpdate::VideoToggled
                | PeerUpdate::BecameDominantSpeaker
                | PeerUpdate::NoDominantSpeaker
                | PeerUpdate::ResignedDominantSpeaker
                | PeerUpdate::StartedSpeaking
                | PeerUpdate::StoppedSpeaking
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomUpdate {
    RoomPeerCountUpdated,
    BrowserRecordingStateUpdated,
    ServerRecordingStateUpdated,
    RtmpStreamingStateUpdated,
    HlsStreamingStateUpdated,
    HlsRecordingStateUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackUpdate {
    TrackAdded,
    TrackRemoved,
    TrackMuted,
    TrackUnmuted,
    TrackDescriptionChanged,
    TrackDegraded,
    TrackRestored,
}

/// Listener callbacks delivered by the SDK, in invocation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SdkEvent {
    Preview { room: Room, local_tracks: Vec<Track> },
    Join { room: Room },
    PeerUpdate { update: PeerUpdate, peer: Peer },
    RoomUpdate { update: RoomUpdate, room: Room },
    TrackUpdate { update: TrackUpdate, track: Track, peer: Peer },
    Message(Message),
    Speakers { speakers: Vec<Speaker> },
    Error(SdkError),
    Reconnecting(SdkError),
    Reconnected,
    RoleChangeRequest(RoleChangeRequest),
    ChangeTrackStateRequest(ChangeTrackStateRequest),
    RemovedFromRoom(RemovedFromRoom),
    SessionStoreAvailable,
    SessionStoreChanged {
        key: String,
        value: Option<serde_json::Value>,
    },
    /// Host entered or left picture-in-picture.
    PipModeChanged { active: bool },
    /// The user left the room from the picture-in-picture controls.
    PipRoomLeave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    pub username: String,
    pub auth_token: String,
    pub endpoint: Option<String>,
    pub metadata: Option<String>,
}

/// Capture settings applied when the host builds its SDK instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackSettings {
    pub audio_muted_on_join: bool,
    pub video_muted_on_join: bool,
    pub use_hardware_echo_cancellation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    pub meeting_url: String,
    pub rtmp_urls: Vec<String>,
    pub record: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsMeetingUrlVariant {
    pub meeting_url: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HlsRecordingConfig {
    pub single_file_per_layer: bool,
    pub video_on_demand: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsConfig {
    pub variants: Vec<HlsMeetingUrlVariant>,
    pub recording: Option<HlsRecordingConfig>,
}

/// Remote mute/unmute request scoped by kind, source and roles.
/// `None` means "all".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStateForRoles {
    pub mute: bool,
    pub kind: Option<TrackKind>,
    pub source: Option<String>,
    pub roles: Option<Vec<Role>>,
}

/// The vendor SDK as seen by the bridge.
pub trait NativeSdk: Send + Sync {
    fn preview(&self, config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError>;
    fn join(&self, config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError>;
    fn leave(&self) -> SdkResult<()>;

    fn room(&self) -> Option<Room>;
    fn local_peer(&self) -> Option<Peer>;
    fn remote_peers(&self) -> Vec<Peer>;
    fn roles(&self) -> Vec<Role>;
    fn is_screen_shared(&self) -> bool;

    fn send_broadcast_message(&self, message: &str, message_type: &str) -> SdkResult<Message>;
    fn send_group_message(
        &self,
        message: &str,
        message_type: &str,
        roles: &[Role],
    ) -> SdkResult<Message>;
    fn send_direct_message(&self, message: &str, message_type: &str, peer: &Peer)
    -> SdkResult<Message>;

    fn change_role(&self, peer: &Peer, role: &Role, force: bool) -> SdkResult<()>;
    fn accept_change_role(&self, request: &RoleChangeRequest) -> SdkResult<()>;
    fn change_track_state(&self, track: &Track, mute: bool) -> SdkResult<()>;
    fn change_track_state_for_roles(&self, request: &TrackStateForRoles) -> SdkResult<()>;
    fn remove_peer(&self, peer: &Peer, reason: &str) -> SdkResult<()>;
    fn end_room(&self, reason: &str, lock: bool) -> SdkResult<()>;
    fn change_metadata(&self, metadata: &str) -> SdkResult<()>;
    fn change_name(&self, name: &str) -> SdkResult<()>;

    fn start_rtmp_or_recording(&self, config: &RecordingConfig) -> SdkResult<()>;
    fn stop_rtmp_and_recording(&self) -> SdkResult<()>;
    fn start_hls_streaming(&self, config: &HlsConfig) -> SdkResult<()>;
    fn stop_hls_streaming(&self) -> SdkResult<()>;
    fn stop_screenshare(&self) -> SdkResult<()>;
    fn switch_camera(&self) -> SdkResult<()>;

    fn set_local_audio_mute(&self, mute: bool);
    fn set_local_video_mute(&self, mute: bool);
    fn set_playback_allowed(&self, track: &Track, allowed: bool);
    fn set_volume(&self, track: &Track, volume: f64);

    fn session_store_get(&self, key: &str) -> SdkResult<Option<serde_json::Value>>;
    fn session_store_set(&self, key: &str, value: Option<serde_json::Value>) -> SdkResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_peer_updates() {
        assert!(PeerUpdate::AudioToggled.is_transient());
        assert!(PeerUpdate::StoppedSpeaking.is_transient());
        assert!(!PeerUpdate::PeerJoined.is_transient());
        assert!(!PeerUpdate::RoleChanged.is_transient());
    }

    #[test]
    fn sdk_event_parses_from_host_json() {
        let json = r#"{
            "event": "TRACK_UPDATE",
            "update": "TRACK_MUTED",
            "track": {"trackId": "t1", "kind": "AUDIO", "isMute": true},
            "peer": {"peerId": "p1", "name": "Alice"}
        }"#;
        let event: SdkEvent = serde_json::from_str(json).unwrap();
        match event {
            SdkEvent::TrackUpdate { update, track, peer } => {
                assert_eq!(update, TrackUpdate::TrackMuted);
                assert_eq!(track.source, TrackSource::Regular);
                assert!(track.is_mute);
                assert_eq!(peer.peer_id, "p1");
                assert!(!peer.is_local);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unit_sdk_event_parses() {
        let event: SdkEvent = serde_json::from_str(r#"{"event": "RECONNECTED"}"#).unwrap();
        assert_eq!(event, SdkEvent::Reconnected);
    }

    #[test]
    fn room_splits_local_and_remote_peers() {
        let peer = |id: &str, is_local| Peer {
            peer_id: id.to_string(),
            name: id.to_string(),
            is_local,
            role: None,
            metadata: None,
            customer_user_id: None,
            audio_track: None,
            video_track: None,
            auxiliary_tracks: Vec::new(),
            network_quality: None,
        };
        let room = Room {
            peers: vec![peer("a", false), peer("me", true), peer("b", false)],
            ..Default::default()
        };
        assert_eq!(room.local_peer().unwrap().peer_id, "me");
        let remote: Vec<_> = room.remote_peers().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(remote, vec!["a", "b"]);
    }
}

//! Detached, serializable copies of SDK objects.
//!
//! Every function here is pure. Absent inputs yield `None` (serialized as
//! `null`) instead of failing, and collections keep the SDK's order. Field
//! names are consumed verbatim by the application layer and must not change.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sdk::{
    ChangeTrackStateRequest, HlsStreamingState, Message, Peer, RecordingState,
    RemovedFromRoom, Role, RoleChangeRequest, Room, Speaker, SdkError, Track, TrackKind,
    TrackSource,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub track_id: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub source: TrackSource,
    pub track_description: String,
    pub is_mute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSettingsRecord {
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsRecord {
    pub change_role: bool,
    pub end_room: bool,
    pub remove_others: bool,
    pub mute: bool,
    pub unmute: bool,
    pub rtmp_streaming: bool,
    pub hls_streaming: bool,
    pub browser_recording: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub name: String,
    pub publish_settings: Option<PublishSettingsRecord>,
    pub permissions: Option<PermissionsRecord>,
    pub priority: Option<i32>,
}

impl RoleRecord {
    /// True when the role may publish at least one kind of media.
    pub fn can_publish(&self) -> bool {
        self.publish_settings
            .as_ref()
            .is_some_and(|s| !s.allowed.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    #[serde(rename = "peerID")]
    pub peer_id: String,
    pub name: String,
    pub is_local: bool,
    #[serde(rename = "customerUserID")]
    pub customer_user_id: Option<String>,
    pub metadata: Option<String>,
    pub role: Option<RoleRecord>,
    pub audio_track: Option<TrackRecord>,
    pub video_track: Option<TrackRecord>,
    pub auxiliary_tracks: Vec<TrackRecord>,
    pub network_quality: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStateRecord {
    pub running: bool,
    /// Milliseconds since the Unix epoch.
    pub started_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsVariantRecord {
    pub hls_stream_url: Option<String>,
    pub meeting_url: Option<String>,
    pub metadata: Option<String>,
    pub started_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsStreamingStateRecord {
    pub running: bool,
    pub variants: Vec<HlsVariantRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "metaData")]
    pub metadata: Option<String>,
    pub peer_count: Option<u32>,
    pub local_peer: Option<PeerRecord>,
    pub peers: Vec<PeerRecord>,
    pub browser_recording_state: RecordingStateRecord,
    pub server_recording_state: RecordingStateRecord,
    #[serde(rename = "rtmpHMSRtmpStreamingState")]
    pub rtmp_streaming_state: RecordingStateRecord,
    pub hls_recording_state: RecordingStateRecord,
    pub hls_streaming_state: HlsStreamingStateRecord,
}

/// Error shape shared with the application: `{code, description, message,
/// action, isTerminal}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub code: i32,
    pub description: String,
    pub message: String,
    pub action: String,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTracksRecord {
    pub audio_track: Option<TrackRecord>,
    pub video_track: Option<TrackRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerRecord {
    pub peer: Option<PeerRecord>,
    pub level: i32,
    pub track: Option<TrackRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender: Option<String>,
    pub message: String,
    #[serde(rename = "type")]
    pub message_type: String,
    /// RFC 3339 server receive time.
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeRequestRecord {
    pub requested_by: Option<PeerRecord>,
    pub suggested_role: Option<RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTrackStateRequestRecord {
    pub requested_by: Option<PeerRecord>,
    pub track_type: TrackKind,
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedFromRoomRecord {
    pub requested_by: Option<PeerRecord>,
    pub room_ended: bool,
    pub reason: String,
}

fn millis(at: Option<&DateTime<Utc>>) -> Option<i64> {
    at.map(DateTime::timestamp_millis)
}

pub fn decode_track(track: Option<&Track>) -> Option<TrackRecord> {
    let track = track?;
    Some(TrackRecord {
        track_id: track.track_id.clone(),
        kind: track.kind,
        source: track.source,
        track_description: track.description.clone(),
        is_mute: track.is_mute,
        playback_allowed: track.playback_allowed,
        volume: track.volume,
    })
}

pub fn decode_role(role: Option<&Role>) -> Option<RoleRecord> {
    let role = role?;
    Some(RoleRecord {
        name: role.name.clone(),
        publish_settings: role.publish_settings.as_ref().map(|s| PublishSettingsRecord {
            allowed: s.allowed.clone(),
        }),
        permissions: role.permissions.as_ref().map(|p| PermissionsRecord {
            change_role: p.change_role,
            end_room: p.end_room,
            remove_others: p.remove_others,
            mute: p.mute,
            unmute: p.unmute,
            rtmp_streaming: p.rtmp_streaming,
            hls_streaming: p.hls_streaming,
            browser_recording: p.browser_recording,
        }),
        priority: role.priority,
    })
}

pub fn decode_roles(roles: &[Role]) -> Vec<RoleRecord> {
    roles.iter().filter_map(|r| decode_role(Some(r))).collect()
}

pub fn decode_peer(peer: Option<&Peer>) -> Option<PeerRecord> {
    let peer = peer?;
    Some(PeerRecord {
        peer_id: peer.peer_id.clone(),
        name: peer.name.clone(),
        is_local: peer.is_local,
        customer_user_id: peer.customer_user_id.clone(),
        metadata: peer.metadata.clone(),
        role: decode_role(peer.role.as_ref()),
        audio_track: decode_track(peer.audio_track.as_ref()),
        video_track: decode_track(peer.video_track.as_ref()),
        auxiliary_tracks: peer
            .auxiliary_tracks
            .iter()
            .filter_map(|t| decode_track(Some(t)))
            .collect(),
        network_quality: peer.network_quality,
    })
}

pub fn decode_remote_peers(peers: &[Peer]) -> Vec<PeerRecord> {
    peers.iter().filter_map(|p| decode_peer(Some(p))).collect()
}

fn decode_recording_state(state: &RecordingState) -> RecordingStateRecord {
    RecordingStateRecord {
        running: state.running,
        started_at: millis(state.started_at.as_ref()),
    }
}

fn decode_hls_state(state: &HlsStreamingState) -> HlsStreamingStateRecord {
    HlsStreamingStateRecord {
        running: state.running,
        variants: state
            .variants
            .iter()
            .map(|v| HlsVariantRecord {
                hls_stream_url: v.hls_stream_url.clone(),
                meeting_url: v.meeting_url.clone(),
                metadata: v.metadata.clone(),
                started_at: millis(v.started_at.as_ref()),
            })
            .collect(),
    }
}

pub fn decode_room(room: Option<&Room>) -> Option<RoomRecord> {
    let room = room?;
    Some(RoomRecord {
        id: room.id.clone(),
        name: room.name.clone(),
        metadata: room.metadata.clone(),
        peer_count: room.peer_count,
        local_peer: decode_peer(room.local_peer()),
        peers: room.peers.iter().filter_map(|p| decode_peer(Some(p))).collect(),
        browser_recording_state: decode_recording_state(&room.browser_recording_state),
        server_recording_state: decode_recording_state(&room.server_recording_state),
        rtmp_streaming_state: decode_recording_state(&room.rtmp_streaming_state),
        hls_recording_state: decode_recording_state(&room.hls_recording_state),
        hls_streaming_state: decode_hls_state(&room.hls_streaming_state),
    })
}

pub fn decode_error(error: &SdkError) -> ErrorRecord {
    ErrorRecord {
        code: error.code,
        description: error.description.clone(),
        message: error.message.clone(),
        action: error.action.clone(),
        is_terminal: error.is_terminal,
    }
}

/// First audio and first video track among the local preview tracks.
pub fn decode_preview_tracks(tracks: &[Track]) -> PreviewTracksRecord {
    PreviewTracksRecord {
        audio_track: decode_track(tracks.iter().find(|t| t.kind == TrackKind::Audio)),
        video_track: decode_track(tracks.iter().find(|t| t.kind == TrackKind::Video)),
    }
}

pub fn decode_speakers(speakers: &[Speaker]) -> Vec<SpeakerRecord> {
    speakers
        .iter()
        .map(|s| SpeakerRecord {
            peer: decode_peer(s.peer.as_ref()),
            level: s.level,
            track: decode_track(s.track.as_ref()),
        })
        .collect()
}

pub fn decode_message(message: &Message) -> MessageRecord {
    MessageRecord {
        sender: message.sender.as_ref().map(|p| p.name.clone()),
        message: message.message.clone(),
        message_type: message.message_type.clone(),
        time: message.server_receive_time.to_rfc3339(),
    }
}

pub fn decode_role_change_request(request: &RoleChangeRequest) -> RoleChangeRequestRecord {
    RoleChangeRequestRecord {
        requested_by: decode_peer(request.requested_by.as_ref()),
        suggested_role: decode_role(Some(&request.suggested_role)),
    }
}

pub fn decode_change_track_state_request(
    request: &ChangeTrackStateRequest,
) -> ChangeTrackStateRequestRecord {
    ChangeTrackStateRequestRecord {
        requested_by: decode_peer(request.requested_by.as_ref()),
        track_type: request.track_type,
        mute: request.mute,
    }
}

pub fn decode_removed_from_room(notification: &RemovedFromRoom) -> RemovedFromRoomRecord {
    RemovedFromRoomRecord {
        requested_by: decode_peer(notification.peer_who_removed.as_ref()),
        room_ended: notification.room_was_ended,
        reason: notification.reason.clone(),
    }
}

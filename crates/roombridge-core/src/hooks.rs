//! Reducers that fold bridge events into a [`MeetingStore`].
//!
//! Each hook listens to exactly one event name. [`HookSet`] owns the
//! subscriptions, so dropping it detaches every hook at once.

use std::sync::{Arc, MutexGuard, PoisonError};

use chrono::DateTime;
use serde_json::json;

use crate::decode::{
    ChangeTrackStateRequestRecord, MessageRecord, PeerRecord, RecordingStateRecord,
    RemovedFromRoomRecord, RoleChangeRequestRecord, RoleRecord, RoomRecord,
};
use crate::errors::BridgeError;
use crate::events::{
    BridgeEvent, BridgeEventListener, ErrorPayload, EventEmitter, EventName, JoinPayload,
    PeerUpdatePayload, PipModePayload, PreviewPayload, RoomUpdatePayload, SessionEvent, Subscription,
    TrackUpdatePayload,
};
use crate::sdk::{PeerUpdate, RoomUpdate, TrackKind, TrackSource, TrackUpdate};
use crate::session::{ActionSuccess, BridgeSession};
use crate::store::{MeetingState, MeetingStore, ModalType, PeerTrackNode, SharedStore};

/// Role-name marker of HLS viewers, who never get a join confirmation
/// before room data arrives.
const VIEWER_ROLE_MARKER: &str = "hls-";

fn is_viewer(peer: Option<&PeerRecord>) -> bool {
    peer.and_then(|p| p.role.as_ref())
        .is_some_and(|r| r.name.contains(VIEWER_ROLE_MARKER))
}

fn clock_time(millis: Option<i64>) -> Option<String> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%H:%M").to_string())
}

fn recording_notice(label: &str, running: bool, started_at: Option<i64>) -> String {
    match (running, clock_time(started_at)) {
        (true, Some(at)) => format!("{label} Started At {at}"),
        (true, None) => format!("{label} Started"),
        (false, _) => format!("{label} Stopped"),
    }
}

fn state_notice(label: &str, state: &RecordingStateRecord) -> String {
    recording_notice(label, state.running, state.started_at)
}

fn room_notice(update: RoomUpdate, room: &RoomRecord) -> Option<String> {
    match update {
        RoomUpdate::RoomPeerCountUpdated => None,
        RoomUpdate::BrowserRecordingStateUpdated => {
            Some(state_notice("Browser Recording", &room.browser_recording_state))
        }
        RoomUpdate::ServerRecordingStateUpdated => {
            Some(state_notice("Server Recording", &room.server_recording_state))
        }
        RoomUpdate::RtmpStreamingStateUpdated => {
            Some(state_notice("RTMP Streaming", &room.rtmp_streaming_state))
        }
        RoomUpdate::HlsRecordingStateUpdated => {
            Some(state_notice("HLS Recording", &room.hls_recording_state))
        }
        RoomUpdate::HlsStreamingStateUpdated => {
            let state = &room.hls_streaming_state;
            let started = state.variants.first().and_then(|v| v.started_at);
            Some(recording_notice("HLS Streaming", state.running, started))
        }
    }
}

fn local_mute_flags(store: &mut MeetingStore, local: Option<&PeerRecord>) {
    if let Some(peer) = local {
        store.is_local_audio_muted = peer.audio_track.as_ref().map(|t| t.is_mute);
        store.is_local_video_muted = peer.video_track.as_ref().map(|t| t.is_mute);
    }
}

fn add_peer_tiles(store: &mut MeetingStore, peer: &PeerRecord) {
    store
        .tiles
        .upsert(PeerTrackNode::new(peer.clone(), peer.video_track.clone()));
    for track in peer
        .auxiliary_tracks
        .iter()
        .filter(|t| t.kind == TrackKind::Video)
    {
        store
            .tiles
            .upsert(PeerTrackNode::new(peer.clone(), Some(track.clone())));
    }
}

pub fn reduce_preview(store: &mut MeetingStore, payload: &PreviewPayload) {
    store.meeting_state = MeetingState::Preview;
    store.room = payload.room.clone();
    store.local_peer = payload.local_peer.clone();
    store.is_local_audio_muted = payload.preview_tracks.audio_track.as_ref().map(|t| t.is_mute);
    store.is_local_video_muted = payload.preview_tracks.video_track.as_ref().map(|t| t.is_mute);
}

pub fn reduce_join(store: &mut MeetingStore, payload: &JoinPayload) {
    store.meeting_state = MeetingState::InMeeting;
    store.room = payload.room.clone();
    store.local_peer = payload.local_peer.clone();
    store.remote_peers = payload.remote_peers.clone();
    store.roles = payload.roles.clone();
    local_mute_flags(store, payload.local_peer.as_ref());

    store.tiles.clear();
    if let Some(local) = &payload.local_peer {
        add_peer_tiles(store, local);
    }
    for peer in &payload.remote_peers {
        add_peer_tiles(store, peer);
    }
}

pub fn reduce_room_update(store: &mut MeetingStore, payload: &RoomUpdatePayload) {
    store.room = payload.room.clone();
    if is_viewer(payload.local_peer.as_ref())
        && matches!(store.meeting_state, MeetingState::Idle | MeetingState::Preview)
    {
        store.local_peer = payload.local_peer.clone();
        store.meeting_state = MeetingState::InMeeting;
    }
    if let Some(notice) = payload.room.as_ref().and_then(|r| room_notice(payload.update, r)) {
        store.notify(notice);
    }
}

fn role_publishes(role: Option<&RoleRecord>) -> bool {
    role.is_some_and(RoleRecord::can_publish)
}

pub fn reduce_peer_update(store: &mut MeetingStore, payload: &PeerUpdatePayload) {
    let (Some(update), Some(peer)) = (payload.update, payload.peer.as_ref()) else {
        // Bulk refresh: only the snapshots changed.
        store.local_peer = payload.local_peer.clone();
        store.remote_peers = payload.remote_peers.clone();
        return;
    };
    if update == PeerUpdate::PeerJoined {
        return;
    }

    store.remote_peers = payload.remote_peers.clone();
    if peer.is_local {
        store.local_peer = payload.local_peer.clone().or_else(|| Some(peer.clone()));
    }

    match update {
        PeerUpdate::PeerLeft => store.tiles.remove_peer(&peer.peer_id),
        PeerUpdate::RoleChanged if !role_publishes(peer.role.as_ref()) => {
            store.tiles.remove_peer(&peer.peer_id);
        }
        _ => store.tiles.replace_peer(peer),
    }
}

pub fn reduce_track_update(store: &mut MeetingStore, payload: &TrackUpdatePayload) {
    let (Some(peer), Some(track)) = (payload.peer.as_ref(), payload.track.as_ref()) else {
        return;
    };

    match payload.update {
        TrackUpdate::TrackAdded => {
            if !store.tiles.contains(&peer.peer_id, Some(track)) {
                store
                    .tiles
                    .upsert(PeerTrackNode::new(peer.clone(), Some(track.clone())));
            } else if track.kind == TrackKind::Video {
                store.tiles.replace_peer_and_track(peer, track);
            } else {
                store.tiles.replace_peer(peer);
            }
        }
        TrackUpdate::TrackRemoved => {
            let keeps_regular = track.source == TrackSource::Regular
                && (peer.audio_track.is_some() || peer.video_track.is_some());
            if keeps_regular {
                store.tiles.replace_peer(peer);
            } else {
                store.tiles.remove(&peer.peer_id, Some(track));
            }
        }
        TrackUpdate::TrackMuted | TrackUpdate::TrackUnmuted => {
            if peer.is_local && track.source == TrackSource::Regular {
                match track.kind {
                    TrackKind::Audio => store.is_local_audio_muted = Some(track.is_mute),
                    TrackKind::Video => store.is_local_video_muted = Some(track.is_mute),
                }
            }
            if track.kind == TrackKind::Video {
                store.tiles.replace_peer_and_track(peer, track);
            } else {
                store.tiles.replace_peer(peer);
            }
        }
        TrackUpdate::TrackDegraded => store.tiles.set_degraded(&peer.peer_id, track, true),
        TrackUpdate::TrackRestored => store.tiles.set_degraded(&peer.peer_id, track, false),
        TrackUpdate::TrackDescriptionChanged => {}
    }

    if peer.is_local {
        store.local_peer = payload.local_peer.clone();
    }
}

pub fn reduce_message(store: &mut MeetingStore, message: &MessageRecord) {
    store.messages.push(message.clone());
}

pub fn reduce_error(store: &mut MeetingStore, payload: &ErrorPayload) {
    store.last_error = Some(payload.error.clone());
}

pub fn reduce_role_change_request(store: &mut MeetingStore, request: &RoleChangeRequestRecord) {
    store.role_change_request = Some(request.clone());
    store.modal = ModalType::ChangeRole;
}

/// Unmute requests prompt; mute requests were already applied by the SDK
/// and only raise a toast.
pub fn reduce_change_track_state_request(
    store: &mut MeetingStore,
    request: &ChangeTrackStateRequestRecord,
) {
    if request.mute {
        let name = request
            .requested_by
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        store.notify(format!(
            "Track Muted: {name} Muted Your {}",
            request.track_type.as_str()
        ));
        return;
    }
    store.track_state_request = Some(request.clone());
    store.modal = ModalType::ChangeTrackState;
}

pub fn reduce_removed_from_room(store: &mut MeetingStore, notification: &RemovedFromRoomRecord) {
    store.meeting_state = MeetingState::Removed;
    store.removed = Some(notification.clone());
    store.modal = ModalType::None;
    store.tiles.clear();
}

pub fn reduce_pip_mode(store: &mut MeetingStore, payload: &PipModePayload) {
    store.pip_mode = payload.is_active;
}

/// Leaving from the picture-in-picture window skips the meeting screen, so
/// the store is cleared right away.
pub fn reduce_pip_room_leave(store: &mut MeetingStore) {
    store.leave_meeting();
}

fn reduce(store: &mut MeetingStore, event: &BridgeEvent) {
    match event {
        BridgeEvent::Preview(p) => reduce_preview(store, p),
        BridgeEvent::Join(p) => reduce_join(store, p),
        BridgeEvent::RoomUpdate(p) => reduce_room_update(store, p),
        BridgeEvent::PeerUpdate(p) => reduce_peer_update(store, p),
        BridgeEvent::TrackUpdate(p) => reduce_track_update(store, p),
        BridgeEvent::Message(m) => reduce_message(store, m),
        BridgeEvent::Error(p) => reduce_error(store, p),
        BridgeEvent::Reconnecting => store.reconnecting = true,
        BridgeEvent::Reconnected => store.reconnecting = false,
        BridgeEvent::RoleChangeRequest(r) => reduce_role_change_request(store, r),
        BridgeEvent::ChangeTrackStateRequest(r) => reduce_change_track_state_request(store, r),
        BridgeEvent::RemovedFromRoom(r) => reduce_removed_from_room(store, r),
        BridgeEvent::PipModeChanged(p) => reduce_pip_mode(store, p),
        BridgeEvent::PipRoomLeave => reduce_pip_room_leave(store),
        BridgeEvent::Speaker(_)
        | BridgeEvent::SessionStoreAvailable
        | BridgeEvent::SessionStoreChanged(_) => {}
    }
}

const HOOKED_EVENTS: [EventName; 14] = [
    EventName::OnPreview,
    EventName::OnJoin,
    EventName::OnRoomUpdate,
    EventName::OnPeerUpdate,
    EventName::OnTrackUpdate,
    EventName::OnMessage,
    EventName::OnError,
    EventName::Reconnecting,
    EventName::Reconnected,
    EventName::OnRoleChangeRequest,
    EventName::OnChangeTrackStateRequest,
    EventName::OnRemovedFromRoom,
    EventName::OnPipModeChanged,
    EventName::OnPipRoomLeave,
];

struct StoreHook {
    store: SharedStore,
}

impl BridgeEventListener for StoreHook {
    fn on_event(&self, event: SessionEvent) {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        reduce(&mut store, &event.event);
    }
}

/// Every store hook, attached for the lifetime of the set.
pub struct HookSet {
    _subscriptions: Vec<Subscription>,
}

impl HookSet {
    pub fn attach(emitter: &EventEmitter, store: SharedStore) -> Self {
        let subscriptions = HOOKED_EVENTS
            .iter()
            .map(|name| {
                let hook = StoreHook {
                    store: store.clone(),
                };
                emitter.subscribe(*name, Arc::new(hook))
            })
            .collect();
        tracing::debug!(hooks = HOOKED_EVENTS.len(), "store hooks attached");
        Self {
            _subscriptions: subscriptions,
        }
    }
}

fn lock(store: &SharedStore) -> MutexGuard<'_, MeetingStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Leave the room, then clear the store down to [`MeetingState::Left`].
pub async fn leave_meeting(
    session: &BridgeSession,
    store: &SharedStore,
) -> Result<ActionSuccess, BridgeError> {
    let result = session.leave().await?;
    lock(store).leave_meeting();
    Ok(result)
}

/// Answer the role-change prompt. The modal closes whatever the outcome.
pub async fn answer_role_change(
    session: &BridgeSession,
    store: &SharedStore,
    accept: bool,
) -> Result<Option<ActionSuccess>, BridgeError> {
    let result = if accept {
        session.moderation().accept_role_change().await
    } else {
        Ok(None)
    };
    let mut store = lock(store);
    store.role_change_request = None;
    store.dismiss_modal();
    result
}

/// Answer an unmute request by unmuting the requested local track.
pub fn answer_track_state_request(
    session: &BridgeSession,
    store: &SharedStore,
    accept: bool,
) -> Result<(), BridgeError> {
    let request = {
        let mut store = lock(store);
        store.dismiss_modal();
        store.track_state_request.take()
    };
    let Some(request) = request.filter(|_| accept) else {
        return Ok(());
    };
    let unmute = json!({"isMute": false});
    match request.track_type {
        TrackKind::Audio => session.controls().set_local_mute(&unmute),
        TrackKind::Video => session.controls().set_local_video_mute(&unmute),
    }
}

use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::decode::{
    ChangeTrackStateRequestRecord, ErrorRecord, MessageRecord, PeerRecord,
    PreviewTracksRecord, RemovedFromRoomRecord, RoleChangeRequestRecord, RoleRecord, RoomRecord,
    SpeakerRecord, TrackRecord,
};
use crate::sdk::{PeerUpdate, RoomUpdate, TrackUpdate};

/// Names of the events crossing the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    OnPreview,
    OnJoin,
    OnRoomUpdate,
    OnPeerUpdate,
    OnTrackUpdate,
    OnMessage,
    OnSpeaker,
    OnError,
    Reconnecting,
    Reconnected,
    OnRoleChangeRequest,
    OnChangeTrackStateRequest,
    OnRemovedFromRoom,
    OnSessionStoreAvailable,
    OnSessionStoreChanged,
    OnPipModeChanged,
    OnPipRoomLeave,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::OnPreview => "ON_PREVIEW",
            EventName::OnJoin => "ON_JOIN",
            EventName::OnRoomUpdate => "ON_ROOM_UPDATE",
            EventName::OnPeerUpdate => "ON_PEER_UPDATE",
            EventName::OnTrackUpdate => "ON_TRACK_UPDATE",
            EventName::OnMessage => "ON_MESSAGE",
            EventName::OnSpeaker => "ON_SPEAKER",
            EventName::OnError => "ON_ERROR",
            EventName::Reconnecting => "RECONNECTING",
            EventName::Reconnected => "RECONNECTED",
            EventName::OnRoleChangeRequest => "ON_ROLE_CHANGE_REQUEST",
            EventName::OnChangeTrackStateRequest => "ON_CHANGE_TRACK_STATE_REQUEST",
            EventName::OnRemovedFromRoom => "ON_REMOVED_FROM_ROOM",
            EventName::OnSessionStoreAvailable => "ON_SESSION_STORE_AVAILABLE",
            EventName::OnSessionStoreChanged => "ON_SESSION_STORE_CHANGED",
            EventName::OnPipModeChanged => "ON_PIP_MODE_CHANGED",
            EventName::OnPipRoomLeave => "ON_PIP_ROOM_LEAVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPayload {
    pub preview_tracks: PreviewTracksRecord,
    pub room: Option<RoomRecord>,
    pub local_peer: Option<PeerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room: Option<RoomRecord>,
    pub local_peer: Option<PeerRecord>,
    pub remote_peers: Vec<PeerRecord>,
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdatePayload {
    #[serde(rename = "type")]
    pub update: RoomUpdate,
    pub room: Option<RoomRecord>,
    pub local_peer: Option<PeerRecord>,
    pub remote_peers: Vec<PeerRecord>,
}

/// `peer` and `type` are absent on the refresh emitted after a bulk
/// playback change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerUpdatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<PeerRecord>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub update: Option<PeerUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomRecord>,
    pub local_peer: Option<PeerRecord>,
    pub remote_peers: Vec<PeerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdatePayload {
    pub peer: Option<PeerRecord>,
    pub track: Option<TrackRecord>,
    pub room: Option<RoomRecord>,
    #[serde(rename = "type")]
    pub update: TrackUpdate,
    pub local_peer: Option<PeerRecord>,
    pub remote_peers: Vec<PeerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerPayload {
    pub count: usize,
    pub peers: Vec<SpeakerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStoreChangePayload {
    pub key: String,
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipModePayload {
    pub is_active: bool,
}

/// Events emitted by the adapter toward the application.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Preview(PreviewPayload),
    Join(JoinPayload),
    RoomUpdate(RoomUpdatePayload),
    PeerUpdate(PeerUpdatePayload),
    TrackUpdate(TrackUpdatePayload),
    Message(MessageRecord),
    Speaker(SpeakerPayload),
    Error(ErrorPayload),
    Reconnecting,
    Reconnected,
    RoleChangeRequest(RoleChangeRequestRecord),
    ChangeTrackStateRequest(ChangeTrackStateRequestRecord),
    RemovedFromRoom(RemovedFromRoomRecord),
    SessionStoreAvailable,
    SessionStoreChanged(SessionStoreChangePayload),
    PipModeChanged(PipModePayload),
    PipRoomLeave,
}

impl BridgeEvent {
    pub fn name(&self) -> EventName {
        match self {
            BridgeEvent::Preview(_) => EventName::OnPreview,
            BridgeEvent::Join(_) => EventName::OnJoin,
            BridgeEvent::RoomUpdate(_) => EventName::OnRoomUpdate,
            BridgeEvent::PeerUpdate(_) => EventName::OnPeerUpdate,
            BridgeEvent::TrackUpdate(_) => EventName::OnTrackUpdate,
            BridgeEvent::Message(_) => EventName::OnMessage,
            BridgeEvent::Speaker(_) => EventName::OnSpeaker,
            BridgeEvent::Error(_) => EventName::OnError,
            BridgeEvent::Reconnecting => EventName::Reconnecting,
            BridgeEvent::Reconnected => EventName::Reconnected,
            BridgeEvent::RoleChangeRequest(_) => EventName::OnRoleChangeRequest,
            BridgeEvent::ChangeTrackStateRequest(_) => EventName::OnChangeTrackStateRequest,
            BridgeEvent::RemovedFromRoom(_) => EventName::OnRemovedFromRoom,
            BridgeEvent::SessionStoreAvailable => EventName::OnSessionStoreAvailable,
            BridgeEvent::SessionStoreChanged(_) => EventName::OnSessionStoreChanged,
            BridgeEvent::PipModeChanged(_) => EventName::OnPipModeChanged,
            BridgeEvent::PipRoomLeave => EventName::OnPipRoomLeave,
        }
    }

    fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            BridgeEvent::Preview(p) => serde_json::to_value(p),
            BridgeEvent::Join(p) => serde_json::to_value(p),
            BridgeEvent::RoomUpdate(p) => serde_json::to_value(p),
            BridgeEvent::PeerUpdate(p) => serde_json::to_value(p),
            BridgeEvent::TrackUpdate(p) => serde_json::to_value(p),
            BridgeEvent::Message(p) => serde_json::to_value(p),
            BridgeEvent::Speaker(p) => serde_json::to_value(p),
            BridgeEvent::Error(p) => serde_json::to_value(p),
            BridgeEvent::RoleChangeRequest(p) => serde_json::to_value(p),
            BridgeEvent::ChangeTrackStateRequest(p) => serde_json::to_value(p),
            BridgeEvent::RemovedFromRoom(p) => serde_json::to_value(p),
            BridgeEvent::SessionStoreChanged(p) => serde_json::to_value(p),
            BridgeEvent::PipModeChanged(p) => serde_json::to_value(p),
            BridgeEvent::Reconnecting
            | BridgeEvent::Reconnected
            | BridgeEvent::SessionStoreAvailable
            | BridgeEvent::PipRoomLeave => Ok(serde_json::json!({})),
        }
    }
}

/// A bridge event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session_id: String,
    pub event: BridgeEvent,
}

impl SessionEvent {
    pub fn name(&self) -> EventName {
        self.event.name()
    }

    /// Bridge payload: the event body plus `event` and `id` keys.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut payload = self.event.payload()?;
        if let Some(map) = payload.as_object_mut() {
            map.insert("event".into(), self.name().as_str().into());
            map.insert("id".into(), self.session_id.clone().into());
        }
        Ok(payload)
    }
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait BridgeEventListener: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

struct Registration {
    id: u64,
    filter: Option<EventName>,
    listener: Arc<dyn BridgeEventListener>,
}

type Registry = RwLock<Vec<Registration>>;

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a listener for every event, for the emitter's lifetime.
    pub fn add_listener(&self, listener: Arc<dyn BridgeEventListener>) {
        self.register(None, listener);
    }

    /// Register a listener for one event name. Dropping the returned
    /// subscription unregisters it.
    pub fn subscribe(
        &self,
        name: EventName,
        listener: Arc<dyn BridgeEventListener>,
    ) -> Subscription {
        let id = self.register(Some(name), listener);
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    fn register(&self, filter: Option<EventName>, listener: Arc<dyn BridgeEventListener>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, filter, listener });
        id
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn emit(&self, event: SessionEvent) {
        let name = event.name();
        // Snapshot so listeners may subscribe or unsubscribe while handling.
        let targets: Vec<Arc<dyn BridgeEventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.filter.is_none_or(|f| f == name))
            .map(|r| r.listener.clone())
            .collect();
        tracing::trace!(event = name.as_str(), listeners = targets.len(), "emit");
        for listener in targets {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a single-event listener registered until dropped.
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|r| r.id != self.id);
        }
    }
}

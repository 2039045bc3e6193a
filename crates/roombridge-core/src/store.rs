use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::decode::{
    ChangeTrackStateRequestRecord, ErrorRecord, MessageRecord, PeerRecord,
    RemovedFromRoomRecord, RoleChangeRequestRecord, RoleRecord, RoomRecord, TrackRecord,
};
use crate::sdk::TrackSource;

/// Store shared between hooks and the UI layer.
pub type SharedStore = Arc<Mutex<MeetingStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeetingState {
    #[default]
    Idle,
    Preview,
    InMeeting,
    Left,
    Removed,
}

/// Modal the UI should currently present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalType {
    #[default]
    None,
    ChangeRole,
    ChangeTrackState,
}

/// One rendered tile: a peer and at most one of its tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerTrackNode {
    pub id: String,
    pub peer: PeerRecord,
    pub track: Option<TrackRecord>,
    pub is_degraded: bool,
}

fn node_id(peer_id: &str, track: Option<&TrackRecord>) -> String {
    let source = track.map_or(TrackSource::Regular, |t| t.source);
    format!("{peer_id}{}", source.as_str())
}

impl PeerTrackNode {
    pub fn new(peer: PeerRecord, track: Option<TrackRecord>) -> Self {
        Self {
            id: node_id(&peer.peer_id, track.as_ref()),
            peer,
            track,
            is_degraded: false,
        }
    }
}

/// Ordered tile list, at most one tile per `peerId + source`.
#[derive(Debug, Clone, Default)]
pub struct PeerTrackNodes {
    nodes: Vec<PeerTrackNode>,
}

impl PeerTrackNodes {
    pub fn nodes(&self) -> &[PeerTrackNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PeerTrackNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_peer(&self, peer_id: &str) -> bool {
        self.nodes.iter().any(|n| n.peer.peer_id == peer_id)
    }

    pub fn contains(&self, peer_id: &str, track: Option<&TrackRecord>) -> bool {
        let id = node_id(peer_id, track);
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Insert a tile, replacing any tile with the same id in place.
    pub fn upsert(&mut self, node: PeerTrackNode) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Refresh the peer on every tile it owns.
    pub fn replace_peer(&mut self, peer: &PeerRecord) {
        for node in self.nodes.iter_mut().filter(|n| n.peer.peer_id == peer.peer_id) {
            node.peer = peer.clone();
        }
    }

    pub fn replace_peer_and_track(&mut self, peer: &PeerRecord, track: &TrackRecord) {
        let id = node_id(&peer.peer_id, Some(track));
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.peer = peer.clone();
            node.track = Some(track.clone());
        }
    }

    pub fn remove_peer(&mut self, peer_id: &str) {
        self.nodes.retain(|n| n.peer.peer_id != peer_id);
    }

    pub fn remove(&mut self, peer_id: &str, track: Option<&TrackRecord>) {
        let id = node_id(peer_id, track);
        self.nodes.retain(|n| n.id != id);
    }

    pub fn set_degraded(&mut self, peer_id: &str, track: &TrackRecord, degraded: bool) {
        let id = node_id(peer_id, Some(track));
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.is_degraded = degraded;
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Application-side meeting state built from bridge events.
#[derive(Debug, Clone, Default)]
pub struct MeetingStore {
    pub room: Option<RoomRecord>,
    pub local_peer: Option<PeerRecord>,
    pub remote_peers: Vec<PeerRecord>,
    pub roles: Vec<RoleRecord>,
    pub meeting_state: MeetingState,
    pub tiles: PeerTrackNodes,
    pub messages: Vec<MessageRecord>,
    pub is_local_audio_muted: Option<bool>,
    pub is_local_video_muted: Option<bool>,
    pub modal: ModalType,
    pub pip_mode: bool,
    pub reconnecting: bool,
    pub last_error: Option<ErrorRecord>,
    pub role_change_request: Option<RoleChangeRequestRecord>,
    pub track_state_request: Option<ChangeTrackStateRequestRecord>,
    pub removed: Option<RemovedFromRoomRecord>,
    pub session_values: BTreeMap<String, Value>,
    notifications: Vec<String>,
}

impl MeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "notification");
        self.notifications.push(message);
    }

    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    /// Hand pending notifications to the UI, oldest first.
    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    pub fn set_session_value(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.session_values.insert(key.to_string(), value);
            }
            None => {
                self.session_values.remove(key);
            }
        }
    }

    pub fn dismiss_modal(&mut self) {
        self.modal = ModalType::None;
    }

    /// Back to a blank store, keeping nothing from the previous meeting.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Clear everything from the meeting just left.
    pub fn leave_meeting(&mut self) {
        self.reset();
        self.meeting_state = MeetingState::Left;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_peer, decode_track};
    use crate::mock_sdk::fixtures;

    fn alice() -> PeerRecord {
        decode_peer(fixtures::room().peers.iter().find(|p| p.peer_id == "p1")).unwrap()
    }

    fn bob() -> (PeerRecord, TrackRecord) {
        let room = fixtures::room();
        let bob = room.peers.iter().find(|p| p.peer_id == "p2");
        let screen = bob.and_then(|p| p.auxiliary_tracks.first());
        (decode_peer(bob).unwrap(), decode_track(screen).unwrap())
    }

    #[test]
    fn tile_id_is_peer_and_source() {
        let (bob, screen) = bob();
        let node = PeerTrackNode::new(bob.clone(), Some(screen));
        assert_eq!(node.id, "p2screen");
        assert_eq!(PeerTrackNode::new(bob, None).id, "p2regular");
    }

    #[test]
    fn upsert_keeps_one_tile_per_id() {
        let mut tiles = PeerTrackNodes::default();
        let peer = alice();
        tiles.upsert(PeerTrackNode::new(peer.clone(), peer.video_track.clone()));
        tiles.upsert(PeerTrackNode::new(peer.clone(), peer.audio_track.clone()));
        assert_eq!(tiles.len(), 1);
        assert_eq!(
            tiles.get("p1regular").unwrap().track.as_ref().unwrap().track_id,
            "p1-audio"
        );
    }

    #[test]
    fn remove_peer_drops_all_its_tiles() {
        let mut tiles = PeerTrackNodes::default();
        let (bob, screen) = bob();
        tiles.upsert(PeerTrackNode::new(bob.clone(), bob.audio_track.clone()));
        tiles.upsert(PeerTrackNode::new(bob.clone(), Some(screen.clone())));
        tiles.upsert(PeerTrackNode::new(alice(), None));
        assert_eq!(tiles.len(), 3);

        tiles.remove(&bob.peer_id, Some(&screen));
        assert!(tiles.contains_peer("p2"));
        tiles.remove_peer("p2");
        assert!(!tiles.contains_peer("p2"));
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn degraded_flag_toggles_on_matching_tile() {
        let mut tiles = PeerTrackNodes::default();
        let (bob, screen) = bob();
        tiles.upsert(PeerTrackNode::new(bob.clone(), Some(screen.clone())));

        tiles.set_degraded("p2", &screen, true);
        assert!(tiles.get("p2screen").unwrap().is_degraded);
        tiles.set_degraded("p2", &screen, false);
        assert!(!tiles.get("p2screen").unwrap().is_degraded);
    }

    #[test]
    fn notifications_drain_in_order() {
        let mut store = MeetingStore::new();
        store.notify("one");
        store.notify("two");
        assert_eq!(store.take_notifications(), vec!["one", "two"]);
        assert!(store.notifications().is_empty());
    }

    #[test]
    fn session_values_clear_on_none() {
        let mut store = MeetingStore::new();
        store.set_session_value("spotlight", Some(Value::from("p1")));
        assert_eq!(store.session_values.len(), 1);
        store.set_session_value("spotlight", None);
        assert!(store.session_values.is_empty());
    }
}

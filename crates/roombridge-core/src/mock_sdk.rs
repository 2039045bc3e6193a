//! In-memory [`NativeSdk`] used by the adapter tests.

use std::collections::HashMap;
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use crate::events::{BridgeEventListener, SessionEvent};
use crate::sdk::{
    HlsConfig, JoinConfig, Message, NativeSdk, Peer, RecordingConfig, Role, RoleChangeRequest, Room,
    SdkError, SdkEvent, SdkEventSender, SdkResult, Track, TrackStateForRoles,
};
use crate::session::BridgeSession;

#[derive(Default)]
struct MockState {
    room: Room,
    roles: Vec<Role>,
    calls: Vec<String>,
    failures: HashMap<String, SdkError>,
    sender: Option<SdkEventSender>,
    session_values: HashMap<String, Value>,
    volumes: Vec<(String, f64)>,
    screen_shared: bool,
    fetch_gate: Option<Arc<Notify>>,
}

pub(crate) struct MockSdk {
    state: Mutex<MockState>,
}

impl MockSdk {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                room: fixtures::room(),
                roles: fixtures::roles(),
                ..Default::default()
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls received so far, as `op` or `op:detail`.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub(crate) fn volumes(&self) -> Vec<(String, f64)> {
        self.state().volumes.clone()
    }

    /// Make the call recorded as `key` (e.g. `"leave"` or
    /// `"change_track_state:p1-audio"`) fail with `error`.
    pub(crate) fn fail(&self, key: &str, error: SdkError) {
        self.state().failures.insert(key.to_string(), error);
    }

    pub(crate) fn update_room(&self, edit: impl FnOnce(&mut Room)) {
        edit(&mut self.state().room);
    }

    pub(crate) fn set_screen_shared(&self, shared: bool) {
        self.state().screen_shared = shared;
    }

    pub(crate) fn set_session_value(&self, key: &str, value: Value) {
        self.state().session_values.insert(key.to_string(), value);
    }

    /// Hold session-store reads until the returned gate is notified.
    pub(crate) fn gate_session_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().fetch_gate = Some(gate.clone());
        gate
    }

    /// Deliver a listener callback on the most recently registered listener.
    pub(crate) fn push(&self, event: SdkEvent) {
        if let Some(sender) = &self.state().sender {
            let _ = sender.send(event);
        }
    }

    fn record(&self, call: String) -> Result<(), SdkError> {
        let mut state = self.state();
        let failure = state.failures.get(&call).cloned().or_else(|| {
            let op = call.split(':').next().unwrap_or_default();
            state.failures.get(op).cloned()
        });
        state.calls.push(call);
        failure.map_or(Ok(()), Err)
    }

    fn action(&self, call: String) -> SdkResult<()> {
        Box::pin(ready(self.record(call)))
    }

    fn message(&self, call: String, message: &str, message_type: &str) -> SdkResult<Message> {
        let sender = self.state().room.local_peer().cloned();
        let result = self.record(call).map(|()| Message {
            sender,
            message: message.to_string(),
            message_type: message_type.to_string(),
            server_receive_time: Utc::now(),
        });
        Box::pin(ready(result))
    }

    fn edit_track(&self, track_id: &str, edit: impl Fn(&mut Track)) {
        let mut state = self.state();
        for peer in &mut state.room.peers {
            let tracks = peer
                .audio_track
                .iter_mut()
                .chain(peer.video_track.iter_mut())
                .chain(peer.auxiliary_tracks.iter_mut());
            for track in tracks.filter(|t| t.track_id == track_id) {
                edit(track);
            }
        }
    }
}

impl NativeSdk for MockSdk {
    fn preview(&self, _config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError> {
        self.record("preview".into())?;
        self.state().sender = Some(events);
        Ok(())
    }

    fn join(&self, _config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError> {
        self.record("join".into())?;
        self.state().sender = Some(events);
        Ok(())
    }

    fn leave(&self) -> SdkResult<()> {
        self.action("leave".into())
    }

    fn room(&self) -> Option<Room> {
        Some(self.state().room.clone())
    }

    fn local_peer(&self) -> Option<Peer> {
        self.state().room.local_peer().cloned()
    }

    fn remote_peers(&self) -> Vec<Peer> {
        self.state().room.remote_peers().cloned().collect()
    }

    fn roles(&self) -> Vec<Role> {
        self.state().roles.clone()
    }

    fn is_screen_shared(&self) -> bool {
        self.state().screen_shared
    }

    fn send_broadcast_message(&self, message: &str, message_type: &str) -> SdkResult<Message> {
        self.message("send_broadcast_message".into(), message, message_type)
    }

    fn send_group_message(
        &self,
        message: &str,
        message_type: &str,
        roles: &[Role],
    ) -> SdkResult<Message> {
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        let call = format!("send_group_message:{}", names.join(","));
        self.message(call, message, message_type)
    }

    fn send_direct_message(
        &self,
        message: &str,
        message_type: &str,
        peer: &Peer,
    ) -> SdkResult<Message> {
        let call = format!("send_direct_message:{}", peer.peer_id);
        self.message(call, message, message_type)
    }

    fn change_role(&self, peer: &Peer, role: &Role, force: bool) -> SdkResult<()> {
        self.action(format!("change_role:{}:{}:{force}", peer.peer_id, role.name))
    }

    fn accept_change_role(&self, request: &RoleChangeRequest) -> SdkResult<()> {
        self.action(format!("accept_change_role:{}", request.suggested_role.name))
    }

    fn change_track_state(&self, track: &Track, mute: bool) -> SdkResult<()> {
        let result = self.record(format!("change_track_state:{}", track.track_id));
        if result.is_ok() {
            self.edit_track(&track.track_id, |t| t.is_mute = mute);
        }
        Box::pin(ready(result))
    }

    fn change_track_state_for_roles(&self, request: &TrackStateForRoles) -> SdkResult<()> {
        let kind = request.kind.map(|k| k.as_str()).unwrap_or("*");
        let source = request.source.as_deref().unwrap_or("*");
        let roles = request
            .roles
            .as_ref()
            .map(|roles| {
                roles
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "*".to_string());
        self.action(format!(
            "change_track_state_for_roles:{}:{kind}:{source}:{roles}",
            request.mute
        ))
    }

    fn remove_peer(&self, peer: &Peer, reason: &str) -> SdkResult<()> {
        self.action(format!("remove_peer:{}:{reason}", peer.peer_id))
    }

    fn end_room(&self, reason: &str, lock: bool) -> SdkResult<()> {
        self.action(format!("end_room:{reason}:{lock}"))
    }

    fn change_metadata(&self, metadata: &str) -> SdkResult<()> {
        self.action(format!("change_metadata:{metadata}"))
    }

    fn change_name(&self, name: &str) -> SdkResult<()> {
        self.action(format!("change_name:{name}"))
    }

    fn start_rtmp_or_recording(&self, config: &RecordingConfig) -> SdkResult<()> {
        self.action(format!(
            "start_rtmp_or_recording:{}:{}:{}",
            config.meeting_url,
            config.record,
            config.rtmp_urls.len()
        ))
    }

    fn stop_rtmp_and_recording(&self) -> SdkResult<()> {
        self.action("stop_rtmp_and_recording".into())
    }

    fn start_hls_streaming(&self, config: &HlsConfig) -> SdkResult<()> {
        self.action(format!(
            "start_hls_streaming:{}:{}",
            config.variants.len(),
            config.recording.is_some()
        ))
    }

    fn stop_hls_streaming(&self) -> SdkResult<()> {
        self.action("stop_hls_streaming".into())
    }

    fn stop_screenshare(&self) -> SdkResult<()> {
        self.state().screen_shared = false;
        self.action("stop_screenshare".into())
    }

    fn switch_camera(&self) -> SdkResult<()> {
        self.action("switch_camera".into())
    }

    fn set_local_audio_mute(&self, mute: bool) {
        let _ = self.record(format!("set_local_audio_mute:{mute}"));
        let mut state = self.state();
        if let Some(track) = state
            .room
            .peers
            .iter_mut()
            .find(|p| p.is_local)
            .and_then(|p| p.audio_track.as_mut())
        {
            track.is_mute = mute;
        }
    }

    fn set_local_video_mute(&self, mute: bool) {
        let _ = self.record(format!("set_local_video_mute:{mute}"));
        let mut state = self.state();
        if let Some(track) = state
            .room
            .peers
            .iter_mut()
            .find(|p| p.is_local)
            .and_then(|p| p.video_track.as_mut())
        {
            track.is_mute = mute;
        }
    }

    fn set_playback_allowed(&self, track: &Track, allowed: bool) {
        let _ = self.record(format!("set_playback_allowed:{}:{allowed}", track.track_id));
        self.edit_track(&track.track_id, |t| t.playback_allowed = Some(allowed));
    }

    fn set_volume(&self, track: &Track, volume: f64) {
        let _ = self.record(format!("set_volume:{}", track.track_id));
        self.state().volumes.push((track.track_id.clone(), volume));
        self.edit_track(&track.track_id, |t| t.volume = Some(volume));
    }

    fn session_store_get(&self, key: &str) -> SdkResult<Option<Value>> {
        let result = self
            .record(format!("session_store_get:{key}"))
            .map(|()| self.state().session_values.get(key).cloned());
        let gate = self.state().fetch_gate.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        })
    }

    fn session_store_set(&self, key: &str, value: Option<Value>) -> SdkResult<()> {
        let result = self.record(format!("session_store_set:{key}"));
        if result.is_ok() {
            let mut state = self.state();
            match value {
                Some(value) => {
                    state.session_values.insert(key.to_string(), value);
                }
                None => {
                    state.session_values.remove(key);
                }
            }
        }
        Box::pin(ready(result))
    }
}

struct ChannelListener(mpsc::UnboundedSender<SessionEvent>);

impl BridgeEventListener for ChannelListener {
    fn on_event(&self, event: SessionEvent) {
        let _ = self.0.send(event);
    }
}

/// Capture every event the session emits.
pub(crate) fn collect_events(session: &BridgeSession) -> mpsc::UnboundedReceiver<SessionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.add_listener(Arc::new(ChannelListener(tx)));
    rx
}

pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::sdk::{
        Message, Peer, Permissions, PublishSettings, Role, Room, SdkError, Track, TrackKind,
        TrackSource,
    };

    pub(crate) fn track(id: &str, kind: TrackKind, source: TrackSource, remote: bool) -> Track {
        Track {
            track_id: id.to_string(),
            kind,
            source,
            description: String::new(),
            is_mute: false,
            playback_allowed: remote.then_some(true),
            volume: Some(1.0),
        }
    }

    pub(crate) fn audio(id: &str) -> Track {
        track(id, TrackKind::Audio, TrackSource::Regular, false)
    }

    pub(crate) fn video(id: &str) -> Track {
        track(id, TrackKind::Video, TrackSource::Regular, false)
    }

    fn role(name: &str, allowed: &[&str], admin: bool, priority: i32) -> Role {
        Role {
            name: name.to_string(),
            publish_settings: Some(PublishSettings {
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            }),
            permissions: Some(Permissions {
                change_role: admin,
                end_room: admin,
                remove_others: admin,
                mute: admin,
                unmute: admin,
                rtmp_streaming: admin,
                hls_streaming: admin,
                browser_recording: admin,
            }),
            priority: Some(priority),
        }
    }

    pub(crate) fn roles() -> Vec<Role> {
        vec![
            role("host", &["audio", "video", "screen"], true, 1),
            role("guest", &["audio", "video"], false, 2),
            role("viewer", &[], false, 3),
        ]
    }

    pub(crate) fn peer(id: &str, name: &str, is_local: bool, role_name: &str) -> Peer {
        Peer {
            peer_id: id.to_string(),
            name: name.to_string(),
            is_local,
            role: roles().into_iter().find(|r| r.name == role_name),
            metadata: None,
            customer_user_id: None,
            audio_track: None,
            video_track: None,
            auxiliary_tracks: Vec::new(),
            network_quality: None,
        }
    }

    /// Local "Me" (host) plus remote Alice and Bob; Bob shares his screen.
    pub(crate) fn room() -> Room {
        let mut me = peer("local", "Me", true, "host");
        me.audio_track = Some(audio("local-audio"));
        me.video_track = Some(video("local-video"));

        let mut alice = peer("p1", "Alice", false, "guest");
        alice.audio_track = Some(track("p1-audio", TrackKind::Audio, TrackSource::Regular, true));
        alice.video_track = Some(track("p1-video", TrackKind::Video, TrackSource::Regular, true));

        let mut bob = peer("p2", "Bob", false, "guest");
        bob.audio_track = Some(track("p2-audio", TrackKind::Audio, TrackSource::Regular, true));
        bob.auxiliary_tracks = vec![track("p2-screen", TrackKind::Video, TrackSource::Screen, true)];

        Room {
            id: "room-1".to_string(),
            name: Some("Standup".to_string()),
            peer_count: Some(3),
            peers: vec![me, alice, bob],
            ..Default::default()
        }
    }

    pub(crate) fn sdk_error(code: i32, message: &str) -> SdkError {
        SdkError {
            code,
            description: format!("{message} (description)"),
            message: message.to_string(),
            action: "retry".to_string(),
            is_terminal: false,
        }
    }

    /// A message from Alice received at 10:30 UTC.
    pub(crate) fn message(text: &str, message_type: &str) -> Message {
        Message {
            sender: room().peers.into_iter().find(|p| p.peer_id == "p1"),
            message: text.to_string(),
            message_type: message_type.to_string(),
            server_receive_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap(),
        }
    }
}

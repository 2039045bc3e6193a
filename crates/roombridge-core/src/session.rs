use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::chat::ChatService;
use crate::controls::MeetingControls;
use crate::decode::{
    PeerRecord, RoleRecord, RoomRecord, decode_change_track_state_request, decode_message,
    decode_peer, decode_preview_tracks, decode_remote_peers, decode_removed_from_room,
    decode_role_change_request, decode_roles, decode_room, decode_speakers,
};
use crate::errors::BridgeError;
use crate::events::{
    BridgeEvent, BridgeEventListener, ErrorPayload, EventEmitter, JoinPayload, PeerUpdatePayload,
    PipModePayload, PreviewPayload, RoomUpdatePayload, SessionEvent, SessionStoreChangePayload, SpeakerPayload,
    TrackUpdatePayload,
};
use crate::moderation::ModerationService;
use crate::requests::{Credentials, SessionStoreKey, SessionStoreSet};
use crate::sdk::{NativeSdk, RoleChangeRequest, SdkError, SdkEvent, SdkEventReceiver, SdkResult};
use crate::streaming::StreamingService;
use crate::validate::{BridgeRequest, parse_request};

const DEFAULT_SUCCESS_MESSAGE: &str = "function call executed successfully";

/// Join lifecycle of a session. Preview runs beside it, tracked by a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Joining,
    Joined,
    Left,
    Removed,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) preview_in_progress: bool,
    /// Only the latest suggestion is kept; a new one silently replaces it.
    pub(crate) recent_role_change_request: Option<RoleChangeRequest>,
}

impl SessionState {
    fn blocks_preview(&self) -> bool {
        self.preview_in_progress || matches!(self.phase, SessionPhase::Joining | SessionPhase::Joined)
    }
}

/// Generic payload resolved by action-result operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSuccess {
    pub success: bool,
    pub message: String,
}

impl ActionSuccess {
    pub fn done() -> Self {
        Self::with_message(DEFAULT_SUCCESS_MESSAGE)
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Room, local peer and remote peers decoded at one instant.
pub(crate) struct Snapshot {
    pub(crate) room: Option<RoomRecord>,
    pub(crate) local_peer: Option<PeerRecord>,
    pub(crate) remote_peers: Vec<PeerRecord>,
}

/// State and collaborators shared by every service of one session.
pub(crate) struct SessionContext {
    pub(crate) id: String,
    pub(crate) sdk: Arc<dyn NativeSdk>,
    pub(crate) emitter: EventEmitter,
    pub(crate) state: Mutex<SessionState>,
}

impl SessionContext {
    pub(crate) fn emit(&self, event: BridgeEvent) {
        self.emitter.emit(SessionEvent {
            session_id: self.id.clone(),
            event,
        });
    }

    /// Broadcast `error` as `ON_ERROR` and hand it back for the rejection.
    pub(crate) fn reject(&self, error: BridgeError) -> BridgeError {
        tracing::warn!(session = %self.id, code = %error.code(), "rejecting call: {error}");
        self.emit(BridgeEvent::Error(ErrorPayload {
            error: error.error_record(),
        }));
        error
    }

    pub(crate) fn parse<T: BridgeRequest>(&self, data: &Value) -> Result<T, BridgeError> {
        parse_request(data).map_err(|e| self.reject(e))
    }

    /// Map a native completion onto the call result, broadcasting failures.
    pub(crate) fn settle<T>(&self, result: Result<T, SdkError>) -> Result<T, BridgeError> {
        result.map_err(|e| self.reject(BridgeError::Sdk(e)))
    }

    pub(crate) async fn run_action(&self, action: SdkResult<()>) -> Result<ActionSuccess, BridgeError> {
        self.settle(action.await).map(|()| ActionSuccess::done())
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            room: decode_room(self.sdk.room().as_ref()),
            local_peer: decode_peer(self.sdk.local_peer().as_ref()),
            remote_peers: decode_remote_peers(&self.sdk.remote_peers()),
        }
    }
}

/// Which native listener a callback stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Preview,
    Join,
}

impl SessionContext {
    async fn dispatch(&self, kind: ListenerKind, event: SdkEvent) {
        match event {
            SdkEvent::Preview { room, local_tracks } if kind == ListenerKind::Preview => {
                self.emit(BridgeEvent::Preview(PreviewPayload {
                    preview_tracks: decode_preview_tracks(&local_tracks),
                    room: decode_room(Some(&room)),
                    local_peer: decode_peer(self.sdk.local_peer().as_ref()),
                }));
                self.state.lock().await.preview_in_progress = false;
                tracing::info!(session = %self.id, "preview ready");
            }
            SdkEvent::Error(error) => {
                {
                    let mut state = self.state.lock().await;
                    match kind {
                        ListenerKind::Preview => state.preview_in_progress = false,
                        ListenerKind::Join if state.phase == SessionPhase::Joining => {
                            state.phase = SessionPhase::Idle;
                        }
                        ListenerKind::Join => {}
                    }
                }
                tracing::error!(session = %self.id, "sdk error: {error}");
                self.emit(BridgeEvent::Error(ErrorPayload {
                    error: crate::decode::decode_error(&error),
                }));
            }
            SdkEvent::PeerUpdate { update, peer } => {
                if update.is_transient() {
                    return;
                }
                let snapshot = self.snapshot();
                self.emit(BridgeEvent::PeerUpdate(PeerUpdatePayload {
                    peer: decode_peer(Some(&peer)),
                    update: Some(update),
                    room: snapshot.room,
                    local_peer: snapshot.local_peer,
                    remote_peers: snapshot.remote_peers,
                }));
            }
            SdkEvent::RoomUpdate { update, room } => {
                let snapshot = self.snapshot();
                self.emit(BridgeEvent::RoomUpdate(RoomUpdatePayload {
                    update,
                    room: decode_room(Some(&room)),
                    local_peer: snapshot.local_peer,
                    remote_peers: snapshot.remote_peers,
                }));
            }
            other if kind == ListenerKind::Preview => {
                tracing::debug!(session = %self.id, "ignoring {other:?} during preview");
            }
            SdkEvent::Preview { .. } => {}
            SdkEvent::Join { room } => {
                self.state.lock().await.phase = SessionPhase::Joined;
                tracing::info!(session = %self.id, room = %room.id, "joined room");
                self.emit(BridgeEvent::Join(JoinPayload {
                    room: decode_room(Some(&room)),
                    local_peer: decode_peer(self.sdk.local_peer().as_ref()),
                    remote_peers: decode_remote_peers(&self.sdk.remote_peers()),
                    roles: decode_roles(&self.sdk.roles()),
                }));
            }
            SdkEvent::TrackUpdate { update, track, peer } => {
                let snapshot = self.snapshot();
                self.emit(BridgeEvent::TrackUpdate(TrackUpdatePayload {
                    peer: decode_peer(Some(&peer)),
                    track: crate::decode::decode_track(Some(&track)),
                    room: snapshot.room,
                    update,
                    local_peer: snapshot.local_peer,
                    remote_peers: snapshot.remote_peers,
                }));
            }
            SdkEvent::Message(message) => {
                self.emit(BridgeEvent::Message(decode_message(&message)));
            }
            SdkEvent::Speakers { speakers } => {
                self.emit(BridgeEvent::Speaker(SpeakerPayload {
                    count: speakers.len(),
                    peers: decode_speakers(&speakers),
                }));
            }
            SdkEvent::Reconnecting(error) => {
                tracing::warn!(session = %self.id, "reconnecting: {error}");
                self.emit(BridgeEvent::Reconnecting);
            }
            SdkEvent::Reconnected => {
                tracing::info!(session = %self.id, "reconnected");
                self.emit(BridgeEvent::Reconnected);
            }
            SdkEvent::RoleChangeRequest(request) => {
                let decoded = decode_role_change_request(&request);
                self.state.lock().await.recent_role_change_request = Some(request);
                self.emit(BridgeEvent::RoleChangeRequest(decoded));
            }
            SdkEvent::ChangeTrackStateRequest(request) => {
                self.emit(BridgeEvent::ChangeTrackStateRequest(
                    decode_change_track_state_request(&request),
                ));
            }
            SdkEvent::RemovedFromRoom(notification) => {
                self.state.lock().await.phase = SessionPhase::Removed;
                tracing::info!(session = %self.id, reason = %notification.reason, "removed from room");
                self.emit(BridgeEvent::RemovedFromRoom(decode_removed_from_room(&notification)));
            }
            SdkEvent::SessionStoreAvailable => {
                self.emit(BridgeEvent::SessionStoreAvailable);
            }
            SdkEvent::SessionStoreChanged { key, value } => {
                self.emit(BridgeEvent::SessionStoreChanged(SessionStoreChangePayload {
                    key,
                    value,
                }));
            }
            SdkEvent::PipModeChanged { active } => {
                tracing::debug!(session = %self.id, active, "pip mode");
                self.emit(BridgeEvent::PipModeChanged(PipModePayload { is_active: active }));
            }
            SdkEvent::PipRoomLeave => {
                {
                    let mut state = self.state.lock().await;
                    state.phase = SessionPhase::Left;
                    state.recent_role_change_request = None;
                }
                tracing::info!(session = %self.id, "left room from pip");
                self.emit(BridgeEvent::PipRoomLeave);
            }
        }
    }
}

async fn listener_loop(ctx: Arc<SessionContext>, kind: ListenerKind, mut events: SdkEventReceiver) {
    while let Some(event) = events.recv().await {
        ctx.dispatch(kind, event).await;
    }
    tracing::debug!(session = %ctx.id, ?kind, "sdk listener closed");
}

/// One bridge session wrapping a single native SDK instance.
#[derive(Clone)]
pub struct BridgeSession {
    ctx: Arc<SessionContext>,
}

impl BridgeSession {
    pub fn new(sdk: Arc<dyn NativeSdk>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), sdk)
    }

    pub fn with_id(id: impl Into<String>, sdk: Arc<dyn NativeSdk>) -> Self {
        Self {
            ctx: Arc::new(SessionContext {
                id: id.into(),
                sdk,
                emitter: EventEmitter::new(),
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.ctx.id
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.ctx.emitter
    }

    /// Register a listener for every event of this session.
    pub fn add_listener(&self, listener: Arc<dyn BridgeEventListener>) {
        self.ctx.emitter.add_listener(listener);
    }

    pub fn chat(&self) -> ChatService {
        ChatService::new(self.ctx.clone())
    }

    pub fn controls(&self) -> MeetingControls {
        MeetingControls::new(self.ctx.clone())
    }

    pub fn moderation(&self) -> ModerationService {
        ModerationService::new(self.ctx.clone())
    }

    pub fn streaming(&self) -> StreamingService {
        StreamingService::new(self.ctx.clone())
    }

    pub async fn phase(&self) -> SessionPhase {
        self.ctx.state.lock().await.phase
    }

    pub async fn is_preview_in_progress(&self) -> bool {
        self.ctx.state.lock().await.preview_in_progress
    }

    pub async fn has_pending_role_change(&self) -> bool {
        self.ctx.state.lock().await.recent_role_change_request.is_some()
    }

    /// Start a preview with `{username, authToken, endpoint?, metadata?}`.
    ///
    /// Fails fast, without reaching the SDK, while another preview is
    /// running or the session is joining or joined. Rejections are emitted
    /// with the state lock released.
    pub async fn preview(&self, credentials: &Value) -> Result<(), BridgeError> {
        if self.ctx.state.lock().await.blocks_preview() {
            return Err(self.ctx.reject(BridgeError::PreviewAlreadyInProgress));
        }
        let Credentials(config) = self.ctx.parse(credentials)?;
        {
            let mut state = self.ctx.state.lock().await;
            if state.blocks_preview() {
                drop(state);
                return Err(self.ctx.reject(BridgeError::PreviewAlreadyInProgress));
            }
            state.preview_in_progress = true;
        }

        tracing::info!(session = %self.ctx.id, user = %config.username, "starting preview");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(listener_loop(self.ctx.clone(), ListenerKind::Preview, rx));

        if let Err(e) = self.ctx.sdk.preview(&config, tx) {
            self.ctx.state.lock().await.preview_in_progress = false;
            return Err(self.ctx.reject(BridgeError::Sdk(e)));
        }
        Ok(())
    }

    /// Join with the same credential shape as [`preview`](Self::preview).
    pub async fn join(&self, credentials: &Value) -> Result<(), BridgeError> {
        if self.is_preview_in_progress().await {
            return Err(self.ctx.reject(BridgeError::PreviewIsInProgress));
        }
        let Credentials(config) = self.ctx.parse(credentials)?;
        {
            let mut state = self.ctx.state.lock().await;
            if state.preview_in_progress {
                drop(state);
                return Err(self.ctx.reject(BridgeError::PreviewIsInProgress));
            }
            state.phase = SessionPhase::Joining;
        }

        tracing::info!(session = %self.ctx.id, user = %config.username, "joining room");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(listener_loop(self.ctx.clone(), ListenerKind::Join, rx));

        if let Err(e) = self.ctx.sdk.join(&config, tx) {
            self.ctx.state.lock().await.phase = SessionPhase::Idle;
            return Err(self.ctx.reject(BridgeError::Sdk(e)));
        }
        Ok(())
    }

    pub async fn leave(&self) -> Result<ActionSuccess, BridgeError> {
        let result = self.ctx.run_action(self.ctx.sdk.leave()).await?;
        let mut state = self.ctx.state.lock().await;
        state.phase = SessionPhase::Left;
        state.recent_role_change_request = None;
        tracing::info!(session = %self.ctx.id, "left room");
        Ok(result)
    }

    pub fn room(&self) -> Option<RoomRecord> {
        decode_room(self.ctx.sdk.room().as_ref())
    }

    pub fn local_peer(&self) -> Option<PeerRecord> {
        decode_peer(self.ctx.sdk.local_peer().as_ref())
    }

    pub fn remote_peers(&self) -> Vec<PeerRecord> {
        decode_remote_peers(&self.ctx.sdk.remote_peers())
    }

    pub fn roles(&self) -> Vec<RoleRecord> {
        decode_roles(&self.ctx.sdk.roles())
    }

    /// `{key}` → current session-store value.
    pub async fn session_store_get(&self, data: &Value) -> Result<Option<Value>, BridgeError> {
        let SessionStoreKey { key } = self.ctx.parse(data)?;
        self.ctx.settle(self.ctx.sdk.session_store_get(&key).await)
    }

    /// `{key, value?}`.
    pub async fn session_store_set(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let SessionStoreSet { key, value } = self.ctx.parse(data)?;
        self.ctx
            .run_action(self.ctx.sdk.session_store_set(&key, value))
            .await
    }

    /// Raw fetch used by the session-store sync; failures are not broadcast.
    pub(crate) fn fetch_session_value(&self, key: &str) -> SdkResult<Option<Value>> {
        self.ctx.sdk.session_store_get(key)
    }
}

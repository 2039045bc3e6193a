//! UniFFI bindings for roombridge-core.
//!
//! The host app implements [`HostSdk`] on top of the vendor SDK and feeds
//! its listener callbacks back through [`BridgeClient::deliver_sdk_event`].
//! Script-side code talks to [`BridgeClient::call`] and receives named
//! events through a [`BridgeEventSink`].
//!
//! Calls are async on the foreign side and run on the client's own tokio
//! runtime, so [`HostSdk`] methods are invoked from runtime worker threads.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use roombridge_core::sdk::{
    HlsConfig, JoinConfig, Message, NativeSdk, Peer, RecordingConfig, Role, RoleChangeRequest,
    Room, SdkError, SdkEvent, SdkEventSender, SdkResult, Track, TrackStateForRoles,
};
use roombridge_core::{BridgeError, BridgeSession, SessionEvent, SettingsStore, TokenService};
use serde_json::{Value, json};
use tokio::sync::oneshot;

uniffi::setup_scaffolding!();

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before creating a
/// BridgeClient.
#[uniffi::export]
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("roombridge_core=debug,roombridge_ffi=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .init();
    });
}

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BridgeFfiError {
    /// A rejected call: "101" for local failures, the native code otherwise.
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },
    #[error("host callback failed: {message}")]
    Host { message: String },
}

impl From<BridgeError> for BridgeFfiError {
    fn from(e: BridgeError) -> Self {
        tracing::error!("BridgeError: {e}");
        Self::Rejected {
            code: e.code(),
            message: e.message(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for BridgeFfiError {
    fn from(e: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Host { message: e.reason }
    }
}

// ── FFI-safe records ──────────────────────────────────────────────────

#[derive(Debug, Clone, uniffi::Record)]
pub struct Settings {
    pub display_name: Option<String>,
    pub init_endpoint: Option<String>,
    pub token_endpoint: String,
    pub mic_enabled_on_join: bool,
    pub camera_enabled_on_join: bool,
}

impl From<roombridge_core::Settings> for Settings {
    fn from(s: roombridge_core::Settings) -> Self {
        Self {
            display_name: s.display_name,
            init_endpoint: s.init_endpoint,
            token_endpoint: s.token_endpoint,
            mic_enabled_on_join: s.mic_enabled_on_join,
            camera_enabled_on_join: s.camera_enabled_on_join,
        }
    }
}

// ── Callback interfaces ───────────────────────────────────────────────

/// The vendor SDK, implemented by the host app.
///
/// Objects cross as JSON in the SDK's camelCase shape (`peerId`, `trackId`,
/// ...). Listener callbacks go back through `deliver_sdk_event`.
#[uniffi::export(callback_interface)]
pub trait HostSdk: Send + Sync {
    /// Capture settings to build the SDK instance with.
    fn configure(&self, track_settings_json: String);
    /// Start `"preview"` or `"join"` with a `JoinConfig` JSON.
    fn start(&self, mode: String, config_json: String) -> Result<(), BridgeFfiError>;
    /// Current `"room"`, `"roles"` or `"isScreenShared"` as JSON.
    fn snapshot(&self, what: String) -> String;
    /// Run an asynchronous action and settle `completion` when it finishes.
    fn invoke(&self, action: String, args_json: String, completion: Arc<ActionCompletion>);
    /// Run a synchronous setter.
    fn apply(&self, action: String, args_json: String);
}

/// Receives every bridge event as `(name, payload)`.
#[uniffi::export(callback_interface)]
pub trait BridgeEventSink: Send + Sync {
    fn on_event(&self, name: String, payload_json: String);
}

// ── Action completion ─────────────────────────────────────────────────

/// One-shot result slot handed to [`HostSdk::invoke`].
#[derive(uniffi::Object)]
pub struct ActionCompletion {
    tx: Mutex<Option<oneshot::Sender<Result<String, SdkError>>>>,
}

impl ActionCompletion {
    fn new() -> (Arc<Self>, oneshot::Receiver<Result<String, SdkError>>) {
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
        });
        (completion, rx)
    }

    fn settle(&self, result: Result<String, SdkError>) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!("action completion settled twice"),
        }
    }
}

#[uniffi::export]
impl ActionCompletion {
    /// Success with the action's JSON result; empty means no result.
    pub fn succeed(&self, result_json: String) {
        self.settle(Ok(result_json));
    }

    /// Failure with an SDK error JSON `{code, description, message, action, isTerminal}`.
    pub fn fail(&self, error_json: String) {
        let error = serde_json::from_str::<SdkError>(&error_json).unwrap_or_else(|e| SdkError {
            code: 0,
            description: e.to_string(),
            message: error_json.clone(),
            action: String::new(),
            is_terminal: false,
        });
        self.settle(Err(error));
    }
}

// ── Host adapter: HostSdk callback → NativeSdk ────────────────────────

fn host_error(message: impl Into<String>) -> SdkError {
    let message = message.into();
    SdkError {
        code: 0,
        description: message.clone(),
        message,
        action: String::new(),
        is_terminal: false,
    }
}

struct HostSdkAdapter {
    host: Box<dyn HostSdk>,
    events: Mutex<Option<SdkEventSender>>,
}

impl HostSdkAdapter {
    fn sender(&self) -> MutexGuard<'_, Option<SdkEventSender>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, event: SdkEvent) -> bool {
        match self.sender().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn start(&self, mode: &str, config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError> {
        *self.sender() = Some(events);
        let config_json = serde_json::to_string(config).map_err(|e| host_error(e.to_string()))?;
        self.host
            .start(mode.to_string(), config_json)
            .map_err(|e| host_error(e.to_string()))
    }

    fn snapshot<T: serde::de::DeserializeOwned>(&self, what: &str) -> Option<T> {
        let json = self.host.snapshot(what.to_string());
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(what, "unreadable snapshot: {e}");
                None
            }
        }
    }

    fn invoke<T>(&self, action: &str, args: Value) -> BoxFuture<'static, Result<T, SdkError>>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let (completion, rx) = ActionCompletion::new();
        self.host.invoke(action.to_string(), args.to_string(), completion);
        let action = action.to_string();
        Box::pin(async move {
            let json = rx
                .await
                .map_err(|_| host_error(format!("{action}: completion dropped")))??;
            let json = if json.trim().is_empty() { "null" } else { json.as_str() };
            serde_json::from_str(json).map_err(|e| host_error(format!("{action}: {e}")))
        })
    }

    fn apply(&self, action: &str, args: Value) {
        self.host.apply(action.to_string(), args.to_string());
    }
}

impl NativeSdk for HostSdkAdapter {
    fn preview(&self, config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError> {
        self.start("preview", config, events)
    }

    fn join(&self, config: &JoinConfig, events: SdkEventSender) -> Result<(), SdkError> {
        self.start("join", config, events)
    }

    fn leave(&self) -> SdkResult<()> {
        self.invoke("leave", Value::Null)
    }

    fn room(&self) -> Option<Room> {
        self.snapshot("room")
    }

    fn local_peer(&self) -> Option<Peer> {
        self.room().and_then(|r| r.local_peer().cloned())
    }

    fn remote_peers(&self) -> Vec<Peer> {
        self.room()
            .map(|r| r.remote_peers().cloned().collect())
            .unwrap_or_default()
    }

    fn roles(&self) -> Vec<Role> {
        self.snapshot("roles").unwrap_or_default()
    }

    fn is_screen_shared(&self) -> bool {
        self.snapshot("isScreenShared").unwrap_or(false)
    }

    fn send_broadcast_message(&self, message: &str, message_type: &str) -> SdkResult<Message> {
        self.invoke(
            "sendBroadcastMessage",
            json!({"message": message, "type": message_type}),
        )
    }

    fn send_group_message(
        &self,
        message: &str,
        message_type: &str,
        roles: &[Role],
    ) -> SdkResult<Message> {
        self.invoke(
            "sendGroupMessage",
            json!({"message": message, "type": message_type, "roles": roles}),
        )
    }

    fn send_direct_message(
        &self,
        message: &str,
        message_type: &str,
        peer: &Peer,
    ) -> SdkResult<Message> {
        self.invoke(
            "sendDirectMessage",
            json!({"message": message, "type": message_type, "peer": peer}),
        )
    }

    fn change_role(&self, peer: &Peer, role: &Role, force: bool) -> SdkResult<()> {
        self.invoke("changeRole", json!({"peer": peer, "role": role, "force": force}))
    }

    fn accept_change_role(&self, request: &RoleChangeRequest) -> SdkResult<()> {
        self.invoke("acceptChangeRole", json!(request))
    }

    fn change_track_state(&self, track: &Track, mute: bool) -> SdkResult<()> {
        self.invoke("changeTrackState", json!({"track": track, "mute": mute}))
    }

    fn change_track_state_for_roles(&self, request: &TrackStateForRoles) -> SdkResult<()> {
        self.invoke("changeTrackStateForRoles", json!(request))
    }

    fn remove_peer(&self, peer: &Peer, reason: &str) -> SdkResult<()> {
        self.invoke("removePeer", json!({"peer": peer, "reason": reason}))
    }

    fn end_room(&self, reason: &str, lock: bool) -> SdkResult<()> {
        self.invoke("endRoom", json!({"reason": reason, "lock": lock}))
    }

    fn change_metadata(&self, metadata: &str) -> SdkResult<()> {
        self.invoke("changeMetadata", json!({"metadata": metadata}))
    }

    fn change_name(&self, name: &str) -> SdkResult<()> {
        self.invoke("changeName", json!({"name": name}))
    }

    fn start_rtmp_or_recording(&self, config: &RecordingConfig) -> SdkResult<()> {
        self.invoke("startRtmpOrRecording", json!(config))
    }

    fn stop_rtmp_and_recording(&self) -> SdkResult<()> {
        self.invoke("stopRtmpAndRecording", Value::Null)
    }

    fn start_hls_streaming(&self, config: &HlsConfig) -> SdkResult<()> {
        self.invoke("startHlsStreaming", json!(config))
    }

    fn stop_hls_streaming(&self) -> SdkResult<()> {
        self.invoke("stopHlsStreaming", Value::Null)
    }

    fn stop_screenshare(&self) -> SdkResult<()> {
        self.invoke("stopScreenshare", Value::Null)
    }

    fn switch_camera(&self) -> SdkResult<()> {
        self.invoke("switchCamera", Value::Null)
    }

    fn set_local_audio_mute(&self, mute: bool) {
        self.apply("setLocalAudioMute", json!({"mute": mute}));
    }

    fn set_local_video_mute(&self, mute: bool) {
        self.apply("setLocalVideoMute", json!({"mute": mute}));
    }

    fn set_playback_allowed(&self, track: &Track, allowed: bool) {
        self.apply("setPlaybackAllowed", json!({"track": track, "allowed": allowed}));
    }

    fn set_volume(&self, track: &Track, volume: f64) {
        self.apply("setVolume", json!({"track": track, "volume": volume}));
    }

    fn session_store_get(&self, key: &str) -> SdkResult<Option<Value>> {
        self.invoke("sessionStoreGet", json!({"key": key}))
    }

    fn session_store_set(&self, key: &str, value: Option<Value>) -> SdkResult<()> {
        self.invoke("sessionStoreSet", json!({"key": key, "value": value}))
    }
}

// ── Bridge listener: core event → FFI sink ────────────────────────────

struct SinkListener {
    sink: Box<dyn BridgeEventSink>,
}

impl roombridge_core::BridgeEventListener for SinkListener {
    fn on_event(&self, event: SessionEvent) {
        match event.to_json() {
            Ok(payload) => self
                .sink
                .on_event(event.name().as_str().to_string(), payload.to_string()),
            Err(e) => tracing::error!(event = event.name().as_str(), "failed to encode event: {e}"),
        }
    }
}

fn parse_json(input: &str) -> Result<Value, BridgeFfiError> {
    if input.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(input).map_err(|e| BridgeFfiError::Rejected {
        code: roombridge_core::errors::LOCAL_REJECTION_CODE.to_string(),
        message: format!("invalid JSON arguments: {e}"),
    })
}

// ── BridgeClient: main FFI object ─────────────────────────────────────

#[derive(uniffi::Object)]
pub struct BridgeClient {
    session: BridgeSession,
    host: Arc<HostSdkAdapter>,
    settings: SettingsStore,
    rt: tokio::runtime::Runtime,
}

#[uniffi::export]
impl BridgeClient {
    #[uniffi::constructor]
    pub fn new(data_dir: String, host: Box<dyn HostSdk>) -> Result<Arc<Self>, BridgeFfiError> {
        let rt = tokio::runtime::Runtime::new().map_err(|e| BridgeFfiError::Host {
            message: format!("failed to create tokio runtime: {e}"),
        })?;
        let settings = SettingsStore::new(&data_dir);
        let track_settings = serde_json::to_string(&settings.get().track_settings())
            .map_err(|e| BridgeFfiError::Host { message: e.to_string() })?;
        host.configure(track_settings);

        let host = Arc::new(HostSdkAdapter {
            host,
            events: Mutex::new(None),
        });
        let session = BridgeSession::new(host.clone());
        tracing::info!(session = session.id(), "bridge client created");
        Ok(Arc::new(Self {
            session,
            host,
            settings,
            rt,
        }))
    }

    pub fn session_id(&self) -> String {
        self.session.id().to_string()
    }

    /// Invoke a bridge method with JSON arguments; resolves to JSON.
    pub async fn call(&self, method: String, args_json: String) -> Result<String, BridgeFfiError> {
        let args = parse_json(&args_json)?;
        let session = self.session.clone();
        self.run(async move {
            let result = session.call(&method, &args).await?;
            Ok(result.to_string())
        })
        .await
    }

    pub fn add_listener(&self, listener: Box<dyn BridgeEventSink>) {
        self.session
            .add_listener(Arc::new(SinkListener { sink: listener }));
    }

    /// Feed one SDK listener callback, as `{"event": "...", ...}` JSON.
    pub fn deliver_sdk_event(&self, event_json: String) -> Result<(), BridgeFfiError> {
        let event: SdkEvent = serde_json::from_str(&event_json).map_err(|e| BridgeFfiError::Host {
            message: format!("invalid sdk event: {e}"),
        })?;
        if !self.host.deliver(event) {
            tracing::warn!("sdk event dropped, no listener registered");
        }
        Ok(())
    }

    /// Resolve a meeting link to a token and preview with the saved settings.
    pub async fn preview_room(&self, meeting_link: String) -> Result<(), BridgeFfiError> {
        let settings = self.settings.get();
        let session = self.session.clone();
        self.run(async move {
            let credentials = credentials_for(&settings, &meeting_link).await?;
            session.preview(&credentials).await?;
            Ok(())
        })
        .await
    }

    /// Resolve a meeting link to a token and join with the saved settings.
    pub async fn join_room(&self, meeting_link: String) -> Result<(), BridgeFfiError> {
        let settings = self.settings.get();
        let session = self.session.clone();
        self.run(async move {
            let credentials = credentials_for(&settings, &meeting_link).await?;
            session.join(&credentials).await?;
            Ok(())
        })
        .await
    }

    pub fn get_settings(&self) -> Settings {
        self.settings.get().into()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.settings.set_display_name(name);
    }

    pub fn set_init_endpoint(&self, endpoint: Option<String>) {
        self.settings.set_init_endpoint(endpoint);
    }

    pub fn set_token_endpoint(&self, endpoint: String) {
        self.settings.set_token_endpoint(endpoint);
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.settings.set_mic_enabled_on_join(enabled);
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.settings.set_camera_enabled_on_join(enabled);
    }
}

impl BridgeClient {
    /// Run `task` on the client runtime and await it without blocking.
    ///
    /// The calling thread stays free, so a host may settle an
    /// [`ActionCompletion`] from the same thread that made the call.
    async fn run<T, F>(&self, task: F) -> Result<T, BridgeFfiError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, BridgeFfiError>> + Send + 'static,
    {
        self.rt.spawn(task).await.map_err(|e| BridgeFfiError::Host {
            message: format!("bridge task failed: {e}"),
        })?
    }
}

async fn credentials_for(
    settings: &roombridge_core::Settings,
    meeting_link: &str,
) -> Result<Value, BridgeFfiError> {
    let token = TokenService::request_token(&settings.token_endpoint, meeting_link, None).await?;
    Ok(settings.credentials(&token))
}

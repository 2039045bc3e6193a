//! Roombridge core: adapts a native conferencing SDK to a bridge of named
//! events and JSON calls.
//!
//! Pure Rust crate with no platform dependencies. Hosts plug the vendor SDK
//! in through [`sdk::NativeSdk`]; UI shells consume it via the UniFFI
//! bindings in `roombridge-ffi`.

pub mod auth;
pub mod chat;
pub mod controls;
pub mod decode;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod hooks;
pub mod moderation;
pub mod requests;
pub mod sdk;
pub mod session;
pub mod session_store;
pub mod settings;
pub mod store;
pub mod streaming;
pub mod validate;

#[cfg(test)]
pub(crate) mod mock_sdk;

pub use auth::{LinkKind, MeetingLink, TokenService};
pub use chat::ChatService;
pub use controls::MeetingControls;
pub use errors::BridgeError;
pub use events::{BridgeEvent, BridgeEventListener, EventEmitter, EventName, SessionEvent, Subscription};
pub use hooks::HookSet;
pub use moderation::ModerationService;
pub use sdk::{NativeSdk, SdkError, SdkEvent};
pub use session::{ActionSuccess, BridgeSession, SessionPhase};
pub use session_store::{SessionStoreBinding, SessionStoreSync};
pub use settings::{Settings, SettingsStore};
pub use store::{MeetingState, MeetingStore, SharedStore};
pub use streaming::StreamingService;

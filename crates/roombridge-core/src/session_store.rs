//! Keeps selected session-store keys mirrored into the [`MeetingStore`].
//!
//! Every key is fetched once, independently, while change notifications are
//! already being applied. A fetch that resolves after a change for the same
//! key is discarded, so the newer value is never overwritten.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::events::{BridgeEvent, BridgeEventListener, EventName, SessionEvent, Subscription};
use crate::session::BridgeSession;
use crate::store::SharedStore;

pub const SPOTLIGHT_KEY: &str = "spotlight";
pub const PINNED_MESSAGE_KEY: &str = "pinnedMessage";

pub struct SessionStoreSync {
    store: SharedStore,
    keys: Vec<String>,
    /// Last value delivered by a change notification, per key.
    changes: Mutex<HashMap<String, Option<Value>>>,
}

impl SessionStoreSync {
    pub fn new(store: SharedStore, keys: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            store,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            changes: Mutex::new(HashMap::new()),
        })
    }

    /// Sync for the keys the meeting UI relies on.
    pub fn meeting_keys(store: SharedStore) -> Arc<Self> {
        Self::new(store, &[SPOTLIGHT_KEY, PINNED_MESSAGE_KEY])
    }

    fn tracks(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Apply an initial fetch result. Returns false when a change for `key`
    /// already arrived and the fetched value was stale.
    pub fn apply_initial(&self, key: &str, value: Option<Value>) -> bool {
        let changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        if changes.contains_key(key) {
            tracing::debug!(key, "discarding stale session-store fetch");
            return false;
        }
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_session_value(key, value);
        true
    }

    pub fn apply_change(&self, key: &str, value: Option<Value>) {
        if !self.tracks(key) {
            return;
        }
        let mut changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = changes.insert(key.to_string(), value.clone()).flatten();

        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = previous.or_else(|| store.session_values.get(key).cloned());
        if previous != value {
            let shown = value.as_ref().map_or_else(|| "null".to_string(), Value::to_string);
            store.notify(format!("SessionStore: `{key}` key's value changed to {shown}"));
        }
        store.set_session_value(key, value);
    }

    /// Subscribe to changes, then start one fetch per key.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the fetches are
    /// spawned onto the current one.
    pub fn attach(self: &Arc<Self>, session: &BridgeSession) -> SessionStoreBinding {
        let subscription = session.emitter().subscribe(
            EventName::OnSessionStoreChanged,
            Arc::new(ChangeListener { sync: self.clone() }),
        );
        let fetches = self
            .keys
            .iter()
            .map(|key| {
                let sync = self.clone();
                let key = key.clone();
                let fetch = session.fetch_session_value(&key);
                tokio::spawn(async move {
                    match fetch.await {
                        Ok(value) => {
                            sync.apply_initial(&key, value);
                        }
                        Err(e) => tracing::warn!(key = %key, "session-store fetch failed: {e}"),
                    }
                })
            })
            .collect();
        SessionStoreBinding {
            _subscription: subscription,
            fetches,
        }
    }
}

struct ChangeListener {
    sync: Arc<SessionStoreSync>,
}

impl BridgeEventListener for ChangeListener {
    fn on_event(&self, event: SessionEvent) {
        if let BridgeEvent::SessionStoreChanged(change) = event.event {
            self.sync.apply_change(&change.key, change.value);
        }
    }
}

/// Live session-store sync; dropping it unsubscribes and cancels pending
/// fetches.
pub struct SessionStoreBinding {
    _subscription: Subscription,
    fetches: Vec<JoinHandle<()>>,
}

impl Drop for SessionStoreBinding {
    fn drop(&mut self) {
        for fetch in &self.fetches {
            fetch.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_sdk::MockSdk;
    use crate::sdk::SdkEvent;
    use crate::store::MeetingStore;
    use serde_json::json;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn initial_values_are_fetched() {
        let sdk = MockSdk::new();
        sdk.set_session_value(SPOTLIGHT_KEY, json!("p1-video"));
        let session = BridgeSession::with_id("s1", sdk.clone());
        let store = MeetingStore::shared();

        let _binding = SessionStoreSync::meeting_keys(store.clone()).attach(&session);
        settle().await;

        let store = store.lock().unwrap();
        assert_eq!(store.session_values.get(SPOTLIGHT_KEY), Some(&json!("p1-video")));
        assert!(store.session_values.get(PINNED_MESSAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn stale_fetch_does_not_overwrite_change() {
        let sdk = MockSdk::new();
        sdk.set_session_value(PINNED_MESSAGE_KEY, json!("old"));
        let gate = sdk.gate_session_fetches();
        let session = BridgeSession::with_id("s1", sdk.clone());
        let store = MeetingStore::shared();

        let _binding = SessionStoreSync::meeting_keys(store.clone()).attach(&session);
        session
            .join(&json!({"username": "me", "authToken": "t"}))
            .await
            .unwrap();
        sdk.push(SdkEvent::SessionStoreChanged {
            key: PINNED_MESSAGE_KEY.into(),
            value: Some(json!("new")),
        });
        settle().await;

        gate.notify_waiters();
        settle().await;

        let store = store.lock().unwrap();
        assert_eq!(store.session_values.get(PINNED_MESSAGE_KEY), Some(&json!("new")));
    }

    #[test]
    fn change_notifies_only_when_value_differs() {
        let store = MeetingStore::shared();
        let sync = SessionStoreSync::meeting_keys(store.clone());

        sync.apply_change(SPOTLIGHT_KEY, Some(json!("p1")));
        sync.apply_change(SPOTLIGHT_KEY, Some(json!("p1")));
        sync.apply_change(SPOTLIGHT_KEY, None);
        sync.apply_change("unrelated", Some(json!(1)));

        let mut store = store.lock().unwrap();
        assert_eq!(
            store.take_notifications(),
            vec![
                "SessionStore: `spotlight` key's value changed to \"p1\"",
                "SessionStore: `spotlight` key's value changed to null",
            ]
        );
        assert!(store.session_values.is_empty());
    }

    #[test]
    fn initial_fetch_applies_before_any_change() {
        let store = MeetingStore::shared();
        let sync = SessionStoreSync::meeting_keys(store.clone());

        assert!(sync.apply_initial(SPOTLIGHT_KEY, Some(json!("p2"))));
        sync.apply_change(SPOTLIGHT_KEY, Some(json!("p3")));
        assert!(!sync.apply_initial(SPOTLIGHT_KEY, Some(json!("p2"))));

        let store = store.lock().unwrap();
        assert_eq!(store.session_values.get(SPOTLIGHT_KEY), Some(&json!("p3")));
    }

    #[test]
    #[should_panic(expected = "Tokio 1.x runtime")]
    fn attach_outside_runtime_panics() {
        let session = BridgeSession::with_id("s1", MockSdk::new());
        let _binding = SessionStoreSync::meeting_keys(MeetingStore::shared()).attach(&session);
    }
}

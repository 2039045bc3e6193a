use std::sync::Arc;

use serde_json::Value;

use crate::errors::BridgeError;
use crate::requests::{BroadcastMessage, DirectMessage, GroupMessage};
use crate::session::{ActionSuccess, SessionContext};
use crate::validate::{find_peer, roles_from_names};

/// Chat messaging for a session.
pub struct ChatService {
    ctx: Arc<SessionContext>,
}

impl ChatService {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// `{message, type}` to everyone in the room. Resolves with the sent text.
    pub async fn send_broadcast_message(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: BroadcastMessage = self.ctx.parse(data)?;
        let sent = self
            .ctx
            .sdk
            .send_broadcast_message(&req.message, &req.message_type)
            .await;
        let message = self.ctx.settle(sent)?;
        tracing::debug!(session = %self.ctx.id, "broadcast message sent");
        Ok(ActionSuccess::with_message(message.message))
    }

    /// `{message, type, roles}` to every peer holding one of the named roles.
    pub async fn send_group_message(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: GroupMessage = self.ctx.parse(data)?;
        let roles = roles_from_names(&req.roles, &self.ctx.sdk.roles());
        let sent = self
            .ctx
            .sdk
            .send_group_message(&req.message, &req.message_type, &roles)
            .await;
        let message = self.ctx.settle(sent)?;
        tracing::debug!(session = %self.ctx.id, roles = roles.len(), "group message sent");
        Ok(ActionSuccess::with_message(message.message))
    }

    /// `{message, type, peerId}` to one peer.
    pub async fn send_direct_message(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: DirectMessage = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        let Some(peer) = find_peer(&req.peer_id, room.as_ref()) else {
            return Err(self.ctx.reject(BridgeError::PeerNotFound));
        };
        let sent = self
            .ctx
            .sdk
            .send_direct_message(&req.message, &req.message_type, peer)
            .await;
        let message = self.ctx.settle(sent)?;
        tracing::debug!(session = %self.ctx.id, peer = %req.peer_id, "direct message sent");
        Ok(ActionSuccess::with_message(message.message))
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::BridgeError;
    use crate::events::EventName;
    use crate::mock_sdk::{MockSdk, collect_events, fixtures};
    use crate::session::BridgeSession;
    use serde_json::json;

    #[tokio::test]
    async fn group_message_resolves_with_text() {
        let sdk = MockSdk::new();
        let session = BridgeSession::with_id("s1", sdk.clone());

        let result = session
            .chat()
            .send_group_message(&json!({"message": "hi", "type": "chat", "roles": ["viewer"]}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.message, "hi");
        assert_eq!(sdk.calls(), vec!["send_group_message:viewer"]);
    }

    #[tokio::test]
    async fn group_message_failure_rejects_with_native_code() {
        let sdk = MockSdk::new();
        sdk.fail("send_group_message", fixtures::sdk_error(6002, "not allowed"));
        let session = BridgeSession::with_id("s1", sdk.clone());
        let mut rx = collect_events(&session);

        let err = session
            .chat()
            .send_group_message(&json!({"message": "hi", "type": "chat", "roles": ["viewer"]}))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "6002");
        assert_eq!(err.message(), "not allowed");
        let event = rx.try_recv().unwrap();
        assert_eq!(event.name(), EventName::OnError);
        assert_eq!(event.to_json().unwrap()["error"]["code"], 6002);
    }

    #[tokio::test]
    async fn broadcast_requires_type() {
        let sdk = MockSdk::new();
        let session = BridgeSession::with_id("s1", sdk.clone());

        let err = session
            .chat()
            .send_broadcast_message(&json!({"message": "hi"}))
            .await
            .unwrap_err();

        assert_eq!(err, BridgeError::RequiredKeysNotFound);
        assert_eq!(err.code(), "101");
        assert!(sdk.calls().is_empty());
    }

    #[tokio::test]
    async fn direct_message_to_unknown_peer() {
        let sdk = MockSdk::new();
        let session = BridgeSession::with_id("s1", sdk.clone());
        let mut rx = collect_events(&session);

        let err = session
            .chat()
            .send_direct_message(&json!({"message": "hi", "type": "chat", "peerId": "ghost"}))
            .await
            .unwrap_err();

        assert_eq!(err, BridgeError::PeerNotFound);
        assert_eq!(rx.try_recv().unwrap().name(), EventName::OnError);
        assert!(sdk.calls().is_empty());

        session
            .chat()
            .send_direct_message(&json!({"message": "hi", "type": "chat", "peerId": "p1"}))
            .await
            .unwrap();
        assert_eq!(sdk.calls(), vec!["send_direct_message:p1"]);
    }
}

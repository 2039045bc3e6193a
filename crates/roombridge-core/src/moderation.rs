use std::sync::Arc;

use serde_json::Value;

use crate::errors::BridgeError;
use crate::events::{BridgeEvent, PeerUpdatePayload};
use crate::requests::{ChangeRole, ChangeTrackState, ChangeTrackStateForRoles, EndRoom, Mute, RemovePeer};
use crate::sdk::TrackStateForRoles;
use crate::session::{ActionSuccess, SessionContext};
use crate::validate::{all_audio_tracks, find_peer, find_role, find_track, roles_from_names};

/// Actions one peer takes on other peers, their tracks, or the room.
pub struct ModerationService {
    ctx: Arc<SessionContext>,
}

impl ModerationService {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// `{peerId, role, force}`.
    pub async fn change_role(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: ChangeRole = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        let Some(peer) = find_peer(&req.peer_id, room.as_ref()) else {
            return Err(self.ctx.reject(BridgeError::PeerNotFound));
        };
        let roles = self.ctx.sdk.roles();
        let Some(role) = find_role(&req.role, &roles) else {
            return Err(self.ctx.reject(BridgeError::RoleNotFound));
        };
        tracing::info!(session = %self.ctx.id, peer = %req.peer_id, role = %req.role, "changing role");
        self.ctx
            .run_action(self.ctx.sdk.change_role(peer, role, req.force))
            .await
    }

    /// Accept the most recent suggested role. `None` when nothing was pending.
    pub async fn accept_role_change(&self) -> Result<Option<ActionSuccess>, BridgeError> {
        let pending = self.ctx.state.lock().await.recent_role_change_request.take();
        let Some(request) = pending else {
            tracing::debug!(session = %self.ctx.id, "no role change request to accept");
            return Ok(None);
        };
        let result = self
            .ctx
            .run_action(self.ctx.sdk.accept_change_role(&request))
            .await?;
        Ok(Some(result))
    }

    /// `{trackId, mute}` on any local or remote track.
    pub async fn change_track_state(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: ChangeTrackState = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        let Some(track) = find_track(&req.track_id, room.as_ref()) else {
            return Err(self.ctx.reject(BridgeError::TrackNotFound));
        };
        self.ctx
            .run_action(self.ctx.sdk.change_track_state(track, req.mute))
            .await
    }

    /// `{mute, type?, source?, roles?}`; an absent filter means "all".
    pub async fn change_track_state_for_roles(
        &self,
        data: &Value,
    ) -> Result<ActionSuccess, BridgeError> {
        let req: ChangeTrackStateForRoles = self.ctx.parse(data)?;
        let roles = req
            .roles
            .map(|names| roles_from_names(&names, &self.ctx.sdk.roles()));
        let request = TrackStateForRoles {
            mute: req.mute,
            kind: req.kind,
            source: req.source,
            roles,
        };
        self.ctx
            .run_action(self.ctx.sdk.change_track_state_for_roles(&request))
            .await
    }

    /// `{peerId, reason}`.
    pub async fn remove_peer(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: RemovePeer = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        let Some(peer) = find_peer(&req.peer_id, room.as_ref()) else {
            return Err(self.ctx.reject(BridgeError::PeerNotFound));
        };
        tracing::info!(session = %self.ctx.id, peer = %req.peer_id, "removing peer");
        self.ctx
            .run_action(self.ctx.sdk.remove_peer(peer, &req.reason))
            .await
    }

    /// `{lock, reason}`.
    pub async fn end_room(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: EndRoom = self.ctx.parse(data)?;
        tracing::info!(session = %self.ctx.id, lock = req.lock, "ending room");
        self.ctx
            .run_action(self.ctx.sdk.end_room(&req.reason, req.lock))
            .await
    }

    /// Mute every audio track in the room.
    ///
    /// Each track is attempted even after a failure. Only the last failure
    /// is reported.
    pub async fn remote_mute_all_audio(&self) -> Result<ActionSuccess, BridgeError> {
        let tracks = all_audio_tracks(self.ctx.sdk.room().as_ref());
        let mut last_error = None;
        for track in &tracks {
            if let Err(e) = self.ctx.sdk.change_track_state(track, true).await {
                tracing::warn!(session = %self.ctx.id, track = %track.track_id, "mute failed: {e}");
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(self.ctx.reject(BridgeError::Sdk(e))),
            None => Ok(ActionSuccess::done()),
        }
    }

    /// `{mute}`: toggle subscriber playback on every remote audio track,
    /// then broadcast refreshed peers.
    pub async fn set_playback_for_all_audio(&self, data: &Value) -> Result<(), BridgeError> {
        let Mute { mute } = self.ctx.parse(data)?;
        // Auxiliary audio keeps its own playback setting.
        for peer in self.ctx.sdk.remote_peers() {
            if let Some(track) = &peer.audio_track {
                self.ctx.sdk.set_playback_allowed(track, !mute);
            }
        }
        let snapshot = self.ctx.snapshot();
        self.ctx.emit(BridgeEvent::PeerUpdate(PeerUpdatePayload {
            peer: None,
            update: None,
            room: None,
            local_peer: snapshot.local_peer,
            remote_peers: snapshot.remote_peers,
        }));
        Ok(())
    }
}

use std::sync::Arc;

use serde_json::Value;

use crate::errors::BridgeError;
use crate::requests::{ChangeMetadata, ChangeName, LocalMute, SetPlaybackAllowed, SetVolume, TrackId};
use crate::sdk::{Track, TrackKind};
use crate::session::{ActionSuccess, SessionContext};
use crate::validate::{find_remote_audio_track, find_remote_video_track, find_track};

/// Volume restored by [`MeetingControls::reset_volume`].
pub const DEFAULT_REMOTE_VOLUME: f64 = 10.0;

/// Local media, per-track playback and local peer settings.
pub struct MeetingControls {
    ctx: Arc<SessionContext>,
}

impl MeetingControls {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// `{isMute}` on the local microphone.
    pub fn set_local_mute(&self, data: &Value) -> Result<(), BridgeError> {
        let LocalMute { is_mute } = self.ctx.parse(data)?;
        self.ctx.sdk.set_local_audio_mute(is_mute);
        tracing::debug!(session = %self.ctx.id, muted = is_mute, "local audio");
        Ok(())
    }

    /// `{isMute}` on the local camera.
    pub fn set_local_video_mute(&self, data: &Value) -> Result<(), BridgeError> {
        let LocalMute { is_mute } = self.ctx.parse(data)?;
        self.ctx.sdk.set_local_video_mute(is_mute);
        tracing::debug!(session = %self.ctx.id, muted = is_mute, "local video");
        Ok(())
    }

    /// Flip front/back camera. Does nothing while local video is muted.
    pub async fn switch_camera(&self) -> Result<ActionSuccess, BridgeError> {
        let video_live = self
            .ctx
            .sdk
            .local_peer()
            .and_then(|p| p.video_track)
            .is_some_and(|t| !t.is_mute);
        if !video_live {
            tracing::debug!(session = %self.ctx.id, "camera switch skipped, video muted");
            return Ok(ActionSuccess::done());
        }
        self.ctx.run_action(self.ctx.sdk.switch_camera()).await
    }

    /// `{trackId}` → mute state of any local or remote track.
    pub fn is_mute(&self, data: &Value) -> Result<bool, BridgeError> {
        let TrackId { track_id } = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        find_track(&track_id, room.as_ref())
            .map(|t| t.is_mute)
            .ok_or_else(|| self.ctx.reject(BridgeError::TrackNotFound))
    }

    fn remote_playable_track(&self, track_id: &str) -> Option<Track> {
        let room = self.ctx.sdk.room();
        find_remote_audio_track(track_id, room.as_ref())
            .or_else(|| find_remote_video_track(track_id, room.as_ref()))
            .cloned()
    }

    /// `{trackId, playbackAllowed}` on a remote audio or video track.
    pub fn set_playback_allowed(&self, data: &Value) -> Result<(), BridgeError> {
        let req: SetPlaybackAllowed = self.ctx.parse(data)?;
        let Some(track) = self.remote_playable_track(&req.track_id) else {
            return Err(self.ctx.reject(BridgeError::TrackNotFound));
        };
        self.ctx.sdk.set_playback_allowed(&track, req.playback_allowed);
        Ok(())
    }

    /// `{trackId}` → playback switch of a remote audio or video track.
    pub fn is_playback_allowed(&self, data: &Value) -> Result<bool, BridgeError> {
        let TrackId { track_id } = self.ctx.parse(data)?;
        self.remote_playable_track(&track_id)
            .map(|t| t.playback_allowed.unwrap_or(true))
            .ok_or_else(|| self.ctx.reject(BridgeError::TrackNotFound))
    }

    /// `{trackId, volume}` on a remote audio track, regular or auxiliary.
    pub fn set_volume(&self, data: &Value) -> Result<(), BridgeError> {
        let req: SetVolume = self.ctx.parse(data)?;
        let room = self.ctx.sdk.room();
        let Some(track) = find_remote_audio_track(&req.track_id, room.as_ref()) else {
            return Err(self.ctx.reject(BridgeError::TrackNotFound));
        };
        self.ctx.sdk.set_volume(track, req.volume);
        Ok(())
    }

    /// `{trackId}` → volume of the local audio track.
    pub fn get_volume(&self, data: &Value) -> Result<f64, BridgeError> {
        let TrackId { track_id } = self.ctx.parse(data)?;
        self.ctx
            .sdk
            .local_peer()
            .and_then(|p| p.audio_track)
            .filter(|t| t.track_id == track_id)
            .map(|t| t.volume.unwrap_or_default())
            .ok_or_else(|| self.ctx.reject(BridgeError::TrackIdsDoNotMatch))
    }

    /// Restore the default volume on playable remote audio and on every
    /// remote auxiliary audio track.
    pub fn reset_volume(&self) {
        let mut reset = 0;
        for peer in self.ctx.sdk.remote_peers() {
            let regular = peer
                .audio_track
                .iter()
                .filter(|t| t.playback_allowed.unwrap_or(true));
            let auxiliary = peer
                .auxiliary_tracks
                .iter()
                .filter(|t| t.kind == TrackKind::Audio);
            for track in regular.chain(auxiliary) {
                self.ctx.sdk.set_volume(track, DEFAULT_REMOTE_VOLUME);
                reset += 1;
            }
        }
        tracing::debug!(session = %self.ctx.id, tracks = reset, "volume reset");
    }

    /// `{metadata}` on the local peer.
    pub async fn change_metadata(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let ChangeMetadata { metadata } = self.ctx.parse(data)?;
        self.ctx
            .run_action(self.ctx.sdk.change_metadata(&metadata))
            .await
    }

    /// `{name}` on the local peer; an empty name is refused.
    pub async fn change_name(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let ChangeName { name } = self.ctx.parse(data)?;
        if name.is_empty() {
            return Err(self.ctx.reject(BridgeError::NameUndefined));
        }
        self.ctx.run_action(self.ctx.sdk.change_name(&name)).await
    }

    pub fn is_screen_shared(&self) -> bool {
        self.ctx.sdk.is_screen_shared()
    }

    pub async fn stop_screenshare(&self) -> Result<ActionSuccess, BridgeError> {
        self.ctx.run_action(self.ctx.sdk.stop_screenshare()).await
    }
}

//! Method-name routing for calls arriving over the bridge.

use serde::Serialize;
use serde_json::Value;

use crate::errors::BridgeError;
use crate::session::BridgeSession;

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl BridgeSession {
    /// Route `method` with its JSON arguments to the matching operation.
    ///
    /// Operations without a result resolve to `null`.
    pub async fn call(&self, method: &str, args: &Value) -> Result<Value, BridgeError> {
        tracing::debug!(session = %self.id(), method, "bridge call");
        let result = match method {
            "preview" => to_json(self.preview(args).await?),
            "join" => to_json(self.join(args).await?),
            "leave" => to_json(self.leave().await?),
            "getRoom" => to_json(self.room()),
            "getLocalPeer" => to_json(self.local_peer()),
            "getRemotePeers" => to_json(self.remote_peers()),
            "getRoles" => to_json(self.roles()),

            "sendBroadcastMessage" => to_json(self.chat().send_broadcast_message(args).await?),
            "sendGroupMessage" => to_json(self.chat().send_group_message(args).await?),
            "sendDirectMessage" => to_json(self.chat().send_direct_message(args).await?),

            "changeRole" => to_json(self.moderation().change_role(args).await?),
            "acceptRoleChange" => to_json(self.moderation().accept_role_change().await?),
            "changeTrackState" => to_json(self.moderation().change_track_state(args).await?),
            "changeTrackStateForRoles" => {
                to_json(self.moderation().change_track_state_for_roles(args).await?)
            }
            "removePeer" => to_json(self.moderation().remove_peer(args).await?),
            "endRoom" => to_json(self.moderation().end_room(args).await?),
            "remoteMuteAllAudio" => to_json(self.moderation().remote_mute_all_audio().await?),
            "setPlaybackForAllAudio" => {
                to_json(self.moderation().set_playback_for_all_audio(args).await?)
            }

            "setLocalMute" => to_json(self.controls().set_local_mute(args)?),
            "setLocalVideoMute" => to_json(self.controls().set_local_video_mute(args)?),
            "switchCamera" => to_json(self.controls().switch_camera().await?),
            "isMute" => to_json(self.controls().is_mute(args)?),
            "setPlaybackAllowed" => to_json(self.controls().set_playback_allowed(args)?),
            "isPlaybackAllowed" => to_json(self.controls().is_playback_allowed(args)?),
            "setVolume" => to_json(self.controls().set_volume(args)?),
            "getVolume" => to_json(self.controls().get_volume(args)?),
            "resetVolume" => to_json(self.controls().reset_volume()),
            "changeMetadata" => to_json(self.controls().change_metadata(args).await?),
            "changeName" => to_json(self.controls().change_name(args).await?),
            "isScreenShared" => to_json(self.controls().is_screen_shared()),
            "stopScreenshare" => to_json(self.controls().stop_screenshare().await?),

            "startRTMPOrRecording" => {
                to_json(self.streaming().start_rtmp_or_recording(args).await?)
            }
            "stopRtmpAndRecording" => to_json(self.streaming().stop_rtmp_and_recording().await?),
            "startHLSStreaming" => to_json(self.streaming().start_hls_streaming(args).await?),
            "stopHLSStreaming" => to_json(self.streaming().stop_hls_streaming().await?),

            "sessionStoreGet" => to_json(self.session_store_get(args).await?),
            "sessionStoreSet" => to_json(self.session_store_set(args).await?),

            other => {
                tracing::warn!(session = %self.id(), method = other, "unknown bridge method");
                return Err(BridgeError::UnknownMethod(other.to_string()));
            }
        };
        Ok(result)
    }
}

use std::sync::Arc;

use serde_json::Value;

use crate::errors::BridgeError;
use crate::requests::{StartHlsStreaming, StartRtmpOrRecording};
use crate::sdk::{HlsConfig, RecordingConfig};
use crate::session::{ActionSuccess, SessionContext};

/// RTMP, browser recording and HLS control.
pub struct StreamingService {
    ctx: Arc<SessionContext>,
}

impl StreamingService {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// `{meetingURL, record, rtmpURLs?}`.
    pub async fn start_rtmp_or_recording(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: StartRtmpOrRecording = self.ctx.parse(data)?;
        let config = RecordingConfig {
            meeting_url: req.meeting_url,
            rtmp_urls: req.rtmp_urls,
            record: req.record,
        };
        tracing::info!(
            session = %self.ctx.id,
            record = config.record,
            rtmp = config.rtmp_urls.len(),
            "starting rtmp/recording"
        );
        self.ctx
            .run_action(self.ctx.sdk.start_rtmp_or_recording(&config))
            .await
    }

    pub async fn stop_rtmp_and_recording(&self) -> Result<ActionSuccess, BridgeError> {
        tracing::info!(session = %self.ctx.id, "stopping rtmp/recording");
        self.ctx
            .run_action(self.ctx.sdk.stop_rtmp_and_recording())
            .await
    }

    /// `{meetingURLVariants, recordingConfig?}`.
    pub async fn start_hls_streaming(&self, data: &Value) -> Result<ActionSuccess, BridgeError> {
        let req: StartHlsStreaming = self.ctx.parse(data)?;
        let config = HlsConfig {
            variants: req.variants,
            recording: req.recording,
        };
        tracing::info!(session = %self.ctx.id, variants = config.variants.len(), "starting hls");
        self.ctx
            .run_action(self.ctx.sdk.start_hls_streaming(&config))
            .await
    }

    pub async fn stop_hls_streaming(&self) -> Result<ActionSuccess, BridgeError> {
        tracing::info!(session = %self.ctx.id, "stopping hls");
        self.ctx.run_action(self.ctx.sdk.stop_hls_streaming()).await
    }
}

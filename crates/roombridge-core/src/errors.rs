use thiserror::Error;

use crate::decode::{ErrorRecord, decode_error};
use crate::sdk::SdkError;

/// Rejection code for every failure detected before reaching the SDK.
pub const LOCAL_REJECTION_CODE: &str = "101";

/// Code carried by synthetic `ON_ERROR` events.
const LOCAL_ERROR_EVENT_CODE: i32 = 102;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("REQUIRED_KEYS_NOT_FOUND")]
    RequiredKeysNotFound,
    #[error("PEER_NOT_FOUND")]
    PeerNotFound,
    #[error("NOT_FOUND")]
    TrackNotFound,
    #[error("ROLE_NOT_FOUND")]
    RoleNotFound,
    #[error("PREVIEW_ALREADY_IN_PROGRESS")]
    PreviewAlreadyInProgress,
    #[error("PREVIEW_IS_IN_PROGRESS")]
    PreviewIsInProgress,
    #[error("NAME_UNDEFINED")]
    NameUndefined,
    #[error("TRACK_IDS_DO_NOT_MATCH")]
    TrackIdsDoNotMatch,
    #[error("UNKNOWN_METHOD: {0}")]
    UnknownMethod(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid meeting url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

impl BridgeError {
    /// Code the pending call is rejected with.
    pub fn code(&self) -> String {
        match self {
            BridgeError::Sdk(e) => e.code.to_string(),
            _ => LOCAL_REJECTION_CODE.to_string(),
        }
    }

    /// Message the pending call is rejected with.
    pub fn message(&self) -> String {
        match self {
            BridgeError::Sdk(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Decoded record broadcast alongside the rejection.
    pub fn error_record(&self) -> ErrorRecord {
        match self {
            BridgeError::Sdk(e) => decode_error(e),
            BridgeError::RequiredKeysNotFound => ErrorRecord {
                code: LOCAL_ERROR_EVENT_CODE,
                description: "NOT_FOUND".to_string(),
                message: "REQUIRED_KEYS_NOT_FOUND".to_string(),
                action: "SEND_ALL_REQUIRED_KEYS".to_string(),
                is_terminal: false,
            },
            other => {
                let message = other.to_string();
                ErrorRecord {
                    code: LOCAL_ERROR_EVENT_CODE,
                    description: message.clone(),
                    message: message.clone(),
                    action: message,
                    is_terminal: false,
                }
            }
        }
    }
}

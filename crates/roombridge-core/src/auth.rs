use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::BridgeError;

const LINK_HOST_SUFFIX: &str = ".app.100ms.live";
const ROOM_CODE_PATTERN: &str = r"^[a-z]{3}-[a-z]{4}-[a-z]{3}$";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Page a meeting link opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Meeting,
    Preview,
    Streaming,
}

impl LinkKind {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "meeting" => Some(LinkKind::Meeting),
            "preview" => Some(LinkKind::Preview),
            "streaming" => Some(LinkKind::Streaming),
            _ => None,
        }
    }
}

/// A parsed meeting link, or a bare room code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingLink {
    pub subdomain: Option<String>,
    pub kind: LinkKind,
    pub code: String,
}

/// Exchanges room codes for auth tokens.
pub struct TokenService;

impl TokenService {
    /// Accepts `https://<subdomain>.app.100ms.live/<meeting|preview|streaming>/<code>`
    /// or a bare `abc-defg-hij` code.
    pub fn parse_meeting_link(input: &str) -> Result<MeetingLink, BridgeError> {
        let input = input.trim().trim_end_matches('/');
        if !input.contains('/') {
            return Ok(MeetingLink {
                subdomain: None,
                kind: LinkKind::Meeting,
                code: Self::validate_room_code(input)?,
            });
        }

        let url = Url::parse(input).map_err(|e| BridgeError::InvalidUrl(format!("{input}: {e}")))?;
        let host = url.host_str().unwrap_or_default();
        let Some(subdomain) = host.strip_suffix(LINK_HOST_SUFFIX).filter(|s| !s.is_empty()) else {
            return Err(BridgeError::InvalidUrl(format!("unexpected host '{host}'")));
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let [kind, code] = segments.as_slice() else {
            return Err(BridgeError::InvalidUrl(format!(
                "expected '/<meeting|preview|streaming>/<code>', got '{}'",
                url.path()
            )));
        };
        let kind = LinkKind::parse(kind)
            .ok_or_else(|| BridgeError::InvalidUrl(format!("unknown link kind '{kind}'")))?;

        Ok(MeetingLink {
            subdomain: Some(subdomain.to_string()),
            kind,
            code: Self::validate_room_code(code)?,
        })
    }

    pub fn validate_room_code(code: &str) -> Result<String, BridgeError> {
        let re = Regex::new(ROOM_CODE_PATTERN).map_err(|e| BridgeError::InvalidUrl(e.to_string()))?;
        if re.is_match(code) {
            Ok(code.to_string())
        } else {
            Err(BridgeError::InvalidUrl(format!(
                "invalid room code format: '{code}'"
            )))
        }
    }

    /// POST `{code, user_id}` to `endpoint` and return the auth token.
    pub async fn request_token(
        endpoint: &str,
        link: &str,
        user_id: Option<&str>,
    ) -> Result<String, BridgeError> {
        let link = Self::parse_meeting_link(link)?;
        let generated;
        let user_id = match user_id {
            Some(id) => id,
            None => {
                generated = uuid::Uuid::new_v4().to_string();
                generated.as_str()
            }
        };

        tracing::info!(code = %link.code, "requesting auth token from {endpoint}");

        let resp = reqwest::Client::new()
            .post(endpoint)
            .json(&TokenRequest {
                code: &link.code,
                user_id,
            })
            .send()
            .await
            .map_err(|e| BridgeError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BridgeError::Auth(format!(
                "token endpoint returned status {}",
                resp.status()
            )));
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Auth(format!("invalid token response: {e}")))?;
        Ok(data.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_meeting_link() {
        let link =
            TokenService::parse_meeting_link("https://acme.app.100ms.live/meeting/abc-defg-hij")
                .unwrap();
        assert_eq!(link.subdomain.as_deref(), Some("acme"));
        assert_eq!(link.kind, LinkKind::Meeting);
        assert_eq!(link.code, "abc-defg-hij");
    }

    #[test]
    fn parse_link_kinds_and_trailing_slash() {
        let preview =
            TokenService::parse_meeting_link("https://acme.app.100ms.live/preview/abc-defg-hij/")
                .unwrap();
        assert_eq!(preview.kind, LinkKind::Preview);

        let streaming =
            TokenService::parse_meeting_link("https://acme.app.100ms.live/streaming/xyz-abcd-efg")
                .unwrap();
        assert_eq!(streaming.kind, LinkKind::Streaming);
        assert_eq!(streaming.code, "xyz-abcd-efg");
    }

    #[test]
    fn parse_bare_code() {
        let link = TokenService::parse_meeting_link("  abc-defg-hij ").unwrap();
        assert_eq!(link.subdomain, None);
        assert_eq!(link.code, "abc-defg-hij");
    }

    #[test]
    fn reject_foreign_host() {
        let err = TokenService::parse_meeting_link("https://example.com/meeting/abc-defg-hij")
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
        assert!(TokenService::parse_meeting_link("https://app.100ms.live/meeting/abc-defg-hij").is_err());
    }

    #[test]
    fn reject_unknown_kind_or_extra_segments() {
        assert!(TokenService::parse_meeting_link("https://acme.app.100ms.live/join/abc-defg-hij").is_err());
        assert!(TokenService::parse_meeting_link("https://acme.app.100ms.live/abc-defg-hij").is_err());
        assert!(
            TokenService::parse_meeting_link("https://acme.app.100ms.live/meeting/abc-defg-hij/x")
                .is_err()
        );
    }

    #[test]
    fn validate_room_code_format() {
        assert!(TokenService::validate_room_code("abc-defg-hij").is_ok());
        assert!(TokenService::validate_room_code("ABC-defg-hij").is_err());
        assert!(TokenService::validate_room_code("abcdefghij").is_err());
        assert!(TokenService::validate_room_code("ab-defg-hij").is_err());
        assert!(TokenService::validate_room_code("").is_err());
    }

    #[tokio::test]
    async fn request_token_validates_link_before_network() {
        let err = TokenService::request_token("http://127.0.0.1:9/token", "not a code", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn request_token_unreachable_endpoint() {
        let err = TokenService::request_token("http://127.0.0.1:9/token", "abc-defg-hij", Some("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Http(_)));
    }
}

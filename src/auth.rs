// ABOUTME: Authentication of inbound channel calls against a bot's credential pair
// ABOUTME: Verifies HS256 bearer tokens signed with the app secret and scoped to the app id

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use teambots_core::{AuthError, BotConfig};

type HmacSha256 = Hmac<Sha256>;

/// Clock skew tolerated when checking `exp`
const EXPIRY_LEEWAY_SECS: i64 = 300;

/// Who the channel call was authenticated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// App id the token was issued for; None for anonymous calls
    pub app_id: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { app_id: None }
    }

    pub fn is_anonymous(&self) -> bool {
        self.app_id.is_none()
    }
}

/// Authenticates the raw `Authorization` header of an inbound call
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, auth_header: Option<&str>) -> Result<Identity, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
}

/// Checks calls against one bot's `{app_id, app_secret}`.
///
/// A bot with no app id runs in anonymous mode, the way local emulator
/// sessions work: every call is accepted.
#[derive(Debug, Clone)]
pub struct CredentialAuthenticator {
    credentials: BotConfig,
}

impl CredentialAuthenticator {
    pub fn new(credentials: BotConfig) -> Self {
        Self { credentials }
    }

    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::MalformedToken("expected three segments".to_string()));
        };

        let signed = &token[..header.len() + 1 + payload.len()];
        let header: TokenHeader = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(AuthError::MalformedToken(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(self.credentials.app_secret.as_bytes())
            .map_err(|e| AuthError::MalformedToken(e.to_string()))?;
        mac.update(signed.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = decode_segment(payload)?;
        if claims.aud.as_deref() != Some(self.credentials.app_id.as_str()) {
            return Err(AuthError::AudienceMismatch { found: claims.aud });
        }
        if let Some(exp) = claims.exp {
            if exp + EXPIRY_LEEWAY_SECS < chrono::Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }

        Ok(Identity {
            app_id: Some(self.credentials.app_id.clone()),
        })
    }
}

#[async_trait]
impl Authenticator for CredentialAuthenticator {
    async fn authenticate(&self, auth_header: Option<&str>) -> Result<Identity, AuthError> {
        if self.credentials.is_anonymous() {
            return Ok(Identity::anonymous());
        }
        let header = auth_header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(AuthError::MissingHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::NotBearer)?;
        self.verify(token.trim())
    }
}

/// Issue a token the authenticator will accept for these credentials.
///
/// Used by local channel simulators and tests.
pub fn issue_token(credentials: &BotConfig, ttl: Duration) -> String {
    let now = chrono::Utc::now().timestamp();
    let header = TokenHeader {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };
    let claims = Claims {
        aud: Some(credentials.app_id.clone()),
        exp: Some(now + ttl.as_secs() as i64),
        iat: Some(now),
    };
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap_or_default());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
    let input = format!("{header}.{payload}");

    let signature = match HmacSha256::new_from_slice(credentials.app_secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(input.as_bytes());
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };
    format!("{input}.{signature}")
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> BotConfig {
        BotConfig::new("edu-app", "edu-secret")
    }

    #[tokio::test]
    async fn test_anonymous_mode_accepts_anything() {
        let auth = CredentialAuthenticator::new(BotConfig::default());
        let identity = auth.authenticate(None).await.unwrap();
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn test_valid_token_accepted() {
        let auth = CredentialAuthenticator::new(creds());
        let header = format!("Bearer {}", issue_token(&creds(), Duration::from_secs(60)));
        let identity = auth.authenticate(Some(&header)).await.unwrap();
        assert_eq!(identity.app_id.as_deref(), Some("edu-app"));
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let auth = CredentialAuthenticator::new(creds());
        assert_eq!(auth.authenticate(None).await, Err(AuthError::MissingHeader));
    }

    #[tokio::test]
    async fn test_non_bearer_rejected() {
        let auth = CredentialAuthenticator::new(creds());
        assert_eq!(
            auth.authenticate(Some("Basic abc")).await,
            Err(AuthError::NotBearer)
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let auth = CredentialAuthenticator::new(creds());
        let forged = issue_token(&BotConfig::new("edu-app", "other"), Duration::from_secs(60));
        assert_eq!(
            auth.authenticate(Some(&format!("Bearer {forged}"))).await,
            Err(AuthError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let auth = CredentialAuthenticator::new(creds());
        let token = issue_token(&BotConfig::new("other-app", "edu-secret"), Duration::from_secs(60));
        let result = auth.authenticate(Some(&format!("Bearer {token}"))).await;
        assert!(matches!(result, Err(AuthError::AudienceMismatch { .. })));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let auth = CredentialAuthenticator::new(creds());
        let result = auth.authenticate(Some("Bearer not-a-token")).await;
        assert!(matches!(result, Err(AuthError::MalformedToken(_))));
    }
}

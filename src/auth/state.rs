use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Default OAuth state token TTL (10 minutes)
pub const STATE_TTL_SECONDS: i64 = 600;

/// CSRF state carried through the OAuth redirect round-trip.
///
/// Field names serialize as camelCase so the payload stays readable to the
/// frontends that inspect it after base64 decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    pub timestamp_millis: i64,
    pub nonce: String,
}

impl OAuthState {
    pub fn new(platform: &str, user_id: Option<String>, return_url: Option<String>) -> Self {
        Self {
            user_id,
            platform: platform.to_string(),
            return_url,
            timestamp_millis: Utc::now().timestamp_millis(),
            nonce: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("state signing secret is not configured")]
    MissingSecret,
    #[error("state token is not in payload.signature format")]
    InvalidFormat,
    #[error("state token signature does not match")]
    InvalidSignature,
    #[error("state token payload could not be decoded: {0}")]
    Decode(String),
    #[error("state token has expired")]
    Expired,
}

/// Signs and verifies OAuth state tokens as `base64url(json).hex(hmac)`.
///
/// The signature covers the encoded payload, and verification rejects the
/// signature before ever decoding the payload, so tampered tokens fail
/// without touching the deserializer.
#[derive(Clone, Debug)]
pub struct StateCodec {
    secret: Vec<u8>,
    max_age_millis: i64,
}

impl StateCodec {
    pub fn new(secret: &str, max_age_seconds: i64) -> Result<Self, StateError> {
        if secret.is_empty() {
            return Err(StateError::MissingSecret);
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            max_age_millis: max_age_seconds * 1000,
        })
    }

    pub fn sign(&self, state: &OAuthState) -> Result<String, StateError> {
        let json = serde_json::to_string(state).map_err(|e| StateError::Decode(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());
        let signature = hex::encode(self.mac_for(&payload).finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn verify(&self, token: &str) -> Result<OAuthState, StateError> {
        let (payload, signature_hex) = token.split_once('.').ok_or(StateError::InvalidFormat)?;
        if payload.is_empty() || signature_hex.is_empty() {
            return Err(StateError::InvalidFormat);
        }

        let signature = hex::decode(signature_hex).map_err(|_| StateError::InvalidFormat)?;
        // Mac::verify_slice compares in constant time
        self.mac_for(payload)
            .verify_slice(&signature)
            .map_err(|_| StateError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| StateError::Decode(e.to_string()))?;
        let state: OAuthState =
            serde_json::from_slice(&json).map_err(|e| StateError::Decode(e.to_string()))?;

        let age = Utc::now().timestamp_millis() - state.timestamp_millis;
        if age > self.max_age_millis {
            return Err(StateError::Expired);
        }

        Ok(state)
    }

    fn mac_for(&self, payload: &str) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC key of any length");
        mac.update(payload.as_bytes());
        mac
    }
}

//! Invitation token signing.
//!
//! A token is `base64url(payload).base64url(mac)` where the payload is the
//! JSON claims `{ invitation_id, key, issued_at }` and the mac is
//! HMAC-SHA256 over the encoded payload. The embedded `key` ties the token
//! to one revision of the invitation, so tokens issued before an edit stop
//! verifying even though the signature is still valid.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use coterie_core::{CoterieError, Result};
use coterie_db::models::GroupInvitation;

type HmacSha256 = Hmac<Sha256>;

/// Claims embedded in a signed invitation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The invitation the token refers to.
    pub invitation_id: Uuid,
    /// The invitation revision the token was issued against.
    pub key: i64,
    /// Unix timestamp of issuance, for TTL enforcement.
    pub issued_at: i64,
}

/// Signs and verifies invitation tokens.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    /// Creates a signer with the given secret and token time-to-live in
    /// days.
    #[must_use]
    pub fn new(secret: Vec<u8>, ttl_days: i64) -> Self {
        Self {
            secret,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Generates a fresh random signing secret.
    #[must_use]
    pub fn generate_secret() -> Vec<u8> {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        secret.to_vec()
    }

    /// Signs a token for the invitation's current revision.
    pub fn sign(&self, invitation: &GroupInvitation) -> Result<String> {
        self.sign_at(invitation, Utc::now())
    }

    fn sign_at(&self, invitation: &GroupInvitation, now: DateTime<Utc>) -> Result<String> {
        let claims = TokenClaims {
            invitation_id: invitation.id,
            key: invitation.key,
            issued_at: now.timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| CoterieError::Internal(format!("failed to serialize claims: {e}")))?;
        let encoded = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{encoded}.{signature}"))
    }

    /// Verifies a token's signature and TTL, returning its claims.
    ///
    /// The claims are not checked against the database here; the caller
    /// resolves `invitation_id` and compares `key` against the stored row.
    pub fn unsign(&self, token: &str) -> Result<TokenClaims> {
        self.unsign_at(token, Utc::now())
    }

    fn unsign_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims> {
        let (encoded, signature) = token
            .split_once('.')
            .ok_or_else(|| CoterieError::TokenInvalid("malformed token".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CoterieError::TokenInvalid("malformed signature".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CoterieError::TokenInvalid("bad signature".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CoterieError::TokenInvalid("malformed payload".to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| CoterieError::TokenInvalid("malformed claims".to_string()))?;

        let expires_at = claims.issued_at + self.ttl.num_seconds();
        if now.timestamp() > expires_at {
            return Err(CoterieError::TokenInvalid("token expired".to_string()));
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CoterieError::Internal(format!("invalid signing secret: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coterie_db::models::GroupPermission;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret".to_vec(), 7)
    }

    fn invitation(key: i64) -> GroupInvitation {
        GroupInvitation {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            invited_by: Some(Uuid::new_v4()),
            email: "invitee@example.com".to_string(),
            permissions: GroupPermission::Member,
            message: String::new(),
            key,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sign_unsign_roundtrip() {
        let signer = signer();
        let invitation = invitation(3);
        let token = signer.sign(&invitation).unwrap();
        let claims = signer.unsign(&token).unwrap();
        assert_eq!(claims.invitation_id, invitation.id);
        assert_eq!(claims.key, 3);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let signer = signer();
        let token = signer.sign(&invitation(0)).unwrap();
        let (payload, sig) = token.split_once('.').unwrap();

        let other = signer.sign(&invitation(0)).unwrap();
        let (other_payload, _) = other.split_once('.').unwrap();
        assert_ne!(payload, other_payload);

        let forged = format!("{other_payload}.{sig}");
        let err = signer.unsign(&forged).unwrap_err();
        assert!(matches!(err, CoterieError::TokenInvalid(_)));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let signer = signer();
        let token = signer.sign(&invitation(0)).unwrap();
        let (payload, _) = token.split_once('.').unwrap();
        let forged = format!("{payload}.{}", URL_SAFE_NO_PAD.encode([0u8; 32]));
        let err = signer.unsign(&forged).unwrap_err();
        assert!(matches!(err, CoterieError::TokenInvalid(_)));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = signer().sign(&invitation(0)).unwrap();
        let other = TokenSigner::new(b"other-secret".to_vec(), 7);
        assert!(matches!(
            other.unsign(&token),
            Err(CoterieError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_expired_token_fails() {
        let signer = signer();
        let issued = Utc::now() - Duration::days(8);
        let token = signer.sign_at(&invitation(0), issued).unwrap();
        let err = signer.unsign(&token).unwrap_err();
        assert!(matches!(err, CoterieError::TokenInvalid(msg) if msg.contains("expired")));
    }

    #[test]
    fn test_token_within_ttl_verifies() {
        let signer = signer();
        let issued = Utc::now() - Duration::days(6);
        let token = signer.sign_at(&invitation(0), issued).unwrap();
        assert!(signer.unsign(&token).is_ok());
    }

    #[test]
    fn test_garbage_is_rejected_as_token_invalid() {
        let signer = signer();
        for garbage in ["", "no-dot", "a.b", "!!!.???"] {
            assert!(matches!(
                signer.unsign(garbage),
                Err(CoterieError::TokenInvalid(_))
            ));
        }
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(TokenSigner::generate_secret(), TokenSigner::generate_secret());
    }
}

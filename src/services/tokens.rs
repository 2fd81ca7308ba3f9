use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

use crate::models::{Claims, UserRole};

/// Fixed session lifetime; tokens expire naturally, there is no revoke path.
pub const SESSION_TTL_HOURS: i64 = 24;

const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generates a single-use opaque token (verification, password reset):
/// 256 bits from the system CSPRNG, hex-encoded to a fixed 64-char string.
pub fn generate_opaque_token(rng: &SystemRandom) -> Result<String> {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow!("failed to generate random token bytes"))?;
    Ok(hex::encode(bytes))
}

/// Mints and verifies HS256 session tokens against the process-wide secret.
#[derive(Clone)]
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a signed token embedding {user id, role, issued-at}, expiring
    /// 24 hours from issuance.
    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("failed to sign session token: {}", e))?;
        Ok((token, expires_at))
    }

    /// Verifies signature and expiry. Callers map any failure to a 401-class
    /// outcome without distinguishing invalid from expired.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_roundtrips_id_and_role() {
        let signer = SessionSigner::new("test-secret");
        let user_id = Uuid::new_v4();
        let (token, expires_at) = signer.issue(user_id, UserRole::User).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");
        assert_eq!(claims.exp, expires_at.timestamp() as usize);
        assert_eq!(claims.exp as i64 - claims.iat as i64, SESSION_TTL_HOURS * 3600);
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let signer = SessionSigner::new("test-secret");
        let past = Utc::now() - Duration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: "user".to_string(),
            iat: (past - Duration::hours(24)).timestamp() as usize,
            exp: past.timestamp() as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let signer = SessionSigner::new("test-secret");
        let other = SessionSigner::new("other-secret");
        let (token, _) = other.issue(Uuid::new_v4(), UserRole::User).unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn opaque_tokens_are_fixed_length_hex_and_distinct() {
        let rng = SystemRandom::new();
        let a = generate_opaque_token(&rng).unwrap();
        let b = generate_opaque_token(&rng).unwrap();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}

//! Signed, time-bound bearer tokens.
//!
//! Tokens are three base64url segments (`header.claims.mac`) signed with
//! HMAC-SHA256 under a process-wide secret. Verification is a pure
//! function of the secret and the input: it checks structure, signature
//! and expiry, and never consults the session registry.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_ALG: &str = "HS256";
const TOKEN_TYP: &str = "JWT";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs256() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        }
    }
}

/// Claims carried by a bearer token.
///
/// `sid` binds the token to the session that was created alongside it,
/// so authenticated calls can refresh the right session and "log out
/// other devices" knows which one to keep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.as_bytes())
        .map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Stateless issuer/verifier for bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: SecretString,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Mint a token asserting `account_id`, bound to `session_id` and
    /// expiring at `expires_at`.
    ///
    /// # Errors
    /// Returns an error if the claims fail to serialize or the signing
    /// key is unusable.
    pub fn issue(
        &self,
        account_id: Uuid,
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, Error> {
        let claims = Claims {
            sub: account_id,
            sid: session_id,
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };
        let signing_input = format!("{}.{}", b64e_json(&Header::hs256())?, b64e_json(&claims)?);

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::Key)?;
        mac.update(signing_input.as_bytes());
        let tag = mac.finalize().into_bytes();

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    /// Fails when the structure is malformed, the signature does not
    /// match, or the token is expired. No side effects on any path.
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(tag_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::TokenFormat);
        };

        let header: Header = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64.as_bytes())
            .map_err(|_| Error::Base64)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::Key)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        // Constant-time comparison via the Mac trait.
        mac.verify_slice(&tag).map_err(|_| Error::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.exp <= now.timestamp() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{Claims, Error, TokenIssuer};
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SecretString::from("test-signing-secret".to_string()))
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let issuer = issuer();
        let account = Uuid::new_v4();
        let session = Uuid::new_v4();
        let expires = Utc::now() + Duration::minutes(30);

        let token = issuer.issue(account, session, expires).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, account);
        assert_eq!(claims.sid, session);
        assert_eq!(claims.exp, expires.timestamp());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = issuer()
            .issue(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Utc::now() + Duration::minutes(5),
            )
            .unwrap();
        let other = TokenIssuer::new(SecretString::from("other-secret".to_string()));
        assert!(matches!(
            other.verify(&token),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn verify_rejects_tampered_claims() {
        let issuer = issuer();
        let token = issuer
            .issue(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Utc::now() + Duration::minutes(5),
            )
            .unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut claims: Claims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        claims.sub = Uuid::new_v4();
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());

        assert!(matches!(
            issuer.verify(&parts.join(".")),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn verify_rejects_expired() {
        let issuer = issuer();
        let token = issuer
            .issue(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Utc::now() - Duration::minutes(1),
            )
            .unwrap();
        assert!(matches!(issuer.verify(&token), Err(Error::Expired)));
    }

    #[test]
    fn verify_rejects_malformed_tokens() {
        let issuer = issuer();
        assert!(matches!(issuer.verify(""), Err(Error::TokenFormat)));
        assert!(matches!(issuer.verify("a.b"), Err(Error::TokenFormat)));
        assert!(matches!(issuer.verify("a.b.c.d"), Err(Error::TokenFormat)));
        assert!(issuer.verify("!!.!!.!!").is_err());
    }
}

use crate::schemas::Owner;
use actix_web::{dev::Payload, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Duration, Utc};
use futures::future::{ready, Ready};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    num::ParseIntError,
    sync::{Mutex, MutexGuard},
};
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

// Tokens stamped this far in the future are treated as forged
const CLOCK_SKEW_SECS: i64 = 300;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed session token")]
    Malformed,
    #[error("invalid session signature")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session was ended")]
    Revoked,
    #[error("sessions are not configured")]
    NotConfigured,
}

impl ResponseError for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SessionError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// An authenticated user, extracted from `Authorization: Bearer <token>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub owner: Owner,
    issued_at: i64,
    signature: Vec<u8>,
}

/// Signs and checks session tokens of the form `<owner>.<issued_at>.<hex mac>`.
/// The identity provider mints tokens with the same shared secret.
#[derive(Debug)]
pub struct SessionKeys {
    key: Vec<u8>,
    max_age: Duration,
    revoked: Mutex<HashMap<Vec<u8>, i64>>,
}

impl SessionKeys {
    pub fn new(secret: &str, max_age: Duration) -> SessionKeys {
        let mut sha256_hasher = Sha256::new();
        sha256_hasher.update(secret.as_bytes());
        SessionKeys {
            key: sha256_hasher.finalize().to_vec(),
            max_age,
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, owner: &str, issued_at: DateTime<Utc>) -> String {
        let issued_at = issued_at.timestamp();
        let signature = self
            .mac(owner, issued_at)
            .finalize()
            .into_bytes()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>();
        format!("{}.{}.{}", owner, issued_at, signature)
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        // Owners may contain dots, the last two fields never do
        let mut parts = token.rsplitn(3, '.');
        let (Some(signature), Some(issued_at), Some(owner)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SessionError::Malformed);
        };
        if owner.is_empty() {
            return Err(SessionError::Malformed);
        }
        let issued_at: i64 = issued_at.parse().map_err(|_| SessionError::Malformed)?;
        let signature = decode_hex(signature).ok_or(SessionError::Malformed)?;

        self.mac(owner, issued_at)
            .verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let now = now.timestamp();
        if issued_at > now + CLOCK_SKEW_SECS {
            return Err(SessionError::Malformed);
        }
        if now - issued_at > self.max_age.num_seconds() {
            return Err(SessionError::Expired);
        }
        if self.revoked().contains_key(&signature) {
            return Err(SessionError::Revoked);
        }
        Ok(Session {
            owner: owner.to_string(),
            issued_at,
            signature,
        })
    }

    /// Ends a session. The token stays rejected until it would have expired anyway.
    pub fn revoke(&self, session: &Session, now: DateTime<Utc>) {
        let oldest_live = now.timestamp() - self.max_age.num_seconds();
        let mut revoked = self.revoked();
        revoked.retain(|_, issued_at| *issued_at >= oldest_live);
        revoked.insert(session.signature.clone(), session.issued_at);
        info!("Ended session for {}", session.owner);
    }

    fn mac(&self, owner: &str, issued_at: i64) -> HmacSha256 {
        let content = format!("owner={}\nissued_at={}", owner, issued_at);
        let mut hmac_hasher = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        hmac_hasher.update(content.as_bytes());
        hmac_hasher
    }

    fn revoked(&self) -> MutexGuard<'_, HashMap<Vec<u8>, i64>> {
        self.revoked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("zz"), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()
}

fn authenticate(request: &HttpRequest) -> Result<Session, SessionError> {
    let keys = request
        .app_data::<web::Data<SessionKeys>>()
        .ok_or(SessionError::NotConfigured)?;
    let token = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(SessionError::Missing)?;
    keys.verify(token.trim(), Utc::now()).map_err(|err| {
        warn!("Rejected session token: {}", err);
        err
    })
}

impl FromRequest for Session {
    type Error = SessionError;
    type Future = Ready<Result<Session, SessionError>>;

    fn from_request(request: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn keys() -> SessionKeys {
        SessionKeys::new("correct horse battery staple", Duration::hours(1))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let keys = keys();
        let token = keys.issue("ana@example.com", noon());
        let session = keys.verify(&token, noon() + Duration::minutes(5)).unwrap();
        assert_eq!(session.owner, "ana@example.com");
    }

    #[test]
    fn tampered_owner_is_rejected() {
        let keys = keys();
        let token = keys.issue("ana", noon());
        let forged = token.replacen("ana", "bruno", 1);
        assert_eq!(keys.verify(&forged, noon()), Err(SessionError::BadSignature));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let other = SessionKeys::new("something else", Duration::hours(1));
        let token = other.issue("ana", noon());
        assert_eq!(keys().verify(&token, noon()), Err(SessionError::BadSignature));
    }

    #[test]
    fn old_tokens_expire() {
        let keys = keys();
        let token = keys.issue("ana", noon());
        assert_eq!(keys.verify(&token, noon() + Duration::hours(2)), Err(SessionError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = keys();
        for token in ["", "ana", "ana.123", ".123.abcd", "ana.noon.abcd", "ana.123.xyz"] {
            assert_eq!(keys.verify(token, noon()), Err(SessionError::Malformed), "{}", token);
        }
    }

    #[test]
    fn logout_revokes_only_that_token() {
        let keys = keys();
        let first = keys.issue("ana", noon());
        let second = keys.issue("ana", noon() + Duration::seconds(1));
        let session = keys.verify(&first, noon()).unwrap();
        keys.revoke(&session, noon());

        assert_eq!(keys.verify(&first, noon()), Err(SessionError::Revoked));
        assert!(keys.verify(&second, noon() + Duration::seconds(2)).is_ok());
    }
}

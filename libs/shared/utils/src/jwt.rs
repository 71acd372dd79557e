use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthenticatedCaller, CallerIdentity, JwtClaims, JwtHeader, Role};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("JWT secret is not set")]
    SecretNotConfigured,

    #[error("Invalid token format")]
    Malformed,

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid claims format")]
    InvalidClaims,

    #[error("Token expired")]
    Expired,

    #[error("Token subject is not a valid identity")]
    InvalidSubject,

    #[error("Token does not carry a patient or doctor role")]
    UnknownRole,
}

/// Resolves a bearer token into exactly one caller identity.
///
/// The token must be an HS256 JWT signed with `jwt_secret`, carry a UUID
/// `sub`, a `role` of `patient` or `doctor`, and (if present) an `exp`
/// that is not before `now`.
pub fn validate_token(
    token: &str,
    jwt_secret: &str,
    now: DateTime<Utc>,
) -> Result<AuthenticatedCaller, AuthError> {
    if jwt_secret.is_empty() {
        return Err(AuthError::SecretNotConfigured);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Malformed);
    }

    let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let header: JwtHeader = decode_segment(header_b64).ok_or(AuthError::Malformed)?;
    if header.alg != "HS256" {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        AuthError::InvalidSignature
    })?;

    let mut mac =
        HmacSha256::new_from_slice(jwt_secret.as_bytes()).map_err(|_| AuthError::SecretNotConfigured)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(AuthError::InvalidSignature);
    }

    let claims: JwtClaims = decode_segment(claims_b64).ok_or(AuthError::InvalidClaims)?;

    if let Some(exp) = claims.exp {
        if exp < now.timestamp() {
            debug!("Token expired at {} (now: {})", exp, now.timestamp());
            return Err(AuthError::Expired);
        }
    }

    let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)?;
    let role = claims
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or(AuthError::UnknownRole)?;

    let caller = AuthenticatedCaller {
        identity: CallerIdentity::new(role, id),
        email: claims.email,
        issued_at: claims.iat.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
    };

    debug!("Token validated for {} {}", role, id);
    Ok(caller)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

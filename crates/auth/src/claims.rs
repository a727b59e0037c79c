use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use duka_core::UserId;

use crate::Role;

/// JWT claims model.
///
/// This is the minimal set of claims Duka expects from the identity provider:
/// who the actor is and which roles they hold. Timestamps use the registered
/// `iat`/`exp` claim names encoded as seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / acting user.
    pub sub: UserId,

    /// RBAC roles granted to the subject.
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or unverifiable token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims against `now`.
///
/// Signature verification happens in [`crate::jwt`]; this checks the time window
/// only so it can be exercised with a fixed clock.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims_at(issued: DateTime<Utc>, ttl_minutes: i64) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            roles: vec![Role::STAFF],
            issued_at: issued,
            expires_at: issued + Duration::minutes(ttl_minutes),
        }
    }

    #[test]
    fn accepts_claims_inside_window() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let claims = claims_at(issued, 10);
        assert_eq!(validate_claims(&claims, issued + Duration::minutes(5)), Ok(()));
    }

    #[test]
    fn rejects_expired_and_future_tokens() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let claims = claims_at(issued, 10);
        assert_eq!(
            validate_claims(&claims, issued + Duration::minutes(10)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, issued - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_inverted_window() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let claims = claims_at(issued, -1);
        assert_eq!(
            validate_claims(&claims, issued),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn timestamps_use_registered_claim_names() {
        let issued = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let json = serde_json::to_value(claims_at(issued, 1)).unwrap();
        assert_eq!(json["iat"], issued.timestamp());
        assert_eq!(json["exp"], issued.timestamp() + 60);
    }
}

//! Session token verification
//!
//! Sessions are HS256 tokens carrying the principal id and, optionally, a
//! role claim. Tokens are read from `Authorization: Bearer` first and from
//! the session cookie second.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secureaware_config::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::roles::Role;

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Principal id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role at the time the token was minted; may be stale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl SessionClaims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    /// Role claim, if present and a known role
    pub fn role_claim(&self) -> Option<Role> {
        self.role.as_deref().and_then(Role::parse)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    /// Age of the token at `now`; `None` when `iat` is unreadable
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.issued_at().map(|issued| now - issued)
    }
}

/// Mints and verifies session tokens
pub struct SessionVerifier {
    config: SessionConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionVerifier {
    pub fn new(config: SessionConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Mint a token for `user_id` valid from now
    pub fn issue(
        &self,
        user_id: &str,
        email: Option<&str>,
        role: Option<Role>,
    ) -> Result<String, SessionError> {
        self.issue_at(user_id, email, role, Utc::now())
    }

    /// Mint a token as if it had been issued at `issued_at`
    pub fn issue_at(
        &self,
        user_id: &str,
        email: Option<&str>,
        role: Option<Role>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let lifetime = Duration::from_std(self.config.token_expiry).map_err(|e| {
            SessionError::Encoding {
                message: format!("token expiry out of range: {}", e),
            }
        })?;
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .ok_or_else(|| SessionError::Encoding {
                message: "token expiry overflows the calendar".to_string(),
            })?;

        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            role: role.map(|r| r.as_str().to_string()),
            sid: Some(uuid::Uuid::new_v4().to_string()),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            SessionError::Encoding {
                message: e.to_string(),
            }
        })
    }

    /// Verify signature, issuer, audience and expiry
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid {
                    message: e.to_string(),
                },
            })
    }

    /// Pull the raw token out of the request headers
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }

        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.config.cookie_name && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }

    /// Verified claims for the request, or `None` when unauthenticated
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<SessionClaims, SessionError> {
        let token = self.extract_token(headers).ok_or(SessionError::Missing)?;
        let claims = self.verify(&token)?;
        debug!("Session verified for principal {}", claims.sub);
        Ok(claims)
    }

    /// Like [`authenticate`](Self::authenticate) but logs and discards the failure reason
    pub fn claims_from_headers(&self, headers: &HeaderMap) -> Option<SessionClaims> {
        match self.authenticate(headers) {
            Ok(claims) => Some(claims),
            Err(SessionError::Missing) => None,
            Err(e) => {
                warn!("Rejecting session token: {}", e);
                None
            }
        }
    }
}

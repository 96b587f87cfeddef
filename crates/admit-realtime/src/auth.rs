//! Join authorization.
//!
//! Under the `open` policy any connection may join any room. Under the
//! `authenticated` policy the handshake carries a JWT and a connection may
//! only join the rooms of the identity inside it; admins may join anything.

use crate::error::{RealtimeError, RealtimeResult};
use crate::protocol::JoinRequest;
use crate::room::Role;
use admit_config::{JoinPolicy, SecurityConfig};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// The authenticated party behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    /// `None` for ordinary users.
    pub role: Option<Role>,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Decides whether a connection may perform a join.
pub trait JoinAuthorizer: Send + Sync {
    fn authorize(&self, identity: Option<&Identity>, request: &JoinRequest) -> RealtimeResult<()>;

    /// Whether the handshake must present a token.
    fn requires_identity(&self) -> bool;
}

/// Permits every join.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenJoins;

impl JoinAuthorizer for OpenJoins {
    fn authorize(&self, _identity: Option<&Identity>, _request: &JoinRequest) -> RealtimeResult<()> {
        Ok(())
    }

    fn requires_identity(&self) -> bool {
        false
    }
}

/// Permits joins that match the connection's identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionJoins;

impl JoinAuthorizer for SessionJoins {
    fn authorize(&self, identity: Option<&Identity>, request: &JoinRequest) -> RealtimeResult<()> {
        let identity = identity
            .ok_or_else(|| RealtimeError::Unauthorized("Connection is not authenticated".to_string()))?;

        if identity.is_admin() {
            return Ok(());
        }

        let role_matches = request.role().map_or(true, |role| identity.role == Some(role));
        let subject_matches = request
            .subject()
            .map_or(false, |subject| subject == identity.user_id);

        if role_matches && subject_matches {
            Ok(())
        } else {
            Err(RealtimeError::Forbidden(format!(
                "User {} may not join {:?}",
                identity.user_id, request
            )))
        }
    }

    fn requires_identity(&self) -> bool {
        true
    }
}

/// Authorizer for a configured policy.
#[must_use]
pub fn authorizer_for(policy: JoinPolicy) -> Arc<dyn JoinAuthorizer> {
    match policy {
        JoinPolicy::Open => Arc::new(OpenJoins),
        JoinPolicy::Authenticated => Arc::new(SessionJoins),
    }
}

/// Claims carried by a realtime handshake token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Role name, if the user has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Verifies handshake tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(config: &SecurityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_audience(&[&config.jwt_audience]);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            validation,
        }
    }

    /// Validates `token` and returns the identity inside it.
    pub fn verify(&self, token: &str) -> RealtimeResult<Identity> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            warn!("Handshake token validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    RealtimeError::Unauthorized("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    RealtimeError::Unauthorized("Invalid token issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    RealtimeError::Unauthorized("Invalid token audience".to_string())
                }
                _ => RealtimeError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        let claims = data.claims;
        let role = match claims.role.as_deref() {
            None | Some("" | "student" | "user") => None,
            Some(name) => Some(Role::parse(name).ok_or_else(|| {
                RealtimeError::Unauthorized(format!("Unknown role: {}", name))
            })?),
        };

        Ok(Identity {
            user_id: claims.sub,
            role,
        })
    }

    /// Issues a token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: &str, role: Option<Role>, ttl: Duration) -> RealtimeResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.map(|r| r.to_string()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| RealtimeError::Unauthorized(format!("Failed to issue token: {}", e)))?;

        debug!("Issued realtime token for user {}", user_id);
        Ok(token)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

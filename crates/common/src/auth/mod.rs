//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - User role lookup
//! - The [`AuthContext`] extractor used by protected handlers

use crate::errors::{AppError, Result};
use crate::store::Store;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "user")]
    User,
}

/// A known user and their role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user
    pub user_id: String,

    /// Role looked up from the user store
    pub role: Role,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the admin role, returning error if absent
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin privileges required."))
        }
    }

    /// Owners act on their own records; admins on anyone's
    pub fn can_act_for(&self, owner_id: &str) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => "token expired".to_string(),
                    other => format!("invalid token: {:?}", other),
                };
                AppError::Unauthenticated { reason }
            })
    }
}

/// Extract the bearer token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves a bearer token to an [`AuthContext`]
#[derive(Clone)]
pub struct Authenticator {
    jwt: Arc<JwtManager>,
    store: Arc<dyn Store>,
}

impl Authenticator {
    pub fn new(jwt: Arc<JwtManager>, store: Arc<dyn Store>) -> Self {
        Self { jwt, store }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Authenticate a request. Every failure is the same 401 to the caller;
    /// the reason only reaches the logs.
    pub async fn authenticate(
        &self,
        auth_header: Option<&str>,
        request_id: String,
    ) -> Result<AuthContext> {
        let header = auth_header.ok_or_else(|| AppError::Unauthenticated {
            reason: "missing Authorization header".to_string(),
        })?;
        let token = extract_bearer(header).ok_or_else(|| AppError::Unauthenticated {
            reason: "malformed Authorization header".to_string(),
        })?;

        let claims = self.jwt.validate_token(token)?;

        let identity = self
            .store
            .find_identity(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "User lookup failed during authentication");
                AppError::Unauthenticated {
                    reason: "user lookup failed".to_string(),
                }
            })?
            .ok_or_else(|| AppError::Unauthenticated {
                reason: format!("unknown user {}", claims.sub),
            })?;

        Ok(AuthContext {
            user_id: identity.user_id,
            role: identity.role,
            request_id,
        })
    }
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    Authenticator: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let authenticator = Authenticator::from_ref(state);

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        authenticator
            .authenticate(auth_header.as_deref(), request_id)
            .await
    }
}

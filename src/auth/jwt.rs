//! JWT verification for caller identity
//!
//! The identity provider mints HS256 tokens; this service only verifies
//! them and extracts the subject identity and profile claims. No token
//! issuance lives here.
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - In production, JWT_SECRET must be a strong random value from environment

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::types::LedgerError;

/// Payload expected in identity-provider tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// External subject identifier
    pub sub: String,
    /// User email
    #[serde(default)]
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// The caller's resolved identity: stable subject id plus profile claims
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub subject_id: String,
    pub email: String,
    pub display_name: String,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenValidationResult {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// JWT validator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String) -> Result<Self, LedgerError> {
        if secret.is_empty() {
            return Err(LedgerError::Internal(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(LedgerError::Internal(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self { secret })
    }

    /// Create a validator for dev mode
    pub fn new_dev() -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
        }
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenValidationResult::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenValidationResult::invalid(error_msg)
            }
        }
    }

    /// Resolve the caller's identity from an Authorization header.
    ///
    /// Missing or invalid token yields `Unauthenticated`; a valid token
    /// with an empty subject yields `IdentityUnresolved`.
    pub fn resolve_caller(
        &self,
        auth_header: Option<&str>,
    ) -> Result<ResolvedIdentity, LedgerError> {
        let token = extract_token_from_header(auth_header)
            .ok_or_else(|| LedgerError::Unauthenticated("Missing bearer token".into()))?;

        let result = self.verify_token(token);
        let claims = match result.claims {
            Some(c) if result.valid => c,
            _ => {
                return Err(LedgerError::Unauthenticated(
                    result.error.unwrap_or_else(|| "Invalid token".into()),
                ))
            }
        };

        if claims.sub.trim().is_empty() {
            return Err(LedgerError::IdentityUnresolved(
                "Token carries no subject identifier".into(),
            ));
        }

        Ok(ResolvedIdentity {
            subject_id: claims.sub,
            email: claims.email,
            display_name: claims.name,
        })
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    // Support "Bearer <token>" format
    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    // Also support raw token (for flexibility)
    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

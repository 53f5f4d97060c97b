//! Error taxonomy for the engagement ledger

use hyper::StatusCode;

/// Which half of a paired two-document write is being described
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteHalf {
    /// The mutation on the user document (relation sets, quota, rewards)
    User,
    /// The mutation on the idea document (views/likes counters)
    Idea,
}

impl std::fmt::Display for WriteHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Idea => write!(f, "idea"),
        }
    }
}

/// Main error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Identity unresolved: {0}")]
    IdentityUnresolved(String),

    #[error("Idea not found: {0}")]
    IdeaNotFound(String),

    #[error("View quota exceeded")]
    QuotaExceeded,

    #[error("Idea already liked: {0}")]
    AlreadyLiked(String),

    #[error("Idea not liked: {0}")]
    NotLiked(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// First half of a paired write committed, second half failed.
    /// The committed half stands; reconciliation can repair the drift.
    #[error("Partial update in {operation}: {committed} half committed, {failed} half failed: {cause}")]
    PartialUpdate {
        operation: &'static str,
        committed: WriteHalf,
        failed: WriteHalf,
        cause: String,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::IdentityUnresolved(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::IdeaNotFound(_) => StatusCode::NOT_FOUND,
            Self::QuotaExceeded => StatusCode::FORBIDDEN,
            Self::AlreadyLiked(_) => StatusCode::CONFLICT,
            Self::NotLiked(_) => StatusCode::CONFLICT,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PartialUpdate { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::IdentityUnresolved(_) => "IDENTITY_UNRESOLVED",
            Self::IdeaNotFound(_) => "IDEA_NOT_FOUND",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::AlreadyLiked(_) => "ALREADY_LIKED",
            Self::NotLiked(_) => "NOT_LIKED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::PartialUpdate { .. } => "PARTIAL_UPDATE",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for LedgerError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for LedgerError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for LedgerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthenticated(format!("JWT error: {}", err))
    }
}

impl From<bson::ser::Error> for LedgerError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encode error: {}", err))
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

//! Configuration for tally
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Default free-view quota granted to newly provisioned non-premium users
pub const DEFAULT_FREE_VIEW_QUOTA: i64 = 6;

/// tally - engagement ledger service
///
/// Tracks view quotas, like/save relation sets and reward points for
/// authenticated users, keeping denormalized idea counters in lock-step.
#[derive(Parser, Debug, Clone)]
#[command(name = "tally")]
#[command(about = "Engagement ledger service for the idea marketplace")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store fallback, default JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "tally")]
    pub mongodb_db: String,

    /// JWT secret for token verification (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Free views granted to a newly provisioned non-premium user
    #[arg(long, env = "FREE_VIEW_QUOTA", default_value_t = DEFAULT_FREE_VIEW_QUOTA)]
    pub free_view_quota: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        if self.dev_mode {
            Some(
                self.jwt_secret
                    .clone()
                    .unwrap_or_else(|| "dev-mode-secret-not-for-production-use-123456".to_string()),
            )
        } else {
            self.jwt_secret.clone()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                _ => {}
            }
        }

        if self.free_view_quota < 0 {
            return Err("FREE_VIEW_QUOTA must not be negative".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            node_id: Uuid::new_v4(),
            listen: "127.0.0.1:8080".parse().unwrap(),
            dev_mode: false,
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: "tally".into(),
            jwt_secret: Some("a-production-secret-of-at-least-32-chars".into()),
            free_view_quota: DEFAULT_FREE_VIEW_QUOTA,
            log_level: "info".into(),
        }
    }

    #[test]
    fn test_valid_production_config() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let mut args = base_args();
        args.jwt_secret = None;
        assert!(args.validate().is_err());

        args.jwt_secret = Some("short".into());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_dev_mode_allows_missing_secret() {
        let mut args = base_args();
        args.dev_mode = true;
        args.jwt_secret = None;
        assert!(args.validate().is_ok());
        assert!(args.jwt_secret().is_some());
    }

    #[test]
    fn test_negative_quota_rejected() {
        let mut args = base_args();
        args.free_view_quota = -1;
        assert!(args.validate().is_err());
    }
}

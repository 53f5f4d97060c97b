//! Document metadata shared by the users and ideas collections
//!
//! The ledger filters `is_deleted` on every read (a soft-deleted idea
//! does not exist as far as views, likes and saves are concerned) and
//! bumps `updated_at` on every mutation. Deletion itself is owned by
//! the admin subsystem; this service never sets `is_deleted` or
//! `deleted_at`, it only honors them.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle metadata embedded in every stored document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    /// When the document was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    /// When the document was last mutated by any subsystem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    /// Soft-delete flag, written by the admin subsystem
    #[serde(default)]
    pub is_deleted: bool,

    /// When the document was soft-deleted, if ever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,
}

impl Metadata {
    /// Metadata for a freshly provisioned document
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            created_at: Some(now),
            updated_at: Some(now),
            is_deleted: false,
            deleted_at: None,
        }
    }

    /// Record a mutation
    pub fn touch(&mut self) {
        self.updated_at = Some(DateTime::now());
    }
}

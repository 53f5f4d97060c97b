//! User document schema
//!
//! One record per external subject: quota state, reward ledger, and the
//! idea relation sets. Created lazily on first authenticated contact and
//! never deleted by this service.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Subscription tier for a user
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
}

/// A reward earned by a user. Immutable once earned except for the
/// `redeemed` flag; redemption lives outside this service.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RewardDoc {
    /// Unique reward identifier
    pub id: String,

    /// Reward kind ("points" for everything this service awards)
    pub kind: String,

    /// Human-readable reward title
    pub title: String,

    /// Point value of the reward
    pub value: i64,

    /// When the reward was earned
    pub earned_at: DateTime,

    /// Whether the reward has been redeemed
    #[serde(default)]
    pub redeemed: bool,
}

impl RewardDoc {
    /// Create a points reward
    pub fn points(title: impl Into<String>, value: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "points".to_string(),
            title: title.into(),
            value,
            earned_at: DateTime::now(),
            redeemed: false,
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// External subject identifier from the identity provider.
    /// Unique, immutable after creation.
    pub subject_id: String,

    /// Email provisioned from identity claims on first sight
    pub email: String,

    /// Display name provisioned from identity claims on first sight
    #[serde(default)]
    pub display_name: String,

    /// Free content views remaining (ignored when premium)
    #[serde(default)]
    pub views_remaining: i64,

    /// Whether the user has a premium subscription
    #[serde(default)]
    pub is_premium: bool,

    /// Subscription tier (free, basic, premium)
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,

    /// When the subscription expires, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expiry: Option<DateTime>,

    /// Reward point balance; monotonically non-decreasing here
    #[serde(default)]
    pub reward_points: i64,

    /// Reward ledger; append-only from this service's perspective
    #[serde(default)]
    pub rewards: Vec<RewardDoc>,

    /// Saved idea references, duplicate-free, append = most recent
    #[serde(default)]
    pub saved_idea_ids: Vec<String>,

    /// Liked idea references; each membership corresponds to one unit
    /// of the idea's `likes` counter
    #[serde(default)]
    pub liked_idea_ids: Vec<String>,

    /// Viewed idea references, deduplicated
    #[serde(default)]
    pub viewed_idea_ids: Vec<String>,

    /// Shared idea references
    #[serde(default)]
    pub shared_idea_ids: Vec<String>,
}

impl UserDoc {
    /// Create a new user document from identity claims
    pub fn provision(
        subject_id: String,
        email: String,
        display_name: String,
        free_view_quota: i64,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            subject_id,
            email,
            display_name,
            views_remaining: free_view_quota,
            is_premium: false,
            subscription_tier: SubscriptionTier::Free,
            subscription_expiry: None,
            reward_points: 0,
            rewards: Vec::new(),
            saved_idea_ids: Vec::new(),
            liked_idea_ids: Vec::new(),
            viewed_idea_ids: Vec::new(),
            shared_idea_ids: Vec::new(),
        }
    }

    /// Whether this user can consume another free view
    pub fn can_consume_view(&self) -> bool {
        self.is_premium || self.views_remaining > 0
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on subject_id: the store-level enforcement
            // that concurrent first-contact provisioning creates at most
            // one record per subject
            (
                doc! { "subject_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("subject_id_unique".to_string())
                        .build(),
                ),
            ),
            // Index on liked_idea_ids for reconciliation counts
            (
                doc! { "liked_idea_ids": 1 },
                Some(
                    IndexOptions::builder()
                        .name("liked_idea_ids_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

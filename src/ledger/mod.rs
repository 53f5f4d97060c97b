//! Engagement ledger
//!
//! The only component allowed to pair user-side and idea-side writes.
//! Every multi-entity mutation is two sequential single-document atomic
//! operations, user half first: the relation sets on user documents are
//! the source of truth from which the idea counters are derivable, so a
//! failure between the halves leaves a state reconciliation can repair.
//!
//! There is no application-level locking and no in-process counter
//! caching; check-then-act is pushed into the store's conditional
//! filters (`views_remaining > 0`, set membership).

pub mod rewards;

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::ResolvedIdentity;
use crate::db::schemas::UserDoc;
use crate::store::{CounterField, IdeaStore, RelationSet, SetOp, UserStore};
use crate::types::{LedgerError, Result, WriteHalf};

/// Result of a view consumption, carrying authoritative store values
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReceipt {
    pub success: bool,
    pub idea_id: String,
    /// Post-decrement quota (unchanged for premium users)
    pub views_remaining: i64,
    /// The idea's view counter after this consumption
    pub idea_views: i64,
}

/// Result of a like or unlike
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeReceipt {
    pub success: bool,
    pub idea_id: String,
    /// Whether the caller now likes the idea
    pub liked: bool,
    /// The idea's like counter after the toggle
    pub likes_total: i64,
    /// The caller's reward point balance after the toggle
    pub reward_points: i64,
}

/// Result of a save or unsave
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub success: bool,
    pub idea_id: String,
    /// Whether the caller now has the idea saved
    pub saved: bool,
    /// Whether this call changed the set (repeat saves are no-ops)
    pub changed: bool,
}

/// Result of a likes reconciliation pass for one idea
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub idea_id: String,
    /// Counter value found on the idea document
    pub stored_likes: i64,
    /// Like count derived from user documents
    pub derived_likes: i64,
    /// Whether the counter was rewritten to the derived value
    pub repaired: bool,
}

/// Orchestrates user provisioning, quota, like/save toggles, rewards
/// and reconciliation over the two stores
pub struct EngagementLedger {
    users: Arc<dyn UserStore>,
    ideas: Arc<dyn IdeaStore>,
    free_view_quota: i64,
}

impl EngagementLedger {
    pub fn new(users: Arc<dyn UserStore>, ideas: Arc<dyn IdeaStore>, free_view_quota: i64) -> Self {
        Self {
            users,
            ideas,
            free_view_quota,
        }
    }

    /// Load or lazily provision the caller's user record.
    ///
    /// An existing record is returned unchanged; profile fields are
    /// never overwritten after first sight. First contact requires a
    /// non-empty email claim, otherwise `IdentityUnresolved`.
    pub async fn ensure_user(&self, identity: &ResolvedIdentity) -> Result<UserDoc> {
        if identity.subject_id.trim().is_empty() {
            return Err(LedgerError::IdentityUnresolved(
                "Empty subject identifier".into(),
            ));
        }

        if let Some(user) = self.users.find_user(&identity.subject_id).await? {
            return Ok(user);
        }

        if identity.email.trim().is_empty() {
            return Err(LedgerError::IdentityUnresolved(format!(
                "No email claim for first contact of {}",
                identity.subject_id
            )));
        }

        let user = UserDoc::provision(
            identity.subject_id.clone(),
            identity.email.clone(),
            identity.display_name.clone(),
            self.free_view_quota,
        );

        // Concurrent first contacts race on the unique subject_id
        // index; losers get the winner's record back.
        let created = self.users.create_user_if_absent(user).await?;
        info!("Provisioned user {}", created.subject_id);
        Ok(created)
    }

    /// Advisory pre-check; the authoritative gate is the conditional
    /// quota filter inside `consume_view`
    pub fn can_consume_view(&self, user: &UserDoc) -> bool {
        user.can_consume_view()
    }

    /// Consume one view of an idea.
    ///
    /// Non-premium quota is decremented behind a `views_remaining > 0`
    /// filter, so concurrent calls cannot drive it negative; the losers
    /// fail with `QuotaExceeded`. The viewed set is deduplicated but the
    /// quota is charged on every call, repeat views included.
    pub async fn consume_view(&self, subject_id: &str, idea_id: &str) -> Result<ViewReceipt> {
        if !self.ideas.idea_exists(idea_id).await? {
            return Err(LedgerError::IdeaNotFound(idea_id.to_string()));
        }

        let user = self.load_user(subject_id).await?;
        let consume_quota = !user.is_premium;

        // User half: conditional decrement + viewed-set membership
        let updated = self
            .users
            .record_view(subject_id, idea_id, consume_quota)
            .await?
            .ok_or(LedgerError::QuotaExceeded)?;

        // Idea half: unconditional view counter increment
        let idea_views = self.idea_counter_half("view", idea_id, CounterField::Views, 1).await?;

        Ok(ViewReceipt {
            success: true,
            idea_id: idea_id.to_string(),
            views_remaining: updated.views_remaining,
            idea_views,
        })
    }

    /// Like an idea: transition-only semantics. A repeat like is an
    /// explicit `AlreadyLiked` conflict, never a silent success.
    /// Awards one reward point and appends one reward record.
    pub async fn like(&self, subject_id: &str, idea_id: &str) -> Result<LikeReceipt> {
        if !self.ideas.idea_exists(idea_id).await? {
            return Err(LedgerError::IdeaNotFound(idea_id.to_string()));
        }

        let reward = rewards::reward_for("idea_like")
            .ok_or_else(|| LedgerError::Internal("No reward configured for idea_like".into()))?;

        // User half: membership, points and reward in one conditional
        // atomic update
        let updated = self
            .users
            .like_once(subject_id, idea_id, reward)
            .await?
            .ok_or_else(|| LedgerError::AlreadyLiked(idea_id.to_string()))?;

        // Idea half: likes counter moves in lock-step with membership
        let likes_total = self.idea_counter_half("like", idea_id, CounterField::Likes, 1).await?;

        Ok(LikeReceipt {
            success: true,
            idea_id: idea_id.to_string(),
            liked: true,
            likes_total,
            reward_points: updated.reward_points,
        })
    }

    /// Unlike an idea. `NotLiked` when the caller never liked it.
    /// Reward points are not revoked.
    pub async fn unlike(&self, subject_id: &str, idea_id: &str) -> Result<LikeReceipt> {
        if !self.ideas.idea_exists(idea_id).await? {
            return Err(LedgerError::IdeaNotFound(idea_id.to_string()));
        }

        let updated = self
            .users
            .unlike_once(subject_id, idea_id)
            .await?
            .ok_or_else(|| LedgerError::NotLiked(idea_id.to_string()))?;

        let likes_total = self
            .idea_counter_half("unlike", idea_id, CounterField::Likes, -1)
            .await?;

        Ok(LikeReceipt {
            success: true,
            idea_id: idea_id.to_string(),
            liked: false,
            likes_total,
            reward_points: updated.reward_points,
        })
    }

    /// Save an idea: set-membership semantics, so saving an already
    /// saved idea is a no-op success. No counter, no reward.
    pub async fn save(&self, subject_id: &str, idea_id: &str) -> Result<SaveReceipt> {
        self.mutate_saved(subject_id, idea_id, SetOp::Add).await
    }

    /// Unsave an idea. Removing a non-member is a no-op success.
    pub async fn unsave(&self, subject_id: &str, idea_id: &str) -> Result<SaveReceipt> {
        self.mutate_saved(subject_id, idea_id, SetOp::Remove).await
    }

    async fn mutate_saved(
        &self,
        subject_id: &str,
        idea_id: &str,
        op: SetOp,
    ) -> Result<SaveReceipt> {
        if !self.ideas.idea_exists(idea_id).await? {
            return Err(LedgerError::IdeaNotFound(idea_id.to_string()));
        }

        let write = self
            .users
            .mutate_user_set(subject_id, RelationSet::Saved, op, idea_id)
            .await?;

        Ok(SaveReceipt {
            success: true,
            idea_id: idea_id.to_string(),
            saved: write.user.saved_idea_ids.iter().any(|id| id == idea_id),
            changed: write.changed,
        })
    }

    /// Recompute an idea's `likes` counter from the user documents and
    /// repair it when it has drifted (after a partial update, for
    /// example). Returns what was found and whether a repair happened.
    pub async fn reconcile_idea_likes(&self, idea_id: &str) -> Result<ReconcileReport> {
        let idea = self
            .ideas
            .find_idea(idea_id)
            .await?
            .ok_or_else(|| LedgerError::IdeaNotFound(idea_id.to_string()))?;

        let derived = self.users.count_likers(idea_id).await? as i64;
        let stored = idea.likes;

        if derived == stored {
            return Ok(ReconcileReport {
                idea_id: idea_id.to_string(),
                stored_likes: stored,
                derived_likes: derived,
                repaired: false,
            });
        }

        info!(
            "Reconciling likes for {}: stored {} derived {}",
            idea_id, stored, derived
        );

        self.ideas
            .set_counter(idea_id, CounterField::Likes, derived)
            .await?
            .ok_or_else(|| LedgerError::IdeaNotFound(idea_id.to_string()))?;

        Ok(ReconcileReport {
            idea_id: idea_id.to_string(),
            stored_likes: stored,
            derived_likes: derived,
            repaired: true,
        })
    }

    /// Execute the idea half of a paired write. The user half has
    /// already committed, so any failure here is a `PartialUpdate`,
    /// logged with which half failed.
    async fn idea_counter_half(
        &self,
        operation: &'static str,
        idea_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<i64> {
        let outcome = self.ideas.increment_counter(idea_id, field, delta).await;

        let cause = match outcome {
            Ok(Some(new_value)) => return Ok(new_value),
            Ok(None) => format!("idea {} disappeared mid-operation", idea_id),
            Err(e) => e.to_string(),
        };

        error!(
            "Partial update in {}: user half committed, idea half failed for {}: {}",
            operation, idea_id, cause
        );

        Err(LedgerError::PartialUpdate {
            operation,
            committed: WriteHalf::User,
            failed: WriteHalf::Idea,
            cause,
        })
    }

    async fn load_user(&self, subject_id: &str) -> Result<UserDoc> {
        self.users.find_user(subject_id).await?.ok_or_else(|| {
            LedgerError::Internal(format!("User {} not provisioned", subject_id))
        })
    }
}

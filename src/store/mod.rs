//! Store access layer
//!
//! Async traits over the document store's atomic single-document
//! primitives. The conditional compound operations (`like_once`,
//! `unlike_once`, `record_view`) push check-then-act into the store so
//! application code never races between a read and a dependent write.
//!
//! Two backends: MongoDB for production, an in-memory DashMap store for
//! dev mode and tests.

mod memory;
mod mongo;

pub use memory::{MemoryIdeaStore, MemoryUserStore};
pub use mongo::{MongoIdeaStore, MongoUserStore};

use async_trait::async_trait;

use crate::db::schemas::{IdeaDoc, RewardDoc, UserDoc};
use crate::types::Result;

/// The relation sets a user document carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSet {
    Saved,
    Liked,
    Viewed,
    Shared,
}

impl RelationSet {
    /// BSON field name of the set
    pub fn field(&self) -> &'static str {
        match self {
            Self::Saved => "saved_idea_ids",
            Self::Liked => "liked_idea_ids",
            Self::Viewed => "viewed_idea_ids",
            Self::Shared => "shared_idea_ids",
        }
    }

    /// Project the set out of a user document
    pub fn get<'a>(&self, user: &'a UserDoc) -> &'a Vec<String> {
        match self {
            Self::Saved => &user.saved_idea_ids,
            Self::Liked => &user.liked_idea_ids,
            Self::Viewed => &user.viewed_idea_ids,
            Self::Shared => &user.shared_idea_ids,
        }
    }

    fn get_mut<'a>(&self, user: &'a mut UserDoc) -> &'a mut Vec<String> {
        match self {
            Self::Saved => &mut user.saved_idea_ids,
            Self::Liked => &mut user.liked_idea_ids,
            Self::Viewed => &mut user.viewed_idea_ids,
            Self::Shared => &mut user.shared_idea_ids,
        }
    }
}

/// Set mutation operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Add,
    Remove,
}

/// The mutable counters on an idea document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Views,
    Likes,
}

impl CounterField {
    /// BSON field name of the counter
    pub fn field(&self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Likes => "likes",
        }
    }
}

/// Result of a set mutation: the post-update document plus whether the
/// membership actually changed (saves are no-op successes on repeats)
#[derive(Debug, Clone)]
pub struct SetWrite {
    pub user: UserDoc,
    pub changed: bool,
}

/// Atomic operations on the users collection
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by subject id
    async fn find_user(&self, subject_id: &str) -> Result<Option<UserDoc>>;

    /// Insert a user unless one already exists for the subject id.
    /// A concurrent loser on the unique index re-reads and returns the
    /// winner's record instead of erroring.
    async fn create_user_if_absent(&self, user: UserDoc) -> Result<UserDoc>;

    /// Add or remove an idea reference in one of the relation sets.
    /// Duplicate adds and absent removes leave the set untouched and
    /// report `changed: false`.
    async fn mutate_user_set(
        &self,
        subject_id: &str,
        set: RelationSet,
        op: SetOp,
        idea_id: &str,
    ) -> Result<SetWrite>;

    /// Atomically increment a numeric user field, returning the
    /// post-update document
    async fn increment_user_field(
        &self,
        subject_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<UserDoc>;

    /// Conditional like: only when `idea_id` is not yet a member of the
    /// liked set, add it, bump reward points and append the reward in a
    /// single atomic update. `None` means the idea was already liked.
    async fn like_once(
        &self,
        subject_id: &str,
        idea_id: &str,
        reward: RewardDoc,
    ) -> Result<Option<UserDoc>>;

    /// Conditional unlike: only when `idea_id` is a member of the liked
    /// set, remove it. `None` means the idea was not liked.
    async fn unlike_once(&self, subject_id: &str, idea_id: &str) -> Result<Option<UserDoc>>;

    /// Record a view: add `idea_id` to the viewed set (idempotent
    /// membership) and, when `consume_quota` is set, decrement
    /// `views_remaining` behind a `views_remaining > 0` filter so the
    /// quota can never go negative. `None` means the quota was spent.
    ///
    /// Quota is consumed on every call, including repeat views of an
    /// already-viewed idea.
    async fn record_view(
        &self,
        subject_id: &str,
        idea_id: &str,
        consume_quota: bool,
    ) -> Result<Option<UserDoc>>;

    /// Count distinct users whose liked set contains the idea. This is
    /// the derived truth the `likes` counter must agree with.
    async fn count_likers(&self, idea_id: &str) -> Result<u64>;
}

/// Atomic operations on the ideas collection
#[async_trait]
pub trait IdeaStore: Send + Sync {
    /// Whether an idea exists (soft-deleted ideas do not)
    async fn idea_exists(&self, idea_id: &str) -> Result<bool>;

    /// Look up a single idea
    async fn find_idea(&self, idea_id: &str) -> Result<Option<IdeaDoc>>;

    /// Batch lookup; missing ideas are simply absent from the result
    async fn find_ideas(&self, idea_ids: &[String]) -> Result<Vec<IdeaDoc>>;

    /// Atomically increment a counter, returning the new value.
    /// `None` means the idea does not exist.
    async fn increment_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<Option<i64>>;

    /// Overwrite a counter (reconciliation repair), returning the new
    /// value. `None` means the idea does not exist.
    async fn set_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        value: i64,
    ) -> Result<Option<i64>>;
}

//! In-memory store backends
//!
//! DashMap-backed implementations used in dev mode (no MongoDB) and by
//! the test suite. Mutations run under the entry's shard write lock, so
//! each document update is atomic exactly like its MongoDB counterpart
//! and the ledger's race-sensitive paths behave the same way.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::db::schemas::{IdeaDoc, Metadata, RewardDoc, UserDoc};
use crate::types::{LedgerError, Result};

use super::{CounterField, IdeaStore, RelationSet, SetOp, SetWrite, UserStore};

/// In-memory user store
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserDoc>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user(&self, subject_id: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.get(subject_id).map(|u| u.clone()))
    }

    async fn create_user_if_absent(&self, mut user: UserDoc) -> Result<UserDoc> {
        user.metadata = Metadata::new();
        let entry = self
            .users
            .entry(user.subject_id.clone())
            .or_insert_with(|| user);
        Ok(entry.clone())
    }

    async fn mutate_user_set(
        &self,
        subject_id: &str,
        set: RelationSet,
        op: SetOp,
        idea_id: &str,
    ) -> Result<SetWrite> {
        let mut entry = self.users.get_mut(subject_id).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
        })?;

        let ids = set.get_mut(&mut entry);
        let changed = match op {
            SetOp::Add => {
                if ids.iter().any(|id| id == idea_id) {
                    false
                } else {
                    ids.push(idea_id.to_string());
                    true
                }
            }
            SetOp::Remove => {
                let before = ids.len();
                ids.retain(|id| id != idea_id);
                ids.len() != before
            }
        };

        if changed {
            entry.metadata.touch();
        }

        Ok(SetWrite {
            user: entry.clone(),
            changed,
        })
    }

    async fn increment_user_field(
        &self,
        subject_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<UserDoc> {
        let mut entry = self.users.get_mut(subject_id).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
        })?;

        match field {
            "reward_points" => entry.reward_points += delta,
            "views_remaining" => entry.views_remaining += delta,
            other => {
                return Err(LedgerError::Internal(format!(
                    "Unknown numeric user field: {}",
                    other
                )))
            }
        }
        entry.metadata.touch();

        Ok(entry.clone())
    }

    async fn like_once(
        &self,
        subject_id: &str,
        idea_id: &str,
        reward: RewardDoc,
    ) -> Result<Option<UserDoc>> {
        let mut entry = self.users.get_mut(subject_id).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
        })?;

        if entry.liked_idea_ids.iter().any(|id| id == idea_id) {
            return Ok(None);
        }

        entry.liked_idea_ids.push(idea_id.to_string());
        entry.reward_points += reward.value;
        entry.rewards.push(reward);
        entry.metadata.touch();

        Ok(Some(entry.clone()))
    }

    async fn unlike_once(&self, subject_id: &str, idea_id: &str) -> Result<Option<UserDoc>> {
        let mut entry = self.users.get_mut(subject_id).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
        })?;

        if !entry.liked_idea_ids.iter().any(|id| id == idea_id) {
            return Ok(None);
        }

        entry.liked_idea_ids.retain(|id| id != idea_id);
        entry.metadata.touch();

        Ok(Some(entry.clone()))
    }

    async fn record_view(
        &self,
        subject_id: &str,
        idea_id: &str,
        consume_quota: bool,
    ) -> Result<Option<UserDoc>> {
        let mut entry = self.users.get_mut(subject_id).ok_or_else(|| {
            LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
        })?;

        if consume_quota {
            if entry.views_remaining <= 0 {
                return Ok(None);
            }
            entry.views_remaining -= 1;
        }

        if !entry.viewed_idea_ids.iter().any(|id| id == idea_id) {
            entry.viewed_idea_ids.push(idea_id.to_string());
        }
        entry.metadata.touch();

        Ok(Some(entry.clone()))
    }

    async fn count_likers(&self, idea_id: &str) -> Result<u64> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.liked_idea_ids.iter().any(|id| id == idea_id))
            .count() as u64)
    }
}

/// In-memory idea store
#[derive(Default)]
pub struct MemoryIdeaStore {
    ideas: DashMap<String, IdeaDoc>,
    // Test hook: when set, counter writes fail as if the store dropped
    // the connection mid-pair
    counter_writes_unavailable: AtomicBool,
}

impl MemoryIdeaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an idea. The admin subsystem owns idea content in
    /// production; this exists for dev mode and tests.
    pub fn seed_idea(&self, idea: IdeaDoc) {
        self.ideas.insert(idea.idea_id.clone(), idea);
    }

    /// Make subsequent counter writes fail with `StoreUnavailable`,
    /// simulating a partial failure of the second half of a pair
    pub fn set_counter_writes_unavailable(&self, unavailable: bool) {
        self.counter_writes_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    fn check_counter_writes(&self) -> Result<()> {
        if self.counter_writes_unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::StoreUnavailable(
                "Counter writes unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdeaStore for MemoryIdeaStore {
    async fn idea_exists(&self, idea_id: &str) -> Result<bool> {
        Ok(self.ideas.contains_key(idea_id))
    }

    async fn find_idea(&self, idea_id: &str) -> Result<Option<IdeaDoc>> {
        Ok(self.ideas.get(idea_id).map(|i| i.clone()))
    }

    async fn find_ideas(&self, idea_ids: &[String]) -> Result<Vec<IdeaDoc>> {
        Ok(idea_ids
            .iter()
            .filter_map(|id| self.ideas.get(id).map(|i| i.clone()))
            .collect())
    }

    async fn increment_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<Option<i64>> {
        self.check_counter_writes()?;

        let mut entry = match self.ideas.get_mut(idea_id) {
            Some(e) => e,
            None => return Ok(None),
        };

        let counter = match field {
            CounterField::Views => &mut entry.views,
            CounterField::Likes => &mut entry.likes,
        };
        *counter += delta;
        let new_value = *counter;
        entry.metadata.touch();

        Ok(Some(new_value))
    }

    async fn set_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        value: i64,
    ) -> Result<Option<i64>> {
        self.check_counter_writes()?;

        let mut entry = match self.ideas.get_mut(idea_id) {
            Some(e) => e,
            None => return Ok(None),
        };

        match field {
            CounterField::Views => entry.views = value,
            CounterField::Likes => entry.likes = value,
        }
        entry.metadata.touch();

        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(subject_id: &str, quota: i64) -> UserDoc {
        UserDoc::provision(
            subject_id.into(),
            format!("{}@example.com", subject_id),
            subject_id.into(),
            quota,
        )
    }

    fn idea(idea_id: &str) -> IdeaDoc {
        IdeaDoc {
            idea_id: idea_id.into(),
            title: format!("Idea {}", idea_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_if_absent_returns_existing() {
        let store = MemoryUserStore::new();
        let first = store.create_user_if_absent(user("alice", 6)).await.unwrap();
        assert_eq!(first.views_remaining, 6);

        // Second provision with different quota must not overwrite
        let second = store.create_user_if_absent(user("alice", 99)).await.unwrap();
        assert_eq!(second.views_remaining, 6);
    }

    #[tokio::test]
    async fn test_like_once_is_conditional() {
        let store = MemoryUserStore::new();
        store.create_user_if_absent(user("alice", 6)).await.unwrap();

        let liked = store
            .like_once("alice", "idea-1", RewardDoc::points("Liked an idea", 1))
            .await
            .unwrap();
        let user = liked.unwrap();
        assert_eq!(user.liked_idea_ids, vec!["idea-1"]);
        assert_eq!(user.reward_points, 1);
        assert_eq!(user.rewards.len(), 1);

        // Second like of the same idea does not match
        let again = store
            .like_once("alice", "idea-1", RewardDoc::points("Liked an idea", 1))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_record_view_quota_floor() {
        let store = MemoryUserStore::new();
        store.create_user_if_absent(user("alice", 1)).await.unwrap();

        let first = store.record_view("alice", "idea-1", true).await.unwrap();
        assert_eq!(first.unwrap().views_remaining, 0);

        // Quota spent: conditional write does not match
        let second = store.record_view("alice", "idea-2", true).await.unwrap();
        assert!(second.is_none());

        // Premium path bypasses the quota filter
        let premium = store.record_view("alice", "idea-2", false).await.unwrap();
        let user = premium.unwrap();
        assert_eq!(user.views_remaining, 0);
        assert!(user.viewed_idea_ids.contains(&"idea-2".to_string()));
    }

    #[tokio::test]
    async fn test_record_view_deduplicates_membership() {
        let store = MemoryUserStore::new();
        store.create_user_if_absent(user("alice", 6)).await.unwrap();

        store.record_view("alice", "idea-1", true).await.unwrap();
        let user = store
            .record_view("alice", "idea-1", true)
            .await
            .unwrap()
            .unwrap();

        // Membership deduplicated, quota consumed twice
        assert_eq!(user.viewed_idea_ids, vec!["idea-1"]);
        assert_eq!(user.views_remaining, 4);
    }

    #[tokio::test]
    async fn test_mutate_user_set_reports_changed() {
        let store = MemoryUserStore::new();
        store.create_user_if_absent(user("alice", 6)).await.unwrap();

        let added = store
            .mutate_user_set("alice", RelationSet::Saved, SetOp::Add, "idea-1")
            .await
            .unwrap();
        assert!(added.changed);

        let repeat = store
            .mutate_user_set("alice", RelationSet::Saved, SetOp::Add, "idea-1")
            .await
            .unwrap();
        assert!(!repeat.changed);
        assert_eq!(repeat.user.saved_idea_ids, vec!["idea-1"]);

        let removed = store
            .mutate_user_set("alice", RelationSet::Saved, SetOp::Remove, "idea-1")
            .await
            .unwrap();
        assert!(removed.changed);
        assert!(removed.user.saved_idea_ids.is_empty());

        let absent = store
            .mutate_user_set("alice", RelationSet::Saved, SetOp::Remove, "idea-1")
            .await
            .unwrap();
        assert!(!absent.changed);
    }

    #[tokio::test]
    async fn test_increment_user_field() {
        let store = MemoryUserStore::new();
        store.create_user_if_absent(user("alice", 6)).await.unwrap();

        let user = store
            .increment_user_field("alice", "reward_points", 5)
            .await
            .unwrap();
        assert_eq!(user.reward_points, 5);

        assert!(store
            .increment_user_field("alice", "no_such_field", 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_count_likers() {
        let store = MemoryUserStore::new();
        for name in ["alice", "bob", "carol"] {
            store.create_user_if_absent(user(name, 6)).await.unwrap();
        }
        store
            .like_once("alice", "idea-1", RewardDoc::points("Liked an idea", 1))
            .await
            .unwrap();
        store
            .like_once("bob", "idea-1", RewardDoc::points("Liked an idea", 1))
            .await
            .unwrap();

        assert_eq!(store.count_likers("idea-1").await.unwrap(), 2);
        assert_eq!(store.count_likers("idea-2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_idea_counters() {
        let store = MemoryIdeaStore::new();
        store.seed_idea(idea("idea-1"));

        assert!(store.idea_exists("idea-1").await.unwrap());
        assert!(!store.idea_exists("idea-2").await.unwrap());

        let views = store
            .increment_counter("idea-1", CounterField::Views, 1)
            .await
            .unwrap();
        assert_eq!(views, Some(1));

        let likes = store
            .set_counter("idea-1", CounterField::Likes, 7)
            .await
            .unwrap();
        assert_eq!(likes, Some(7));

        let missing = store
            .increment_counter("idea-2", CounterField::Views, 1)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}

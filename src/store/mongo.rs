//! MongoDB store backends
//!
//! Every mutation is a single-document atomic update built from `$inc`,
//! `$addToSet`, `$pull` and `$push`, with membership or quota
//! preconditions folded into the filter. `find_one_and_update` returns
//! the post-update document so callers always see authoritative values.

use async_trait::async_trait;
use bson::doc;

use crate::db::schemas::{IdeaDoc, RewardDoc, UserDoc, IDEA_COLLECTION, USER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{LedgerError, Result};

use super::{CounterField, IdeaStore, RelationSet, SetOp, SetWrite, UserStore};

/// MongoDB-backed user store
pub struct MongoUserStore {
    mongo: MongoClient,
}

impl MongoUserStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    async fn collection(&self) -> Result<MongoCollection<UserDoc>> {
        self.mongo.collection::<UserDoc>(USER_COLLECTION).await
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_user(&self, subject_id: &str) -> Result<Option<UserDoc>> {
        self.collection()
            .await?
            .find_one(doc! { "subject_id": subject_id })
            .await
    }

    async fn create_user_if_absent(&self, user: UserDoc) -> Result<UserDoc> {
        let subject_id = user.subject_id.clone();
        let collection = self.collection().await?;

        match collection.insert_one(user).await {
            Ok(_) => {}
            Err(e) => {
                // A concurrent first contact won the unique subject_id
                // index; fall back to reading the winner's record.
                let error_str = e.to_string();
                if !(error_str.contains("duplicate key") || error_str.contains("E11000")) {
                    return Err(e);
                }
            }
        }

        collection
            .find_one(doc! { "subject_id": &subject_id })
            .await?
            .ok_or_else(|| {
                LedgerError::StoreUnavailable(format!(
                    "User {} missing after create_user_if_absent",
                    subject_id
                ))
            })
    }

    async fn mutate_user_set(
        &self,
        subject_id: &str,
        set: RelationSet,
        op: SetOp,
        idea_id: &str,
    ) -> Result<SetWrite> {
        let collection = self.collection().await?;

        // Fold the membership precondition into the filter so the write
        // only matches when it will actually change the set.
        let field = set.field();
        let (filter, update) = match op {
            SetOp::Add => (
                doc! { "subject_id": subject_id, field: { "$ne": idea_id } },
                doc! {
                    "$addToSet": { field: idea_id },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            ),
            SetOp::Remove => (
                doc! { "subject_id": subject_id, field: idea_id },
                doc! {
                    "$pull": { field: idea_id },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            ),
        };

        if let Some(user) = collection.find_one_and_update(filter, update).await? {
            return Ok(SetWrite {
                user,
                changed: true,
            });
        }

        // Not matched: either the membership precondition failed (no-op)
        // or the user is gone entirely.
        let user = collection
            .find_one(doc! { "subject_id": subject_id })
            .await?
            .ok_or_else(|| {
                LedgerError::StoreUnavailable(format!("User {} not found", subject_id))
            })?;

        Ok(SetWrite {
            user,
            changed: false,
        })
    }

    async fn increment_user_field(
        &self,
        subject_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<UserDoc> {
        self.collection()
            .await?
            .find_one_and_update(
                doc! { "subject_id": subject_id },
                doc! {
                    "$inc": { field: delta },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await?
            .ok_or_else(|| LedgerError::StoreUnavailable(format!("User {} not found", subject_id)))
    }

    async fn like_once(
        &self,
        subject_id: &str,
        idea_id: &str,
        reward: RewardDoc,
    ) -> Result<Option<UserDoc>> {
        let reward_value = reward.value;
        let reward_bson = bson::to_bson(&reward)?;

        self.collection()
            .await?
            .find_one_and_update(
                doc! {
                    "subject_id": subject_id,
                    "liked_idea_ids": { "$ne": idea_id },
                },
                doc! {
                    "$addToSet": { "liked_idea_ids": idea_id },
                    "$inc": { "reward_points": reward_value },
                    "$push": { "rewards": reward_bson },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await
    }

    async fn unlike_once(&self, subject_id: &str, idea_id: &str) -> Result<Option<UserDoc>> {
        self.collection()
            .await?
            .find_one_and_update(
                doc! {
                    "subject_id": subject_id,
                    "liked_idea_ids": idea_id,
                },
                doc! {
                    "$pull": { "liked_idea_ids": idea_id },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await
    }

    async fn record_view(
        &self,
        subject_id: &str,
        idea_id: &str,
        consume_quota: bool,
    ) -> Result<Option<UserDoc>> {
        let (filter, update) = if consume_quota {
            (
                doc! {
                    "subject_id": subject_id,
                    "views_remaining": { "$gt": 0 },
                },
                doc! {
                    "$inc": { "views_remaining": -1 },
                    "$addToSet": { "viewed_idea_ids": idea_id },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
        } else {
            (
                doc! { "subject_id": subject_id },
                doc! {
                    "$addToSet": { "viewed_idea_ids": idea_id },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
        };

        self.collection().await?.find_one_and_update(filter, update).await
    }

    async fn count_likers(&self, idea_id: &str) -> Result<u64> {
        self.collection()
            .await?
            .count(doc! { "liked_idea_ids": idea_id })
            .await
    }
}

/// MongoDB-backed idea store
pub struct MongoIdeaStore {
    mongo: MongoClient,
}

impl MongoIdeaStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    async fn collection(&self) -> Result<MongoCollection<IdeaDoc>> {
        self.mongo.collection::<IdeaDoc>(IDEA_COLLECTION).await
    }
}

#[async_trait]
impl IdeaStore for MongoIdeaStore {
    async fn idea_exists(&self, idea_id: &str) -> Result<bool> {
        Ok(self
            .collection()
            .await?
            .find_one(doc! { "idea_id": idea_id })
            .await?
            .is_some())
    }

    async fn find_idea(&self, idea_id: &str) -> Result<Option<IdeaDoc>> {
        self.collection()
            .await?
            .find_one(doc! { "idea_id": idea_id })
            .await
    }

    async fn find_ideas(&self, idea_ids: &[String]) -> Result<Vec<IdeaDoc>> {
        if idea_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.collection()
            .await?
            .find_many(doc! { "idea_id": { "$in": idea_ids } })
            .await
    }

    async fn increment_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<Option<i64>> {
        let counter = field.field();
        let updated = self
            .collection()
            .await?
            .find_one_and_update(
                doc! { "idea_id": idea_id },
                doc! {
                    "$inc": { counter: delta },
                    "$set": { "metadata.updated_at": bson::DateTime::now() },
                },
            )
            .await?;

        Ok(updated.map(|idea| match field {
            CounterField::Views => idea.views,
            CounterField::Likes => idea.likes,
        }))
    }

    async fn set_counter(
        &self,
        idea_id: &str,
        field: CounterField,
        value: i64,
    ) -> Result<Option<i64>> {
        let counter = field.field();
        let updated = self
            .collection()
            .await?
            .find_one_and_update(
                doc! { "idea_id": idea_id },
                doc! {
                    "$set": {
                        counter: value,
                        "metadata.updated_at": bson::DateTime::now(),
                    },
                },
            )
            .await?;

        Ok(updated.map(|idea| match field {
            CounterField::Views => idea.views,
            CounterField::Likes => idea.likes,
        }))
    }
}

//! Database schemas for tally
//!
//! Defines MongoDB document structures for users and ideas.

mod idea;
mod metadata;
mod user;

pub use idea::{IdeaDoc, IDEA_COLLECTION};
pub use metadata::Metadata;
pub use user::{RewardDoc, SubscriptionTier, UserDoc, USER_COLLECTION};

//! Idea document schema
//!
//! Content fields are owned by the admin subsystem; this service reads
//! them for projection and mutates only the `views` / `likes` counters.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for ideas
pub const IDEA_COLLECTION: &str = "ideas";

/// Idea document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct IdeaDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Stable idea identifier (unique)
    pub idea_id: String,

    /// Idea title
    #[serde(default)]
    pub title: String,

    /// Idea description
    #[serde(default)]
    pub description: String,

    /// Category name
    #[serde(default)]
    pub category: String,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// View counter, incremented once per successful view consumption
    #[serde(default)]
    pub views: i64,

    /// Like counter. Must equal the number of distinct users whose
    /// liked_idea_ids contains this idea; repairable by reconciliation.
    #[serde(default)]
    pub likes: i64,
}

impl IntoIndexes for IdeaDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "idea_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("idea_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for IdeaDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

//! Projection reader
//!
//! Read-only expansion of a user's relation sets into full idea
//! documents for display. Depends on the idea store only.

use std::sync::Arc;

use crate::db::schemas::IdeaDoc;
use crate::store::IdeaStore;
use crate::types::Result;

/// Expands idea references into idea documents
pub struct ProjectionReader {
    ideas: Arc<dyn IdeaStore>,
}

impl ProjectionReader {
    pub fn new(ideas: Arc<dyn IdeaStore>) -> Self {
        Self { ideas }
    }

    /// Resolve a relation set into idea documents, most recently added
    /// first. Relation sets append, so the caller's sequence is walked
    /// in reverse. Dangling references (ideas deleted after being
    /// referenced) are silently dropped, and `limit` truncates after
    /// ordering.
    pub async fn expand(&self, idea_ids: &[String], limit: Option<usize>) -> Result<Vec<IdeaDoc>> {
        if idea_ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetched = self.ideas.find_ideas(idea_ids).await?;

        let mut ordered: Vec<IdeaDoc> = idea_ids
            .iter()
            .rev()
            .filter_map(|id| fetched.iter().find(|idea| &idea.idea_id == id).cloned())
            .collect();

        if let Some(limit) = limit {
            ordered.truncate(limit);
        }

        Ok(ordered)
    }
}

//! Persisted skill records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::draft::Draft;

/// Final output artifact of a run, validated or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: String,
    pub name: String,
    pub topic: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub validation_passed: bool,
    pub sources_count: usize,
    pub attempts: usize,
    pub created_at: DateTime<Utc>,
}

impl SkillRecord {
    #[must_use]
    pub fn from_draft(
        draft: &Draft,
        validation_passed: bool,
        sources_count: usize,
        attempts: usize,
    ) -> Self {
        let description = draft.description.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            topic: draft.topic.clone(),
            category: draft.category.clone(),
            description: (!description.is_empty()).then(|| description.to_string()),
            content: draft.content.clone(),
            content_hash: content_hash(&draft.content),
            validation_passed,
            sources_count,
            attempts,
            created_at: Utc::now(),
        }
    }
}

/// SHA-256 hex digest of skill content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

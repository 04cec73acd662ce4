//! Persistence for events and skill records.

pub mod migrations;
pub mod skill_dir;
pub mod sqlite;

use crate::core::record::SkillRecord;
use crate::error::Result;

pub use skill_dir::SkillDirWriter;
pub use sqlite::{Database, ForgeStats};

/// Append-only store of final skill records.
pub trait SkillStore: Send + Sync {
    fn put(&self, record: &SkillRecord) -> Result<()>;
}

//! Publishing saved skills to a shared location.

pub mod github;

use crate::core::record::SkillRecord;
use crate::error::Result;

pub use github::GitHubPublisher;

/// Makes a saved record available outside this machine.
pub trait Publisher: Send + Sync {
    /// Publish `record` and return its public URL.
    fn publish(&self, record: &SkillRecord) -> Result<String>;
}

//! Source gathering for a topic.

pub mod firecrawl;

use crate::core::bundle::ResearchBundle;
use crate::error::Result;

pub use firecrawl::FirecrawlResearcher;

/// Gathers source material for a topic.
///
/// An empty bundle is a valid answer; the pipeline treats it as a failed
/// research stage.
pub trait ResearchProvider: Send + Sync {
    fn research(&self, topic: &str) -> Result<ResearchBundle>;
}

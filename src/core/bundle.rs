//! Research output handed to the drafting stage.

use serde::{Deserialize, Serialize};

/// One source document: its text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    pub origin: String,
}

impl Source {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: origin.into(),
        }
    }
}

/// Ordered sources for one topic. Never mutated after research completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub topic: String,
    pub sources: Vec<Source>,
}

impl ResearchBundle {
    pub fn new(topic: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            topic: topic.into(),
            sources,
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source texts joined into one notes block.
    #[must_use]
    pub fn notes(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Source origins in order.
    #[must_use]
    pub fn origins(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.origin.as_str()).collect()
    }
}

//! Draft generation: the request contract and the LLM-backed writer.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::bundle::ResearchBundle;
use crate::core::draft::Draft;
use crate::error::Result;
use crate::llm::ChatClient;

/// What went wrong in one earlier attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    pub attempt: usize,
    /// 0-based index into the attempt's command results.
    pub failing_step: Option<usize>,
    /// Step number as written in the draft's procedure.
    pub step_number: Option<usize>,
    pub command: Option<String>,
    /// Tail of the captured output.
    pub output: String,
    pub summary: String,
}

/// Everything the generator sees for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub bundle: ResearchBundle,
    /// Oldest first.
    pub prior_failures: Vec<FailureContext>,
    /// 1-based number of the attempt being drafted.
    pub attempt: usize,
    pub max_attempts: usize,
}

impl GenerationRequest {
    #[must_use]
    pub fn is_refinement(&self) -> bool {
        !self.prior_failures.is_empty()
    }
}

/// Produces a draft from research and failure history.
pub trait DraftGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Draft>;
}

const WRITER_PROMPT: &str = r#"You are a technical writer producing machine-executable skill documents.

Write one SKILL.md for the requested topic. Output only the document.

Format, exactly:

---
name: <lowercase-hyphenated-name>
description: <one sentence>
version: 1.0.0
metadata:
  domain: <topic>
  category: <short category>
  validation_passed: false
  sources_used: <number of sources>
---

# <Title>

## When to Use
## Prerequisites
## Procedure
Numbered steps ("1. Title"). A step may contain at most one ```bash fenced
block holding the command(s) for that step. Every command runs
non-interactively, in order, as root inside a fresh Debian container with
Python 3.11 and no network access. Do not use sudo, prompts, or GUI tools.
## Verification
## Pitfalls
## Sources
"#;

/// Draft generator backed by a chat-completions model.
#[derive(Debug)]
pub struct LlmGenerator {
    client: ChatClient,
}

impl LlmGenerator {
    #[must_use]
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

impl DraftGenerator for LlmGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Draft> {
        let prompt = render_user_prompt(request);
        info!(
            topic = %request.topic,
            attempt = request.attempt,
            model = self.client.model(),
            "generating draft"
        );
        let text = self.client.complete(WRITER_PROMPT, &prompt)?;
        Ok(Draft::from_markdown(&request.topic, &text))
    }
}

/// User message for the writer model.
#[must_use]
pub fn render_user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Domain: {}\n", request.topic);

    prompt.push_str("Sources:\n");
    if request.bundle.is_empty() {
        prompt.push_str("None collected.\n");
    }
    for origin in request.bundle.origins() {
        let _ = writeln!(prompt, "- {origin}");
    }
    let _ = write!(
        prompt,
        "\nResearch notes (markdown):\n{}\n\n",
        request.bundle.notes()
    );

    if request.is_refinement() {
        let _ = writeln!(
            prompt,
            "Previous attempts failed validation (this is attempt {} of {}):",
            request.attempt, request.max_attempts
        );
        for failure in &request.prior_failures {
            let _ = writeln!(prompt, "\n### Attempt {}", failure.attempt);
            match (failure.step_number, &failure.command) {
                (Some(step), Some(command)) => {
                    let _ = writeln!(prompt, "Step {step} failed running:\n```bash\n{command}\n```");
                }
                (None, Some(command)) => {
                    let _ = writeln!(prompt, "Command failed:\n```bash\n{command}\n```");
                }
                _ => {}
            }
            let _ = writeln!(prompt, "Reason: {}", failure.summary);
            if !failure.output.is_empty() {
                let _ = writeln!(prompt, "Output:\n```\n{}\n```", failure.output);
            }
        }
        prompt.push_str("\nFix these problems. ");
    }

    prompt.push_str("Using the research above, write a complete SKILL.md.");
    prompt
}

//! Human-facing notifications for lifecycle events.

pub mod telegram;

use std::fmt::Write as _;

use tracing::info;

use crate::core::event::{Event, EventKind};
use crate::error::Result;

pub use telegram::TelegramNotifier;

/// Delivers a rendered message. Callers swallow failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        info!(target: "skill_forge::notify", "{message}");
        Ok(())
    }
}

/// Escape `&`, `<` and `>` for Telegram HTML.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML message for one event.
#[must_use]
pub fn render_event(event: &Event, dashboard_url: Option<&str>) -> String {
    let topic = escape_html(&event.topic);
    let skill = escape_html(event.skill_name.as_deref().unwrap_or(&event.topic));
    let attempt = event.meta_u64("attempt").unwrap_or(1);
    let max_attempts = event.meta_u64("max_attempts").unwrap_or(3);

    match event.kind {
        EventKind::ResearchStart => {
            format!("🔍 <b>Skill Forge</b> — Researching: <code>{topic}</code>")
        }
        EventKind::ResearchDone => format!(
            "📖 Research complete — {} sources for <code>{topic}</code>",
            event.meta_u64("sources_count").unwrap_or(0)
        ),
        EventKind::Drafting => {
            if attempt > 1 {
                format!("✍️ Refining skill for <code>{topic}</code> (attempt {attempt}/{max_attempts})")
            } else {
                format!("✍️ Writing skill for <code>{topic}</code>")
            }
        }
        EventKind::Validating => {
            format!("🧪 Validating <code>{skill}</code> in sandbox...")
        }
        EventKind::ValidatedOk => {
            let mut text = format!("✅ <b>Skill learned!</b>\n<code>{skill}</code>");
            if let Some(description) = event.meta_str("description").filter(|d| !d.is_empty()) {
                let _ = write!(text, "\n<i>{}</i>", escape_html(description));
            }
            let _ = write!(
                text,
                "\n\n{} steps validated",
                event.meta_u64("steps_tested").unwrap_or(0)
            );
            text
        }
        EventKind::ValidatedFail => {
            let mut text = format!("⚠️ Validation failed for <code>{skill}</code>");
            if attempt < max_attempts {
                let _ = write!(text, "\nRetrying... (attempt {}/{max_attempts})", attempt + 1);
            } else {
                let _ = write!(text, "\nNo attempts left ({attempt}/{max_attempts})");
            }
            text
        }
        EventKind::Saved => {
            let label = if event.meta_bool("validation_passed").unwrap_or(false) {
                "📚 Saved"
            } else {
                "📚 Saved (unvalidated)"
            };
            let github_url = event.meta_str("github_url").filter(|url| !url.is_empty());
            match (github_url, dashboard_url.filter(|url| !url.is_empty())) {
                (Some(url), _) => format!(
                    "{label}: <code>{skill}</code>\n🌐 <a href=\"{}\">View on GitHub</a>",
                    escape_html(url)
                ),
                (None, Some(url)) => format!(
                    "{label}: <code>{skill}</code>\n🌐 <a href=\"{}\">View on dashboard</a>",
                    escape_html(url)
                ),
                (None, None) => format!("{label}: <code>{skill}</code>"),
            }
        }
        EventKind::Error => format!(
            "❌ <b>Skill Forge</b> — <code>{topic}</code> failed: {}",
            escape_html(&event.message)
        ),
    }
}

//! Daily report of learned and failed skills.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::record::SkillRecord;
use crate::error::Result;
use crate::notify::{Notifier, escape_html};
use crate::storage::Database;
use crate::storage::sqlite::start_of_day;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub name: String,
    pub category: String,
    pub description: Option<String>,
}

impl SummaryLine {
    fn from_record(record: &SkillRecord) -> Self {
        Self {
            name: record.name.clone(),
            category: record.category.clone(),
            description: record.description.clone(),
        }
    }

    fn render(&self) -> String {
        let mut line = format!("- {}", self.name);
        if !self.category.is_empty() {
            let _ = write!(line, " ({})", self.category);
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(line, " – {description}");
        }
        line
    }
}

/// Skills created since UTC midnight, split by verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub learned: Vec<SummaryLine>,
    pub failed: Vec<SummaryLine>,
    pub total: u64,
    pub dashboard_url: Option<String>,
    /// Whether the notifier accepted the message.
    pub delivered: bool,
}

impl DailySummary {
    pub fn build(db: &Database, now: DateTime<Utc>, dashboard_url: Option<String>) -> Result<Self> {
        let records = db.skills_since(start_of_day(now))?;
        let total = db.stats(now)?.total;
        let (learned, failed): (Vec<&SkillRecord>, Vec<&SkillRecord>) =
            records.iter().partition(|record| record.validation_passed);

        Ok(Self {
            learned: learned.into_iter().map(SummaryLine::from_record).collect(),
            failed: failed.into_iter().map(SummaryLine::from_record).collect(),
            total,
            dashboard_url,
            delivered: false,
        })
    }

    /// HTML message for the notifier.
    #[must_use]
    pub fn render(&self) -> String {
        let list = |lines: &[SummaryLine]| {
            if lines.is_empty() {
                "None".to_string()
            } else {
                lines
                    .iter()
                    .map(|line| escape_html(&line.render()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        let mut text = String::from("📊 <b>Skill Forge — Daily Report</b>\n");
        let _ = writeln!(text, "{RULE}");
        let _ = writeln!(text, "✅ Learned today: {}", self.learned.len());
        let _ = writeln!(text, "{}", list(&self.learned));
        let _ = writeln!(text, "❌ Failed: {}", self.failed.len());
        let _ = writeln!(text, "{}", list(&self.failed));
        let _ = writeln!(text, "📈 Total skills: {}", self.total);
        if let Some(url) = self.dashboard_url.as_deref().filter(|url| !url.is_empty()) {
            let _ = writeln!(text, "🌐 {}", escape_html(url));
        }
        text.push_str(RULE);
        text
    }
}

/// Build today's summary and hand it to `notifier`.
///
/// Delivery failures are logged and reflected in `delivered`.
pub fn send_daily_summary(
    db: &Database,
    notifier: &dyn Notifier,
    dashboard_url: Option<String>,
) -> Result<DailySummary> {
    let mut summary = DailySummary::build(db, Utc::now(), dashboard_url)?;
    info!(
        learned = summary.learned.len(),
        failed = summary.failed.len(),
        total = summary.total,
        "sending daily summary"
    );
    match notifier.notify(&summary.render()) {
        Ok(()) => summary.delivered = true,
        Err(err) => warn!(error = %err, "daily summary notification failed"),
    }
    Ok(summary)
}

/// Time from `now` until the next wall-clock occurrence of `at`.
#[must_use]
pub fn delay_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Fire `job` every day at local time `at` until Ctrl+C.
///
/// The job runs on the blocking pool so it may use blocking I/O.
pub async fn run_daemon(at: NaiveTime, job: Arc<dyn Fn() + Send + Sync>) -> Result<()> {
    info!(at = %at, "summary daemon started");
    loop {
        let wait = delay_until(Local::now().naive_local(), at);
        info!(next_in_secs = wait.as_secs(), "waiting for next summary");

        tokio::select! {
            () = tokio::time::sleep(wait) => {
                let job = Arc::clone(&job);
                if let Err(err) = tokio::task::spawn_blocking(move || job()).await {
                    error!(error = %err, "summary job panicked");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("summary daemon stopped");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::core::draft::Draft;
    use crate::test_utils::doubles::RecordingNotifier;
    use crate::test_utils::fixtures::sample_skill_md;

    fn record(name: &str, passed: bool) -> SkillRecord {
        let draft = Draft::from_markdown("docker", &sample_skill_md(name, "docker", &["echo ok"]));
        SkillRecord::from_draft(&draft, passed, 3, 1)
    }

    #[test]
    fn summary_splits_learned_and_failed() {
        let db = Database::open_in_memory().unwrap();
        db.insert_skill(&record("docker-basics", true)).unwrap();
        db.insert_skill(&record("kubectl-debug", false)).unwrap();

        let summary =
            DailySummary::build(&db, Utc::now(), Some("https://forge.example".into())).unwrap();
        assert_eq!(summary.learned.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.total, 2);

        let text = summary.render();
        assert!(text.contains("✅ Learned today: 1"));
        assert!(text.contains("- docker-basics (devops)"));
        assert!(text.contains("❌ Failed: 1"));
        assert!(text.contains("📈 Total skills: 2"));
        assert!(text.contains("🌐 https://forge.example"));
    }

    #[test]
    fn empty_day_renders_none() {
        let db = Database::open_in_memory().unwrap();
        let text = DailySummary::build(&db, Utc::now(), None).unwrap().render();
        assert!(text.contains("✅ Learned today: 0\nNone"));
        assert!(!text.contains("🌐"));
    }

    #[test]
    fn send_reports_delivery() {
        let db = Database::open_in_memory().unwrap();
        let notifier = RecordingNotifier::default();
        let summary = send_daily_summary(&db, &notifier, None).unwrap();
        assert!(summary.delivered);
        assert_eq!(notifier.messages().len(), 1);

        let failing = RecordingNotifier::failing();
        let summary = send_daily_summary(&db, &failing, None).unwrap();
        assert!(!summary.delivered);
    }

    #[test]
    fn delay_until_later_today_and_tomorrow() {
        let at = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let morning = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(delay_until(morning, at), Duration::from_secs(30 * 60));

        let evening = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(delay_until(evening, at), Duration::from_secs(24 * 3600));
    }
}

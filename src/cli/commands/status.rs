//! skill-forge status - aggregate statistics

use chrono::Utc;
use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn run(ctx: &AppContext, _args: &StatusArgs) -> Result<()> {
    let stats = ctx.db.stats(Utc::now())?;

    if ctx.robot_mode {
        return emit_json(&robot_ok(&stats));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Skill Forge status")
        .kv("Total skills", &stats.total.to_string())
        .kv("Learned today", &stats.today.to_string())
        .kv("Validated", &stats.validated.to_string())
        .kv("Success rate", &format!("{:.1}%", stats.success_rate))
        .kv("Sandbox", &format!("{:?}", ctx.config.sandbox.backend).to_lowercase());
    if !stats.topics.is_empty() {
        layout.blank().section("Topics");
        for topic in &stats.topics {
            layout.bullet(topic);
        }
    }
    emit_human(layout);
    Ok(())
}

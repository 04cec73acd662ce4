//! skill-forge show - one skill's latest record

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, verdict_label};
use crate::error::{ForgeError, Result};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Skill name
    pub name: String,

    /// Print only the SKILL.md content
    #[arg(long)]
    pub content: bool,
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let skill = ctx
        .db
        .get_skill(&args.name)?
        .ok_or_else(|| ForgeError::NotFound(format!("skill not found: {}", args.name)))?;

    if ctx.robot_mode {
        return emit_json(&robot_ok(&skill));
    }
    if args.content {
        println!("{}", skill.content);
        return Ok(());
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&skill.name)
        .kv("Status", &verdict_label(skill.validation_passed))
        .kv("Topic", &skill.topic)
        .kv("Category", &skill.category)
        .kv("Description", skill.description.as_deref().unwrap_or("-"))
        .kv("Attempts", &skill.attempts.to_string())
        .kv("Sources", &skill.sources_count.to_string())
        .kv("Created", &skill.created_at.to_rfc3339())
        .kv("Hash", &skill.content_hash)
        .blank()
        .push_line(skill.content.clone());
    emit_human(layout);
    Ok(())
}

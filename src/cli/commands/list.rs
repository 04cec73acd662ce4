//! skill-forge list - latest record per skill name

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, verdict_label};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of skills to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Only show skills that passed validation
    #[arg(long)]
    pub validated: bool,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let mut skills = ctx.db.latest_skills(args.limit)?;
    if args.validated {
        skills.retain(|skill| skill.validation_passed);
    }

    if ctx.robot_mode {
        return emit_json(&robot_ok(&skills));
    }

    if skills.is_empty() {
        println!("No skills saved yet.");
        return Ok(());
    }

    let mut layout = HumanLayout::new();
    layout.title(&format!("{} skills", skills.len()));
    for skill in &skills {
        layout.push_line(format!(
            "{} [{}] {}",
            style(&skill.name).bold(),
            verdict_label(skill.validation_passed),
            style(&skill.topic).dim()
        ));
        if let Some(description) = &skill.description {
            layout.push_line(format!("    {description}"));
        }
    }
    emit_human(layout);
    Ok(())
}

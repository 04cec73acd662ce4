//! skill-forge events - recent lifecycle events

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::core::event::EventKind;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Only events for this topic
    #[arg(long)]
    pub topic: Option<String>,

    /// Maximum number of events
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

pub fn run(ctx: &AppContext, args: &EventsArgs) -> Result<()> {
    let events = ctx.db.list_events(args.topic.as_deref(), args.limit)?;

    if ctx.robot_mode {
        return emit_json(&robot_ok(&events));
    }
    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    let mut layout = HumanLayout::new();
    for event in &events {
        let kind = match event.kind {
            EventKind::ValidatedOk | EventKind::Saved => style(event.kind.as_str()).green(),
            EventKind::ValidatedFail => style(event.kind.as_str()).yellow(),
            EventKind::Error => style(event.kind.as_str()).red(),
            _ => style(event.kind.as_str()).cyan(),
        };
        let message = event.message.lines().next().unwrap_or_default();
        layout.push_line(format!(
            "{} {kind:<16} {} {message}",
            style(event.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            event.topic,
        ));
    }
    emit_human(layout);
    Ok(())
}

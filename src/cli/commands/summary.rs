//! skill-forge summary - daily report, once or as a daemon

use std::sync::Arc;

use clap::Args;
use tracing::error;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::config::parse_clock;
use crate::error::Result;
use crate::summary::{run_daemon, send_daily_summary};

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Keep running and send the summary every day at `notify.summary_time`
    #[arg(long)]
    pub daemon: bool,
}

pub fn run(ctx: &AppContext, args: &SummaryArgs) -> Result<()> {
    let notifier = ctx.notifier()?;
    let dashboard_url = ctx.config.notify.dashboard_url.clone();

    if args.daemon {
        let at = parse_clock(&ctx.config.notify.summary_time)?;
        if !ctx.robot_mode {
            println!("Sending the daily summary at {at} (Ctrl+C to stop)");
        }
        let db = Arc::clone(&ctx.db);
        let job = Arc::new(move || {
            if let Err(err) = send_daily_summary(&db, notifier.as_ref(), dashboard_url.clone()) {
                error!(error = %err, "daily summary failed");
            }
        });
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        return runtime.block_on(run_daemon(at, job));
    }

    let summary = send_daily_summary(&ctx.db, notifier.as_ref(), dashboard_url)?;
    if ctx.robot_mode {
        return emit_json(&robot_ok(&summary));
    }
    let mut layout = HumanLayout::new();
    layout
        .title("Daily summary")
        .kv("Learned today", &summary.learned.len().to_string())
        .kv("Failed today", &summary.failed.len().to_string())
        .kv("Total skills", &summary.total.to_string())
        .kv("Delivered", if summary.delivered { "yes" } else { "no" });
    emit_human(layout);
    Ok(())
}

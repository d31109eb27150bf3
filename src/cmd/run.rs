//! The supervisory loop: `autopilot run`.

use anyhow::Result;
use autopilot::config::Config;
use autopilot::orchestrator::{IterationOutcome, build_supervisor};

pub async fn cmd_run(config: &Config) -> Result<()> {
    config.ensure_directories()?;
    let supervisor = build_supervisor(config)?;
    let settings = supervisor.settings().clone();

    println!(
        "{} (max {} iterations, cooldown {}s)",
        console::style("Autopilot loop").bold().cyan(),
        settings.max_iterations,
        settings.cooldown.as_secs()
    );

    let summary = supervisor
        .run_with(|iteration, outcome| match outcome {
            IterationOutcome::Idle { swept } => {
                if swept.is_empty() {
                    println!("[{iteration}] idle: nothing ready");
                } else {
                    println!("[{iteration}] idle: reset {} stuck task(s)", swept.len());
                }
            }
            IterationOutcome::Gated { task_id, decision } => {
                let verdict = if decision.allowed {
                    console::style("accepted").green()
                } else {
                    console::style("rejected").red()
                };
                println!(
                    "[{iteration}] {task_id}: {verdict} ({}) {}",
                    decision.reason, decision.detail
                );
            }
            IterationOutcome::Failed { task_id, error } => {
                let task = if task_id.is_empty() { "-" } else { task_id };
                println!(
                    "[{iteration}] {task}: {} {error}",
                    console::style("failed").red().bold()
                );
            }
        })
        .await?;

    println!();
    println!(
        "iterations: {}  dispatched: {}  accepted: {}  rejected: {}  idle: {}  failed: {}",
        summary.iterations,
        summary.dispatched,
        summary.accepted,
        summary.rejected,
        summary.idle,
        summary.failed
    );
    Ok(())
}

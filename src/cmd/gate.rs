//! Acceptance gate commands: gate, review-pending, decisions.

use anyhow::{Context, Result};
use autopilot::audit::DecisionLog;
use autopilot::config::Config;
use autopilot::gates::{Decision, VerificationStatus};
use autopilot::orchestrator::{build_gate, build_reviewer, review_pending};
use autopilot::registry::TaskRegistry;
use std::path::Path;

use super::super::VerificationArg;

fn print_decision(decision: &Decision) {
    let verdict = if decision.allowed {
        console::style("ACCEPTED").green().bold()
    } else {
        console::style("REJECTED").red().bold()
    };
    println!("{} {} [{}]", verdict, decision.task_id, decision.reason);
    println!("  {}", decision.detail);
    if decision.verification_skipped {
        println!(
            "  {}",
            console::style("verification skipped (no verifier configured)").yellow()
        );
    }
}

pub async fn cmd_gate(
    config: &Config,
    id: &str,
    verification: VerificationArg,
    review_file: Option<&Path>,
) -> Result<()> {
    let registry = TaskRegistry::new(&config.registry_file);
    let task = registry.get(id)?;

    let review = match review_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read review file: {}", path.display()))?,
        None => build_reviewer(config).review(&task).await?,
    };
    let verification = match verification {
        VerificationArg::Pass => VerificationStatus::Passed,
        VerificationArg::Fail => VerificationStatus::Failed,
        VerificationArg::Auto => VerificationStatus::NotRun,
    };

    let gate = build_gate(config);
    let decision = gate.decide(id, verification, Some(&review)).await?;
    print_decision(&decision);

    match gate.apply(&registry, &decision)? {
        Some(status) => println!("  status -> {}", status),
        None => println!("  status unchanged (task is done)"),
    }
    Ok(())
}

pub async fn cmd_review_pending(config: &Config) -> Result<()> {
    let registry = TaskRegistry::new(&config.registry_file);
    let gate = build_gate(config);
    let reviewer = build_reviewer(config);

    let report = review_pending(&registry, &gate, reviewer.as_ref()).await?;

    for id in &report.reset {
        println!("{} {} (no evidence, reset to todo)", console::style("RESET").yellow(), id);
    }
    for decision in &report.decisions {
        print_decision(decision);
    }
    for (id, error) in &report.failed {
        println!("{} {}: {}", console::style("FAILED").red(), id, error);
    }
    if report.reset.is_empty() && report.decisions.is_empty() && report.failed.is_empty() {
        println!("No pending tasks.");
    }
    Ok(())
}

pub fn cmd_decisions(config: &Config, task: Option<&str>) -> Result<()> {
    let log = DecisionLog::new(&config.decision_log);
    let records = match task {
        Some(id) => log.for_task(id)?,
        None => log.read_all()?,
    };

    if records.is_empty() {
        println!("No decisions recorded.");
        return Ok(());
    }

    println!(
        "{:<20} {:<14} {:<8} {:<30} Detail",
        "Timestamp", "Task", "Allowed", "Reason"
    );
    for record in records {
        let d = &record.decision;
        println!(
            "{:<20} {:<14} {:<8} {:<30} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            d.task_id,
            if d.allowed { "yes" } else { "no" },
            d.reason.as_str(),
            d.detail
        );
    }
    Ok(())
}

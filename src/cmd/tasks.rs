//! Registry commands: list, status, set, next, sweep-stuck, progress.

use anyhow::Result;
use autopilot::config::Config;
use autopilot::evidence::ArtifactProbe;
use autopilot::registry::TaskRegistry;
use autopilot::scheduler::{Scheduler, unmet_dependencies};
use autopilot::task::TaskStatus;

fn registry(config: &Config) -> TaskRegistry {
    TaskRegistry::new(&config.registry_file)
}

pub fn cmd_list(config: &Config, only: Option<TaskStatus>) -> Result<()> {
    let registry = registry(config);
    let all = registry.load()?;
    let groups = registry.by_status()?;

    if all.is_empty() {
        println!("No tasks in {}", registry.path().display());
        return Ok(());
    }

    for status in TaskStatus::ALL {
        if only.is_some_and(|s| s != status) {
            continue;
        }
        let Some(tasks) = groups.get(&status) else {
            continue;
        };

        println!();
        println!(
            "{} ({})",
            console::style(status.as_str().to_uppercase()).bold(),
            tasks.len()
        );
        println!("  {:<14} {:>5}  {:<14} {:<24} Title", "ID", "Pri", "Owner", "Depends on");
        for task in tasks {
            let deps = if task.depends_on.is_empty() {
                "-".to_string()
            } else {
                task.depends_on.join(",")
            };
            println!(
                "  {:<14} {:>5}  {:<14} {:<24} {}",
                task.id,
                task.priority,
                task.owner,
                deps,
                task.title().unwrap_or("(no title)")
            );
            if status == TaskStatus::Todo {
                let unmet = unmet_dependencies(task, &all);
                if !unmet.is_empty() {
                    println!(
                        "  {:<14} {}",
                        "",
                        console::style(format!("blocked by {}", unmet.join(", "))).dim()
                    );
                }
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_status(config: &Config) -> Result<()> {
    let registry = registry(config);
    let groups = registry.by_status()?;
    let total: usize = groups.values().map(Vec::len).sum();

    println!();
    println!("Autopilot Status");
    println!("================");
    println!();
    println!("Registry: {}", registry.path().display());
    for status in TaskStatus::ALL {
        let count = groups.get(&status).map(Vec::len).unwrap_or(0);
        println!("  {:<12} {}", status.as_str(), count);
    }
    println!("  {:<12} {}", "total", total);
    println!();
    Ok(())
}

pub fn cmd_set(config: &Config, id: &str, status: TaskStatus, force: bool) -> Result<()> {
    let registry = registry(config);
    let previous = if force {
        registry.set_status(id, status)?
    } else {
        registry.transition(id, status)?
    };
    tracing::info!(task_id = id, from = %previous, to = %status, force, "status set");
    println!("{}: {} -> {}", id, previous, status);
    Ok(())
}

pub fn cmd_next(config: &Config) -> Result<()> {
    let registry = registry(config);
    match Scheduler::new(&registry).next_ready()? {
        Some(task) => {
            println!(
                "{} {} (owner {}, priority {})",
                console::style("Reserved").green().bold(),
                task.id,
                task.owner,
                task.priority
            );
            if let Some(title) = task.title() {
                println!("  {}", title);
            }
        }
        None => println!("No ready task."),
    }
    Ok(())
}

pub fn cmd_sweep_stuck(config: &Config) -> Result<()> {
    let registry = registry(config);
    let probe = ArtifactProbe::new(&config.runs_dir, config.evidence_extensions());
    let swept = autopilot::recovery::sweep_stuck(&registry, &probe)?;
    if swept.is_empty() {
        println!("No stuck tasks.");
    } else {
        println!("Reset {} stuck task(s) to todo:", swept.len());
        for id in swept {
            println!("  {}", id);
        }
    }
    Ok(())
}

pub fn cmd_progress(config: &Config) -> Result<()> {
    let registry = registry(config);
    let paths =
        autopilot::progress::write_reports(&registry, &config.progress_file, &config.todo_file)?;
    println!("Wrote {}", paths.progress.display());
    println!("Wrote {}", paths.todo.display());
    Ok(())
}

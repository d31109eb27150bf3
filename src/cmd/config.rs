//! Configuration view and validation commands: `autopilot config`.

use anyhow::Result;
use autopilot::autopilot_config::config_path;
use autopilot::config::Config;

use super::super::ConfigCommands;

fn show_command(name: &str, command: Option<&str>) {
    match command {
        Some(cmd) => println!("  {:<10} {}", name, cmd),
        None => println!("  {:<10} {}", name, console::style("(not set)").dim()),
    }
}

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let file = config_path(&config.project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Autopilot Configuration");
            println!("=======================");
            println!();
            if file.exists() {
                println!("Config file: {}", file.display());
            } else {
                println!("No config file at {} (using defaults)", file.display());
            }
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("[paths]");
            println!("  registry     {}", config.registry_file.display());
            println!("  locks_dir    {}", config.locks_dir.display());
            println!("  runs_dir     {}", config.runs_dir.display());
            println!("  reviews_dir  {}", config.reviews_dir.display());
            println!("  decision_log {}", config.decision_log.display());
            println!("  log_dir      {}", config.log_dir.display());
            println!("  progress_file {}", config.progress_file.display());
            println!("  todo_file    {}", config.todo_file.display());
            println!("[loop]");
            println!("  max_iterations = {}", config.max_iterations());
            println!("  cooldown_secs = {}", config.cooldown().as_secs());
            println!(
                "  review_pending_when_idle = {}",
                config.review_pending_when_idle()
            );
            let retry = &config.settings().retry;
            println!("[retry]");
            println!("  max_attempts = {}", retry.max_attempts);
            println!("  base_delay_secs = {}", retry.base_delay_secs);
            println!("  max_delay_secs = {}", retry.max_delay_secs);
            println!("  jitter = {}", retry.jitter);
            println!("[locks]");
            println!("  ttl_minutes = {}", config.lock_ttl().as_secs() / 60);
            println!("[evidence]");
            println!("  extensions = {:?}", config.evidence_extensions());
            println!("[gate]");
            println!("  require_verifier = {}", config.require_verifier());
            println!("[commands]");
            show_command("executor", config.executor_command());
            show_command("reviewer", config.reviewer_command());
            show_command("verifier", config.verifier_command());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.settings().validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }
    Ok(())
}

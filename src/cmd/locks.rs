//! Worker lock commands: `autopilot locks`.

use anyhow::Result;
use autopilot::config::Config;
use autopilot::locks::LockManager;

use super::super::LocksCommands;

pub fn cmd_locks(config: &Config, command: LocksCommands) -> Result<()> {
    let manager = LockManager::new(&config.locks_dir, config.lock_ttl());

    match command {
        LocksCommands::Acquire { owner } => {
            let path = manager.acquire(&owner)?.persist();
            println!("Acquired lock for {} at {}", owner, path.display());
        }
        LocksCommands::Release { owner } => {
            if manager.release(&owner)? {
                println!("Released lock for {}", owner);
            } else {
                println!("No lock held for {}", owner);
            }
        }
        LocksCommands::List => {
            let locks = manager.list()?;
            if locks.is_empty() {
                println!("No locks.");
            }
            for (owner, age) in locks {
                let minutes = age.as_secs() / 60;
                let line = format!("{:<24} {} min", owner, minutes);
                if age > manager.ttl() {
                    println!("{}", console::style(format!("{line} (stale)")).yellow());
                } else {
                    println!("{}", line);
                }
            }
        }
        LocksCommands::Sweep { .. } => {
            let removed = manager.sweep(manager.ttl())?;
            if removed.is_empty() {
                println!("No stale locks.");
            } else {
                println!("Removed {} stale lock(s):", removed.len());
                for owner in removed {
                    println!("  {}", owner);
                }
            }
        }
    }
    Ok(())
}

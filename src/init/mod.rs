//! Project initialization for autopilot.
//!
//! `autopilot init` lays out the directories and files the orchestrator
//! expects, using the paths from `ops/autopilot.toml` when one exists:
//!
//! ```text
//! ops/
//! ├── autopilot.toml     # configuration (written with defaults)
//! ├── queue.jsonl        # task registry (empty)
//! └── locks/             # worker lock markers
//! docs/
//! ├── runs/              # run reports, scanned for evidence
//! └── orchestrator/reviews/
//! logs/
//! ```
//!
//! Running it again never overwrites existing files.

use crate::autopilot_config::{AutopilotToml, config_path};
use crate::config::Config;
use crate::registry::TaskRegistry;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub config_file: PathBuf,
    pub registry_file: PathBuf,
    /// Whether the configuration file was written by this call
    pub created_config: bool,
    /// Whether the registry file was written by this call
    pub created_registry: bool,
}

impl InitResult {
    pub fn created_anything(&self) -> bool {
        self.created_config || self.created_registry
    }
}

pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    std::fs::create_dir_all(project_dir)
        .with_context(|| format!("Failed to create directory: {}", project_dir.display()))?;

    let config_file = config_path(project_dir);
    let created_config = !config_file.exists();
    let settings = AutopilotToml::load_or_default(project_dir)?;

    let config = Config::from_settings(project_dir.to_path_buf(), false, settings.clone());
    config.ensure_directories()?;

    if created_config {
        if let Some(parent) = config_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        settings.save(&config_file)?;
    }

    let registry = TaskRegistry::new(&config.registry_file);
    let created_registry = registry.create_empty()?;

    Ok(InitResult {
        config_file,
        registry_file: config.registry_file,
        created_config,
        created_registry,
    })
}

/// Whether `init` has run for this project.
pub fn is_initialized(project_dir: &Path) -> bool {
    config_path(project_dir).exists()
}

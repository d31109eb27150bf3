//! Project initialization: `autopilot init`.

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use autopilot::init::{init_project, is_initialized};

    let was_initialized = is_initialized(project_dir);
    let result = init_project(project_dir)?;

    if was_initialized && !result.created_anything() {
        println!(
            "Autopilot project already initialized at {}",
            project_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(());
    }

    println!("Initialized autopilot project at {}", project_dir.display());
    println!();
    println!("  config:   {}", result.config_file.display());
    println!("  registry: {}", result.registry_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Add tasks to the registry, one JSON object per line");
    println!("  2. Set [executor] command in the config file");
    println!("  3. Run `autopilot run` to start the loop");
    Ok(())
}

use anyhow::{Context, Result};
use autopilot::config::{CliOverrides, Config};
use autopilot::task::TaskStatus;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(version, about = "Dependency-aware task lifecycle orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the registry, lock, evidence and log layout
    Init,
    /// List tasks grouped by status
    List {
        /// Only show tasks with this status
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Show task counts per status
    Status,
    /// Set a task's status
    Set {
        id: String,
        status: TaskStatus,
        /// Allow transitions the lifecycle does not permit
        #[arg(long)]
        force: bool,
    },
    /// Pick the next ready task and reserve it
    Next,
    /// Manage worker locks
    Locks {
        #[command(subcommand)]
        command: LocksCommands,
    },
    /// Reset in-progress tasks without evidence back to todo
    SweepStuck,
    /// Regenerate the PROGRESS.md and TODO_MASTER.md reports
    Progress,
    /// Evaluate the acceptance gate for a task and apply the result
    Gate {
        id: String,
        /// Known verification result; `auto` reruns the verifier
        #[arg(long, value_enum, default_value = "auto")]
        verification: VerificationArg,
        /// Read review text from this file instead of the configured reviewer
        #[arg(long)]
        review_file: Option<PathBuf>,
    },
    /// Gate every pending task that has evidence
    ReviewPending,
    /// Show the gate decision log
    Decisions {
        /// Only show decisions for this task
        #[arg(long)]
        task: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Run the supervisory loop
    Run {
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long)]
        cooldown_secs: Option<u64>,
    },
}

#[derive(Subcommand, Clone)]
pub enum LocksCommands {
    /// Take the lock for an owner and leave it in place
    Acquire { owner: String },
    /// Remove the lock for an owner
    Release { owner: String },
    /// List current locks with their age
    List,
    /// Remove locks older than the TTL
    Sweep {
        #[arg(long)]
        ttl_minutes: Option<u64>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VerificationArg {
    Pass,
    Fail,
    Auto,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let project_dir = match cli.root.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    if let Commands::Init = cli.command {
        let _guard = autopilot::logging::init(cli.verbose, None);
        return cmd::cmd_init(&project_dir);
    }

    let overrides = match &cli.command {
        Commands::Run {
            max_iterations,
            cooldown_secs,
        } => CliOverrides {
            max_iterations: *max_iterations,
            cooldown_secs: *cooldown_secs,
            ..Default::default()
        },
        Commands::Locks {
            command: LocksCommands::Sweep { ttl_minutes },
        } => CliOverrides {
            lock_ttl_minutes: *ttl_minutes,
            ..Default::default()
        },
        _ => CliOverrides::default(),
    };
    let config = Config::new(project_dir, cli.verbose, overrides)?;

    let log_dir = matches!(cli.command, Commands::Run { .. }).then_some(config.log_dir.as_path());
    let _guard = autopilot::logging::init(cli.verbose, log_dir);

    match &cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::List { status } => cmd::cmd_list(&config, *status)?,
        Commands::Status => cmd::cmd_status(&config)?,
        Commands::Set { id, status, force } => cmd::cmd_set(&config, id, *status, *force)?,
        Commands::Next => cmd::cmd_next(&config)?,
        Commands::Locks { command } => cmd::cmd_locks(&config, command.clone())?,
        Commands::SweepStuck => cmd::cmd_sweep_stuck(&config)?,
        Commands::Progress => cmd::cmd_progress(&config)?,
        Commands::Gate {
            id,
            verification,
            review_file,
        } => cmd::cmd_gate(&config, id, *verification, review_file.as_deref()).await?,
        Commands::ReviewPending => cmd::cmd_review_pending(&config).await?,
        Commands::Decisions { task } => cmd::cmd_decisions(&config, task.as_deref())?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
        Commands::Run { .. } => cmd::cmd_run(&config).await?,
    }

    Ok(())
}

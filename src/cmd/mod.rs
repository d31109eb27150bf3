//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                        |
//! |------------|---------------------------------------------------------|
//! | `project`  | `Init`                                                  |
//! | `tasks`    | `List`, `Status`, `Set`, `Next`, `SweepStuck`, `Progress` |
//! | `locks`    | `Locks`                                                 |
//! | `gate`     | `Gate`, `ReviewPending`, `Decisions`                    |
//! | `config`   | `Config`                                                |
//! | `run`      | `Run`                                                   |

pub mod config;
pub mod gate;
pub mod locks;
pub mod project;
pub mod run;
pub mod tasks;

pub use config::cmd_config;
pub use gate::{cmd_decisions, cmd_gate, cmd_review_pending};
pub use locks::cmd_locks;
pub use project::cmd_init;
pub use run::cmd_run;
pub use tasks::{cmd_list, cmd_next, cmd_progress, cmd_set, cmd_status, cmd_sweep_stuck};

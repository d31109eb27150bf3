pub mod audit;
pub mod autopilot_config;
pub mod config;
pub mod errors;
pub mod evidence;
pub mod gates;
pub mod init;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod signals;
pub mod task;

pub mod audit;
pub mod config;
pub mod prune;
pub mod status;
pub mod sync;

/// Commands return the process exit code; setup errors bubble to main.
pub type CommandResult = Result<i32, Box<dyn std::error::Error>>;

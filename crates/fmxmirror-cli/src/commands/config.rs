//! Configuration management.

use clap::Subcommand;
use fmxmirror_core::config::{Config, API_KEY_ENV};

use super::CommandResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration (api key redacted)
    Show,
}

pub fn run(action: ConfigAction) -> CommandResult {
    match action {
        ConfigAction::Init => init(),
        ConfigAction::Show => show(),
    }
}

fn init() -> CommandResult {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(0);
    }

    std::fs::write(&path, Config::default_toml())?;
    println!("Wrote {}", path.display());
    println!("Fill in remote.calendar_id and set {API_KEY_ENV} before syncing");
    Ok(0)
}

fn show() -> CommandResult {
    let mut config = Config::load_lenient()?;
    if !config.remote.api_key.is_empty() {
        config.remote.api_key = "<redacted>".into();
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(0)
}

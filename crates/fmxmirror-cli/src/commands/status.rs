//! Ledger statistics.

use fmxmirror_core::config::Config;
use fmxmirror_core::ledger::Ledger;

use super::CommandResult;

pub fn run() -> CommandResult {
    let config = Config::load_lenient()?;
    let path = config.ledger.resolved_path()?;
    let ledger = Ledger::open(&path)?;
    let stats = ledger.stats()?;

    println!("Ledger: {}", path.display());
    println!(
        "  {} records, {} tracked, {} retracted",
        stats.total, stats.tracked, stats.retracted
    );
    Ok(0)
}

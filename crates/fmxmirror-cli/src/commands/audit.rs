//! Ledger/remote consistency report.

use fmxmirror_core::apprise::ApiClient;
use fmxmirror_core::config::Config;
use fmxmirror_core::ledger::Ledger;
use fmxmirror_core::sync::audit;

use super::CommandResult;

pub async fn run() -> CommandResult {
    let config = Config::load()?;
    let remote = ApiClient::new(&config.remote)?;
    let ledger = Ledger::open(&config.ledger.resolved_path()?)?;

    let report = audit(&remote, &ledger).await?;

    if report.is_clean() {
        println!("Ledger and remote agree");
        return Ok(0);
    }

    if !report.orphan_remote.is_empty() {
        println!("Remote events with no live ledger record (adopt or delete):");
        for event in &report.orphan_remote {
            println!("  {}  {}  {}", event.id, event.start_date, event.title);
        }
    }
    if !report.missing_remote.is_empty() {
        println!("Ledger records whose remote event is gone:");
        for id in &report.missing_remote {
            println!("  {id}");
        }
    }

    Ok(1)
}

//! One reconciliation pass: fetch source events, reconcile, report.

use fmxmirror_core::apprise::ApiClient;
use fmxmirror_core::config::{data_dir, Config};
use fmxmirror_core::fmx::FmxClient;
use fmxmirror_core::ledger::Ledger;
use fmxmirror_core::runlock::RunLock;
use fmxmirror_core::sync::{Action, Outcome, SyncEngine};

use super::CommandResult;

pub async fn run(dry_run: bool) -> CommandResult {
    let config = Config::load()?;
    let _lock = RunLock::acquire_in(&data_dir()?)?;

    let source = FmxClient::new(&config.source)?;
    let remote = ApiClient::new(&config.remote)?;
    let ledger = Ledger::open(&config.ledger.resolved_path()?)?;

    // Setup phase ends here: anything above failing is fatal to the run.
    let events = source.retrieve_events().await?;
    println!("Fetched {} source events", events.len());

    let engine = SyncEngine::new(&remote, &ledger);

    if dry_run {
        let plan = engine.plan(&events)?;
        let mut pending = 0;
        for planned in &plan {
            let label = match &planned.action {
                Action::Create => "create",
                Action::Update { .. } => "update",
                Action::Retract { .. } => "retract",
                Action::Skip => continue,
            };
            pending += 1;
            println!("  would {label}: {} ({})", planned.title, planned.key);
        }
        println!("{pending} pending changes, {} in sync", plan.len() - pending);
        return Ok(0);
    }

    let summary = engine.run_pass(&events).await?;

    for result in &summary.results {
        match result.outcome.error_detail() {
            Some(detail) => eprintln!(
                "  {}: {} ({}) -- {}",
                result.outcome.label(),
                result.title,
                result.key,
                detail
            ),
            None if result.outcome != Outcome::Unchanged => println!(
                "  {}: {} ({})",
                result.outcome.label(),
                result.title,
                result.key
            ),
            None => {}
        }
    }

    println!(
        "{} created, {} updated, {} retracted, {} unchanged, {} failed",
        summary.created, summary.updated, summary.retracted, summary.unchanged, summary.failed
    );

    let hazards = summary.hazards().count();
    if hazards > 0 {
        eprintln!(
            "WARNING: {hazards} reconciliation hazard(s): ledger and remote may disagree; run `fmxmirror audit`"
        );
    }

    Ok(if summary.has_failures() { 1 } else { 0 })
}

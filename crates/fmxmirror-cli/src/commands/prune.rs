//! Retention sweep over the remote calendar.

use chrono::{Duration, Utc};
use fmxmirror_core::apprise::ApiClient;
use fmxmirror_core::config::Config;
use fmxmirror_core::sync::prune;

use super::CommandResult;

pub async fn run(older_than_days: i64, dry_run: bool) -> CommandResult {
    let config = Config::load()?;
    let remote = ApiClient::new(&config.remote)?;

    let cutoff = Utc::now() - Duration::days(older_than_days);
    println!("Removing remote events that started before {cutoff}");

    let summary = prune(&remote, cutoff, dry_run).await?;

    if dry_run {
        println!(
            "{} of {} events would be deleted",
            summary.deleted, summary.examined
        );
    } else {
        println!("Deleted {} of {} events", summary.deleted, summary.examined);
    }
    for (id, error) in &summary.failed {
        eprintln!("  failed to delete {id}: {error}");
    }

    Ok(if summary.has_failures() { 1 } else { 0 })
}

//! Per-key outcomes and the run summary.

use std::fmt;

use serde::Serialize;

use crate::event::NaturalKey;

/// Terminal state of one natural key after a reconciliation pass.
///
/// Failed variants carry a human-readable error detail; the summary stays
/// deterministic because the detail is derived only from the inputs and
/// the remote's response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Created,
    Updated,
    Retracted,
    Unchanged,
    CreateFailed(String),
    UpdateFailed(String),
    RetractFailed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::CreateFailed(_) | Outcome::UpdateFailed(_) | Outcome::RetractFailed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Retracted => "retracted",
            Outcome::Unchanged => "unchanged",
            Outcome::CreateFailed(_) => "create-failed",
            Outcome::UpdateFailed(_) => "update-failed",
            Outcome::RetractFailed(_) => "retract-failed",
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Outcome::CreateFailed(detail)
            | Outcome::UpdateFailed(detail)
            | Outcome::RetractFailed(detail) => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_detail() {
            Some(detail) => write!(f, "{}: {}", self.label(), detail),
            None => f.write_str(self.label()),
        }
    }
}

/// Outcome of one natural key, as reported to the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyResult {
    pub key: NaturalKey,
    pub title: String,
    pub outcome: Outcome,
    /// Remote and ledger state may now disagree for this key; see the
    /// audit command.
    pub hazard: bool,
}

/// Aggregated result of one reconciliation pass, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub results: Vec<KeyResult>,
    pub created: usize,
    pub updated: usize,
    pub retracted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_results(results: Vec<KeyResult>) -> Self {
        let mut summary = RunSummary {
            results,
            ..Default::default()
        };
        for result in &summary.results {
            match result.outcome {
                Outcome::Created => summary.created += 1,
                Outcome::Updated => summary.updated += 1,
                Outcome::Retracted => summary.retracted += 1,
                Outcome::Unchanged => summary.unchanged += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn hazards(&self) -> impl Iterator<Item = &KeyResult> {
        self.results.iter().filter(|result| result.hazard)
    }
}

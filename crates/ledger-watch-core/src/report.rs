//! Reconciliation reporting.
//!
//! Pure read side: loads a completed (or failed) run with its
//! discrepancies and folds them into the summary operators see.

use crate::{
    reconciliation::{
        Discrepancy, ReconciliationError, ReconciliationRun, ReconciliationStore, RunId, Severity,
    },
    ResourceId,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Structured summary of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub run: ReconciliationRun,
    pub open_discrepancies: usize,
    pub resolved_discrepancies: usize,
    /// Discrepancy counts keyed by severity label
    pub by_severity: BTreeMap<String, usize>,
    /// Per-resource breakdown, worst severity first
    pub by_resource: Vec<ResourceBreakdown>,
    pub discrepancies: Vec<Discrepancy>,
}

/// Discrepancy rollup for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceBreakdown {
    pub resource_id: ResourceId,
    pub discrepancy_count: usize,
    pub worst_severity: Severity,
}

/// Errors from report generation
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Run not found: {id}")]
    RunNotFound { id: RunId },

    #[error("Reconciliation store error: {0}")]
    Store(#[from] ReconciliationError),
}

/// Build the report for a run. No side effects.
pub async fn generate_report(
    store: &dyn ReconciliationStore,
    run_id: &RunId,
) -> Result<ReconciliationReport, ReportError> {
    let run = store
        .get_run(run_id)
        .await?
        .ok_or(ReportError::RunNotFound { id: *run_id })?;

    let discrepancies = store.list_discrepancies_for_run(run_id).await?;

    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_resource: BTreeMap<ResourceId, (usize, Severity)> = BTreeMap::new();
    let mut open = 0;
    let mut resolved = 0;

    for discrepancy in &discrepancies {
        if discrepancy.resolved {
            resolved += 1;
        } else {
            open += 1;
        }

        *by_severity
            .entry(discrepancy.severity.as_str().to_string())
            .or_insert(0) += 1;

        per_resource
            .entry(discrepancy.resource_id.clone())
            .and_modify(|(count, worst)| {
                *count += 1;
                if discrepancy.severity > *worst {
                    *worst = discrepancy.severity;
                }
            })
            .or_insert((1, discrepancy.severity));
    }

    let mut by_resource: Vec<ResourceBreakdown> = per_resource
        .into_iter()
        .map(|(resource_id, (discrepancy_count, worst_severity))| ResourceBreakdown {
            resource_id,
            discrepancy_count,
            worst_severity,
        })
        .collect();
    by_resource.sort_by(|a, b| b.worst_severity.cmp(&a.worst_severity));

    Ok(ReconciliationReport {
        run,
        open_discrepancies: open,
        resolved_discrepancies: resolved,
        by_severity,
        by_resource,
        discrepancies,
    })
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;

//! Report lifecycle: submission, state changes and deletion.
//!
//! Transitions are permissive: any state may be set from any other, and
//! concurrent changes from several clients are not coordinated (last
//! writer wins).

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::location::BoundingBox;
use crate::models::report::{NewReport, Report, ReportState};
use crate::store::{Persistence, Source, Sourced};

/// Result of [`ReportCoordinator::set_state`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The backend accepted the change; this is its representation.
    Confirmed(Report),
    /// The backend was unreachable. The change lives in the local mirror only.
    Pending { report: Report, error: AppError },
}

impl TransitionOutcome {
    pub fn report(&self) -> &Report {
        match self {
            TransitionOutcome::Confirmed(report) => report,
            TransitionOutcome::Pending { report, .. } => report,
        }
    }

    pub fn into_report(self) -> Report {
        match self {
            TransitionOutcome::Confirmed(report) => report,
            TransitionOutcome::Pending { report, .. } => report,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TransitionOutcome::Pending { error, .. } if error.is_retryable())
    }
}

pub struct ReportCoordinator {
    store: Arc<Persistence>,
    region: BoundingBox,
}

impl ReportCoordinator {
    pub fn new(store: Arc<Persistence>, region: BoundingBox) -> Self {
        Self { store, region }
    }

    /// Validates and stores a citizen submission as a new report.
    pub async fn submit(&self, form: NewReport) -> Result<Sourced<Report>> {
        form.validate(&self.region)?;
        let report = form.into_report(Uuid::new_v4().to_string(), Utc::now());
        info!("[REPORTS] Submitting report {} ({})", report.id, report.category);
        self.store.create(report).await
    }

    pub async fn set_state(&self, report: &Report, new_state: ReportState) -> Result<TransitionOutcome> {
        info!("[REPORTS] {} -> {} for report {}", report.state, new_state, report.id);
        let sourced = self
            .store
            .update::<Report>(&report.id, json!({ "state": new_state }))
            .await?;

        match sourced.source {
            Source::Remote => {
                let confirmed = sourced.data.unwrap_or_else(|| with_state(report, new_state));
                Ok(TransitionOutcome::Confirmed(confirmed))
            }
            Source::Local(reason) => {
                let optimistic = match sourced.data {
                    Some(patched) => patched,
                    None => {
                        let optimistic = with_state(report, new_state);
                        self.store.remember(&optimistic).await?;
                        optimistic
                    }
                };
                warn!("[REPORTS] State of {} saved locally only: {}", report.id, reason);
                Ok(TransitionOutcome::Pending {
                    report: optimistic,
                    error: AppError::Network(reason),
                })
            }
        }
    }

    /// Deletes a report. The caller must have obtained the user's confirmation.
    pub async fn delete_report(&self, id: &str) -> Result<Sourced<bool>> {
        info!("[REPORTS] Deleting report {}", id);
        self.store.remove::<Report>(id).await
    }
}

fn with_state(report: &Report, state: ReportState) -> Report {
    Report {
        state,
        ..report.clone()
    }
}

/// Replaces the report with the same id in `reports`, keeping its position.
pub fn apply(reports: &mut [Report], updated: &Report) -> bool {
    match reports.iter_mut().find(|report| report.id == updated.id) {
        Some(slot) => {
            *slot = updated.clone();
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub state: ReportState,
    pub at: DateTime<FixedOffset>,
    pub description: &'static str,
}

/// Timeline shown on the detail page, synthesized from the creation time
/// and current state: review one day after creation, resolution after a week.
pub fn state_history(report: &Report) -> Vec<HistoryEntry> {
    let Some(created) = report.created() else {
        return Vec::new();
    };
    let mut history = vec![HistoryEntry {
        state: ReportState::Nuevo,
        at: created,
        description: "Reporte creado por el ciudadano",
    }];
    if report.state >= ReportState::EnRevision {
        history.push(HistoryEntry {
            state: ReportState::EnRevision,
            at: created + Duration::hours(24),
            description: "Reporte en proceso de evaluación",
        });
    }
    if report.state == ReportState::Atendido {
        history.push(HistoryEntry {
            state: ReportState::Atendido,
            at: created + Duration::days(7),
            description: "Problema resuelto satisfactoriamente",
        });
    }
    history
}

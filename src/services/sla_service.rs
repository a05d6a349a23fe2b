use crate::{
    config::Settings,
    error::ApiError,
    models::{ActivityCreate, ActivityType, BacklogEntry, RiskLevel, SlaHistoryCreate},
    repositories::BacklogRepository,
    services::{AuditService, Clock, MatrixService},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Result of one breach-detection sweep.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SlaSweepResult {
    pub scanned: i64,
    pub newly_breached: i64,
    pub errors: Vec<String>,
}

/// Deadline and breach computation. The sweep is caller-driven; this
/// service never schedules itself.
pub struct SlaService {
    backlog_repo: Arc<dyn BacklogRepository + Send + Sync>,
    matrix_service: Arc<MatrixService>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    settings: Arc<Settings>,
}

impl SlaService {
    pub fn new(
        backlog_repo: Arc<dyn BacklogRepository + Send + Sync>,
        matrix_service: Arc<MatrixService>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            backlog_repo,
            matrix_service,
            audit,
            clock,
            settings,
        }
    }

    pub async fn calculate_deadline(
        &self,
        from: DateTime<Utc>,
        level: RiskLevel,
    ) -> Result<DateTime<Utc>, ApiError> {
        let hours = self.matrix_service.sla_hours_for_level(level).await?;
        Ok(from + Duration::hours(hours))
    }

    pub async fn is_breached(
        &self,
        created: DateTime<Utc>,
        level: RiskLevel,
        resolved: Option<DateTime<Utc>>,
    ) -> Result<bool, ApiError> {
        let deadline = self.calculate_deadline(created, level).await?;
        let reference = resolved.unwrap_or_else(|| self.clock.now());
        Ok(reference > deadline)
    }

    /// Periodic breach sweep, invoked by an external job trigger with an
    /// explicit actor (the reserved system principal in production). Sets
    /// the monotonic breach flag on overdue non-terminal entries and
    /// appends one SlaBreach activity plus one SLA history record per
    /// newly flagged entry. Re-running selects nothing new, so the sweep
    /// is idempotent.
    pub async fn update_sla_status(&self, actor: Uuid) -> Result<SlaSweepResult, ApiError> {
        let now = self.clock.now();
        let candidates = self.backlog_repo.list_breach_candidates(now).await?;

        let mut result = SlaSweepResult {
            scanned: candidates.len() as i64,
            ..Default::default()
        };

        for entry in candidates {
            match self.backlog_repo.mark_sla_breached(&entry.id, now).await {
                // A user-driven transition may have raced us and set the
                // flag first; last write wins for this signal.
                Ok(false) => continue,
                Ok(true) => {
                    result.newly_breached += 1;

                    self.audit
                        .record(ActivityCreate {
                            entry_id: entry.id,
                            activity_type: ActivityType::SlaBreach,
                            from_value: Some("false".to_string()),
                            to_value: Some("true".to_string()),
                            description: format!(
                                "SLA breached: entry {} was due {}",
                                entry.entry_number, entry.due_date
                            ),
                            actor_id: actor,
                        })
                        .await;

                    self.audit
                        .record_sla_breach(SlaHistoryCreate {
                            entry_id: entry.id,
                            risk_level: entry.priority.into(),
                            deadline: entry.due_date,
                            breached_at: now,
                            recorded_by: actor,
                        })
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        entry_id = %entry.id,
                        error = %e,
                        "failed to flag SLA breach, continuing sweep"
                    );
                    if result.errors.len() < 10 {
                        result.errors.push(format!("{}: {}", entry.entry_number, e));
                    }
                }
            }
        }

        tracing::info!(
            scanned = result.scanned,
            newly_breached = result.newly_breached,
            "SLA sweep completed"
        );

        Ok(result)
    }

    pub async fn overdue(&self) -> Result<Vec<BacklogEntry>, ApiError> {
        self.backlog_repo.list_overdue(self.clock.now()).await
    }

    pub async fn due_soon(&self) -> Result<Vec<BacklogEntry>, ApiError> {
        self.backlog_repo
            .list_due_within(self.clock.now(), self.settings.due_soon_window_hours)
            .await
    }
}

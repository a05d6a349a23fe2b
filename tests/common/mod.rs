//! In-memory fakes behind the same repository traits the Sqlx
//! implementations use, so the full workflow can be driven without a
//! database.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use riskdesk_backend::config::Settings;
use riskdesk_backend::error::ApiError;
use riskdesk_backend::models::*;
use riskdesk_backend::repositories::{
    AuditRepository, BacklogRepository, MatrixRepository, RiskDirectory, UserDirectory,
};
use riskdesk_backend::services::{
    AuditService, Clock, FixedClock, MatrixService, RiskMaterializer, SlaService, WorkflowService,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ---------------------------------------------------------------- backlog

#[derive(Default)]
pub struct InMemoryBacklogRepository {
    entries: Mutex<HashMap<Uuid, BacklogEntry>>,
    conflict_next_update: AtomicBool,
}

impl InMemoryBacklogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates a stored entry directly, bypassing the version guard. Used
    /// to set up corrupted or concurrent states.
    pub fn tamper(&self, id: &Uuid, f: impl FnOnce(&mut BacklogEntry)) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(id) {
            f(entry);
        }
    }

    /// The next update_guarded call fails with a concurrency conflict.
    pub fn conflict_on_next_update(&self) {
        self.conflict_next_update.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BacklogRepository for InMemoryBacklogRepository {
    async fn create(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError> {
        let mut entries = self.entries.lock().unwrap();
        if entries
            .values()
            .any(|e| e.entry_number == entry.entry_number)
        {
            return Err(ApiError::internal(format!(
                "duplicate entry number {}",
                entry.entry_number
            )));
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry.clone())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<BacklogEntry>, ApiError> {
        Ok(self.entries.lock().unwrap().get(id).cloned())
    }

    async fn update_guarded(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError> {
        if self.conflict_next_update.swap(false, Ordering::SeqCst) {
            return Err(ApiError::concurrency_conflict(format!(
                "backlog entry {} was modified concurrently",
                entry.entry_number
            )));
        }

        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&entry.id) {
            None => Err(ApiError::not_found(format!(
                "backlog entry {} not found",
                entry.id
            ))),
            Some(stored) if stored.version != entry.version => {
                Err(ApiError::concurrency_conflict(format!(
                    "backlog entry {} was modified concurrently (stale version {})",
                    entry.entry_number, entry.version
                )))
            }
            Some(stored) => {
                let mut updated = entry.clone();
                updated.version = stored.version + 1;
                *stored = updated.clone();
                Ok(updated)
            }
        }
    }

    async fn entry_number_exists(&self, entry_number: &str) -> Result<bool, ApiError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .any(|e| e.entry_number == entry_number))
    }

    async fn count_created_in_year(&self, year: i32) -> Result<i64, ApiError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.created_at.year() == year)
            .count() as i64)
    }

    async fn filter(&self, filter: &BacklogFilter) -> Result<BacklogListResponse, ApiError> {
        let entries = self.entries.lock().unwrap();
        let mut matched: Vec<BacklogEntry> = entries
            .values()
            .filter(|e| {
                filter
                    .statuses
                    .as_ref()
                    .map_or(true, |s| s.is_empty() || s.contains(&e.status))
                    && filter
                        .actions
                        .as_ref()
                        .map_or(true, |a| a.is_empty() || a.contains(&e.action))
                    && filter
                        .priorities
                        .as_ref()
                        .map_or(true, |p| p.is_empty() || p.contains(&e.priority))
                    && filter.requester_id.map_or(true, |id| e.requester_id == id)
                    && filter.analyst_id.map_or(true, |id| e.analyst_id == Some(id))
                    && filter.manager_id.map_or(true, |id| e.manager_id == Some(id))
                    && (!filter.breached_only || e.sla_breached)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_count = matched.len() as i64;
        let entries = matched
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(1) as usize)
            .collect();

        Ok(BacklogListResponse {
            entries,
            total_count,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<BacklogEntry>, ApiError> {
        let mut result: Vec<BacklogEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.due_date < now && !e.status.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|e| e.due_date);
        Ok(result)
    }

    async fn list_due_within(
        &self,
        now: DateTime<Utc>,
        window_hours: i64,
    ) -> Result<Vec<BacklogEntry>, ApiError> {
        let until = now + chrono::Duration::hours(window_hours);
        let mut result: Vec<BacklogEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.due_date >= now && e.due_date <= until && !e.status.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|e| e.due_date);
        Ok(result)
    }

    async fn list_breach_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BacklogEntry>, ApiError> {
        let mut result: Vec<BacklogEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.due_date < now && !e.sla_breached && !e.status.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|e| e.due_date);
        Ok(result)
    }

    async fn mark_sla_breached(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, ApiError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(id) {
            Some(entry) if !entry.sla_breached => {
                entry.sla_breached = true;
                entry.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn statistics(&self, now: DateTime<Utc>) -> Result<BacklogStatistics, ApiError> {
        let entries = self.entries.lock().unwrap();
        let mut by_status: HashMap<String, i64> = HashMap::new();
        let mut by_priority: HashMap<String, i64> = HashMap::new();
        let mut by_action: HashMap<String, i64> = HashMap::new();

        for entry in entries.values() {
            *by_status.entry(entry.status.to_string()).or_insert(0) += 1;
            *by_priority.entry(entry.priority.to_string()).or_insert(0) += 1;
            *by_action.entry(entry.action.to_string()).or_insert(0) += 1;
        }

        Ok(BacklogStatistics {
            total: entries.len() as i64,
            by_status,
            by_priority,
            by_action,
            overdue: entries
                .values()
                .filter(|e| e.due_date < now && !e.status.is_terminal())
                .count() as i64,
            sla_breached: entries.values().filter(|e| e.sla_breached).count() as i64,
        })
    }
}

// ---------------------------------------------------------------- matrix

#[derive(Default)]
pub struct InMemoryMatrixRepository {
    matrices: Mutex<HashMap<Uuid, RiskMatrix>>,
    cells: Mutex<Vec<RiskMatrixCell>>,
}

impl InMemoryMatrixRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatrixRepository for InMemoryMatrixRepository {
    async fn create(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError> {
        self.matrices
            .lock()
            .unwrap()
            .insert(matrix.id, matrix.clone());
        Ok(matrix.clone())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<RiskMatrix>, ApiError> {
        Ok(self.matrices.lock().unwrap().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<RiskMatrix>, ApiError> {
        Ok(self.matrices.lock().unwrap().values().cloned().collect())
    }

    async fn update(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError> {
        let mut matrices = self.matrices.lock().unwrap();
        match matrices.get_mut(&matrix.id) {
            Some(stored) => {
                *stored = matrix.clone();
                Ok(matrix.clone())
            }
            None => Err(ApiError::not_found(format!(
                "risk matrix {} not found",
                matrix.id
            ))),
        }
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError> {
        self.cells.lock().unwrap().retain(|c| c.matrix_id != *id);
        Ok(self.matrices.lock().unwrap().remove(id).is_some())
    }

    async fn get_default_active(&self) -> Result<Option<RiskMatrix>, ApiError> {
        Ok(self
            .matrices
            .lock()
            .unwrap()
            .values()
            .find(|m| m.is_default && m.is_active)
            .cloned())
    }

    async fn set_default(&self, id: &Uuid) -> Result<RiskMatrix, ApiError> {
        let mut matrices = self.matrices.lock().unwrap();
        if !matrices.contains_key(id) {
            return Err(ApiError::not_found(format!("risk matrix {} not found", id)));
        }
        for matrix in matrices.values_mut() {
            matrix.is_default = false;
        }
        let matrix = matrices.get_mut(id).unwrap();
        matrix.is_default = true;
        matrix.is_active = true;
        Ok(matrix.clone())
    }

    async fn replace_cells(
        &self,
        matrix_id: &Uuid,
        cells: &[RiskMatrixCell],
    ) -> Result<(), ApiError> {
        let mut stored = self.cells.lock().unwrap();
        stored.retain(|c| c.matrix_id != *matrix_id);
        stored.extend_from_slice(cells);
        Ok(())
    }

    async fn get_cell(
        &self,
        matrix_id: &Uuid,
        impact_index: i32,
        likelihood_index: i32,
        exposure_index: Option<i32>,
    ) -> Result<Option<RiskMatrixCell>, ApiError> {
        Ok(self
            .cells
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.matrix_id == *matrix_id
                    && c.impact_index == impact_index
                    && c.likelihood_index == likelihood_index
                    && c.exposure_index == exposure_index
            })
            .cloned())
    }

    async fn list_cells(&self, matrix_id: &Uuid) -> Result<Vec<RiskMatrixCell>, ApiError> {
        Ok(self
            .cells
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.matrix_id == *matrix_id)
            .cloned()
            .collect())
    }

    async fn count_cells(&self, matrix_id: &Uuid) -> Result<i64, ApiError> {
        Ok(self
            .cells
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.matrix_id == *matrix_id)
            .count() as i64)
    }
}

// ---------------------------------------------------------------- risks

#[derive(Default)]
pub struct InMemoryRiskDirectory {
    risks: Mutex<HashMap<Uuid, Risk>>,
}

impl InMemoryRiskDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.risks.lock().unwrap().len()
    }

    pub fn insert(&self, risk: Risk) {
        self.risks.lock().unwrap().insert(risk.id, risk);
    }
}

#[async_trait]
impl RiskDirectory for InMemoryRiskDirectory {
    async fn create_risk(
        &self,
        candidate: &RiskCandidate,
        risk_number: &str,
    ) -> Result<Risk, ApiError> {
        let now = Utc::now();
        let risk = Risk {
            id: Uuid::new_v4(),
            risk_number: risk_number.to_string(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            asset: candidate.asset.clone(),
            business_unit: candidate.business_unit.clone(),
            owner_id: candidate.owner_id,
            impact: candidate.impact,
            likelihood: candidate.likelihood,
            exposure: candidate.exposure,
            inherent_level: candidate.inherent_level,
            status: RiskStatus::Open,
            source: candidate.source,
            created_at: now,
            updated_at: now,
        };
        self.risks.lock().unwrap().insert(risk.id, risk.clone());
        Ok(risk)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Risk>, ApiError> {
        Ok(self.risks.lock().unwrap().get(id).cloned())
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError> {
        Ok(self.risks.lock().unwrap().remove(id).is_some())
    }

    async fn next_risk_number(&self) -> Result<String, ApiError> {
        Ok(format!("R-{:04}", self.risks.lock().unwrap().len() + 1))
    }
}

// ---------------------------------------------------------------- audit

#[derive(Default)]
pub struct InMemoryAuditRepository {
    activities: Mutex<Vec<Activity>>,
    comments: Mutex<Vec<Comment>>,
    sla_history: Mutex<Vec<SlaHistory>>,
    fail_writes: AtomicBool,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every append fail, to exercise the swallow-on-failure contract.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn insert_activity(&self, activity: &ActivityCreate) -> Result<Activity, ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::internal("audit store unavailable"));
        }
        let record = Activity {
            id: Uuid::new_v4(),
            entry_id: activity.entry_id,
            activity_type: activity.activity_type,
            from_value: activity.from_value.clone(),
            to_value: activity.to_value.clone(),
            description: activity.description.clone(),
            actor_id: activity.actor_id,
            created_at: Utc::now(),
        };
        self.activities.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_activities(&self, entry_id: &Uuid) -> Result<Vec<Activity>, ApiError> {
        Ok(self
            .activities
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.entry_id == *entry_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(
        &self,
        entry_id: &Uuid,
        comment: &CommentCreate,
    ) -> Result<Comment, ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::internal("audit store unavailable"));
        }
        let record = Comment {
            id: Uuid::new_v4(),
            entry_id: *entry_id,
            author_id: comment.author_id,
            body: comment.body.clone(),
            is_internal: comment.is_internal,
            created_at: Utc::now(),
        };
        self.comments.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_comments(
        &self,
        entry_id: &Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, ApiError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.entry_id == *entry_id && (include_internal || !c.is_internal))
            .cloned()
            .collect())
    }

    async fn insert_sla_history(&self, record: &SlaHistoryCreate) -> Result<SlaHistory, ApiError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::internal("audit store unavailable"));
        }
        let row = SlaHistory {
            id: Uuid::new_v4(),
            entry_id: record.entry_id,
            risk_level: record.risk_level,
            deadline: record.deadline,
            breached_at: record.breached_at,
            recorded_by: record.recorded_by,
            created_at: Utc::now(),
        };
        self.sla_history.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_sla_history(&self, entry_id: &Uuid) -> Result<Vec<SlaHistory>, ApiError> {
        Ok(self
            .sla_history
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.entry_id == *entry_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------- users

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, UserRef>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, display_name: &str, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().unwrap().insert(
            id,
            UserRef {
                id,
                display_name: display_name.to_string(),
                email: format!("{}@riskdesk.test", display_name.to_lowercase()),
                role: role.to_string(),
                is_active: true,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn deactivate(&self, id: &Uuid) {
        if let Some(user) = self.users.lock().unwrap().get_mut(id) {
            user.is_active = false;
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: &Uuid) -> Result<Option<UserRef>, ApiError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }
}

// ---------------------------------------------------------------- harness

pub fn test_settings() -> Settings {
    Settings {
        database_url: "postgresql://localhost/riskdesk_test".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        cors_allow_origins: vec![],
        log_level: "ERROR".to_string(),
        log_format: "plain".to_string(),
        entry_number_max_attempts: 10,
        max_bulk_items: 200,
        sla_hours_critical: 4,
        sla_hours_high: 24,
        sla_hours_medium: 168,
        sla_hours_low: 720,
        due_soon_window_hours: 48,
    }
}

/// Everything the workflow tests need, wired over the in-memory fakes and
/// a controllable clock.
pub struct Harness {
    pub backlog: Arc<InMemoryBacklogRepository>,
    pub matrices: Arc<InMemoryMatrixRepository>,
    pub risks: Arc<InMemoryRiskDirectory>,
    pub audit_repo: Arc<InMemoryAuditRepository>,
    pub users: Arc<InMemoryUserDirectory>,
    pub clock: Arc<FixedClock>,
    pub workflow: Arc<WorkflowService>,
    pub matrix_service: Arc<MatrixService>,
    pub sla: Arc<SlaService>,
    pub audit: Arc<AuditService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let backlog = Arc::new(InMemoryBacklogRepository::new());
        let matrices = Arc::new(InMemoryMatrixRepository::new());
        let risks = Arc::new(InMemoryRiskDirectory::new());
        let audit_repo = Arc::new(InMemoryAuditRepository::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        ));

        let audit = Arc::new(AuditService::new(audit_repo.clone()));
        let matrix_service = Arc::new(MatrixService::new(matrices.clone(), settings.clone()));
        let materializer = Arc::new(RiskMaterializer::new(
            risks.clone(),
            matrix_service.clone(),
        ));
        let sla = Arc::new(SlaService::new(
            backlog.clone(),
            matrix_service.clone(),
            audit.clone(),
            clock.clone() as Arc<dyn Clock>,
            settings.clone(),
        ));
        let workflow = Arc::new(WorkflowService::new(
            backlog.clone(),
            risks.clone(),
            users.clone(),
            matrix_service.clone(),
            materializer,
            audit.clone(),
            clock.clone() as Arc<dyn Clock>,
            settings,
        ));

        Self {
            backlog,
            matrices,
            risks,
            audit_repo,
            users,
            clock,
            workflow,
            matrix_service,
            sla,
            audit,
        }
    }

    /// A standard five-by-five matrix with 1..5 weights on both axes,
    /// generated and promoted to the active default.
    pub async fn install_default_matrix(&self) -> RiskMatrix {
        let matrix = self
            .matrix_service
            .create_matrix(RiskMatrixCreate {
                name: "Corporate 5x5".to_string(),
                size: 5,
                kind: MatrixKind::ImpactLikelihood,
                impact_levels: standard_levels(),
                likelihood_levels: standard_levels(),
                exposure_levels: vec![],
                thresholds: None,
                sla_hours: SlaHoursConfig {
                    critical: 4,
                    high: 24,
                    medium: 168,
                    low: 720,
                },
            })
            .await
            .expect("matrix creation should succeed");

        self.matrix_service
            .generate_cells(&matrix.id)
            .await
            .expect("cell generation should succeed");

        self.matrix_service
            .set_default(&matrix.id)
            .await
            .expect("set default should succeed")
    }
}

pub fn standard_levels() -> Vec<MatrixLevel> {
    ["Very Low", "Low", "Medium", "High", "Very High"]
        .iter()
        .enumerate()
        .map(|(i, name)| MatrixLevel {
            name: name.to_string(),
            weight: (i + 1) as f64,
        })
        .collect()
}

pub fn sample_draft() -> PendingRiskDraft {
    PendingRiskDraft {
        title: "Unpatched VPN gateway".to_string(),
        description: Some("Edge VPN appliance is two major versions behind".to_string()),
        asset: Some("vpn-gw-01".to_string()),
        business_unit: Some("IT Operations".to_string()),
        impact: ImpactLevel::High,
        likelihood: LikelihoodLevel::Likely,
        exposure: ExposureLevel::Moderate,
        ..Default::default()
    }
}

use crate::{
    config::Settings,
    error::ApiError,
    models::{
        ActivityCreate, ActivityType, BacklogAction, BacklogEntry, BacklogEntryCreate,
        BacklogFilter, BacklogListResponse, BacklogStatistics, BacklogStatus,
        BulkOperationResult, Comment, CommentCreate, RiskPriority, UserRef,
    },
    repositories::{BacklogRepository, RiskDirectory, UserDirectory},
    services::{AuditService, Clock, MatrixService, RiskMaterializer},
};
use chrono::Datelike;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    AssignToAnalyst,
    AssignToManager,
    AnalystApprove,
    AnalystReject,
    ManagerApprove,
    ManagerReject,
    Escalate,
}

/// The fixed transition table. Anything not listed here is an invalid
/// transition; Approved and Rejected have no outgoing edges. Escalated is
/// an override state that re-enters the normal graph through assignment.
pub fn next_status(current: BacklogStatus, event: WorkflowEvent) -> Option<BacklogStatus> {
    use BacklogStatus::*;
    use WorkflowEvent::*;

    match (current, event) {
        (Unassigned | Escalated, AssignToAnalyst) => Some(AssignedToAnalyst),
        (Unassigned | Escalated, AssignToManager) => Some(AssignedToManager),
        (AssignedToAnalyst, AnalystApprove) => Some(AssignedToManager),
        (AssignedToAnalyst, AnalystReject) => Some(Rejected),
        (AssignedToManager, ManagerApprove) => Some(Approved),
        (AssignedToManager, ManagerReject) => Some(Rejected),
        (current, Escalate) if !current.is_terminal() => Some(Escalated),
        _ => None,
    }
}

/// Owns the BacklogEntry lifecycle. Every mutation is one version-guarded
/// read-modify-write plus audit records; audit failures never roll the
/// mutation back.
pub struct WorkflowService {
    backlog_repo: Arc<dyn BacklogRepository + Send + Sync>,
    risk_directory: Arc<dyn RiskDirectory + Send + Sync>,
    user_directory: Arc<dyn UserDirectory + Send + Sync>,
    matrix_service: Arc<MatrixService>,
    materializer: Arc<RiskMaterializer>,
    audit: Arc<AuditService>,
    clock: Arc<dyn Clock>,
    settings: Arc<Settings>,
}

impl WorkflowService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backlog_repo: Arc<dyn BacklogRepository + Send + Sync>,
        risk_directory: Arc<dyn RiskDirectory + Send + Sync>,
        user_directory: Arc<dyn UserDirectory + Send + Sync>,
        matrix_service: Arc<MatrixService>,
        materializer: Arc<RiskMaterializer>,
        audit: Arc<AuditService>,
        clock: Arc<dyn Clock>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            backlog_repo,
            risk_directory,
            user_directory,
            matrix_service,
            materializer,
            audit,
            clock,
            settings,
        }
    }

    pub async fn create_entry(&self, request: BacklogEntryCreate) -> Result<BacklogEntry, ApiError> {
        if request.justification.trim().is_empty() {
            return Err(ApiError::validation("justification must not be empty"));
        }

        // A linked risk must exist; its provenance classifies the entry.
        let linked_risk = match request.risk_id {
            Some(risk_id) => Some(
                self.risk_directory
                    .get_by_id(&risk_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found(format!("risk {} not found", risk_id)))?,
            ),
            None => None,
        };

        if request.action == BacklogAction::NewRisk
            && request.risk_id.is_none()
            && request.draft.is_none()
        {
            return Err(ApiError::validation(
                "new risk entries require a draft payload",
            ));
        }

        let requester = self
            .user_directory
            .get_user(&request.requester_id)
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("user {} not found", request.requester_id))
            })?;

        let score = match (&request.draft, &linked_risk) {
            (Some(draft), _) => {
                Some(draft.impact.weight() * draft.likelihood.weight() * draft.exposure.multiplier())
            }
            (None, Some(risk)) => {
                Some(risk.impact.weight() * risk.likelihood.weight() * risk.exposure.multiplier())
            }
            (None, None) => None,
        };

        let priority = match score {
            Some(score) => match self.matrix_service.classify_score(score).await {
                Ok(level) => level.into(),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "could not classify entry score, defaulting priority to medium"
                    );
                    RiskPriority::default()
                }
            },
            None => RiskPriority::default(),
        };

        let now = self.clock.now();
        let due_date = now + chrono::Duration::days(request.action.default_due_days());

        let mut entry = BacklogEntry {
            id: Uuid::new_v4(),
            entry_number: String::new(),
            action: request.action,
            status: BacklogStatus::Unassigned,
            priority,
            justification: request.justification,
            draft: request
                .draft
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            risk_source: linked_risk.as_ref().map(|r| r.source),
            requester_id: requester.id,
            analyst_id: None,
            manager_id: None,
            assigned_at: None,
            analyst_comments: None,
            manager_comments: None,
            rejection_reason: None,
            due_date,
            sla_breached: false,
            risk_id: request.risk_id,
            version: 1,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let year = now.year();
        let base_sequence = self.backlog_repo.count_created_in_year(year).await?;

        for attempt in 0..self.settings.entry_number_max_attempts {
            let candidate = format!("RB-{}-{:04}", year, base_sequence + 1 + attempt as i64);

            if self.backlog_repo.entry_number_exists(&candidate).await? {
                continue;
            }

            entry.entry_number = candidate;
            match self.backlog_repo.create(&entry).await {
                Ok(created) => {
                    tracing::info!(
                        entry_id = %created.id,
                        entry_number = %created.entry_number,
                        action = %created.action,
                        priority = %created.priority,
                        "backlog entry created"
                    );

                    self.audit
                        .record(ActivityCreate {
                            entry_id: created.id,
                            activity_type: ActivityType::Created,
                            from_value: None,
                            to_value: Some(created.status.to_string()),
                            description: format!(
                                "Entry {} created for {}",
                                created.entry_number, created.action
                            ),
                            actor_id: created.requester_id,
                        })
                        .await;

                    return Ok(created);
                }
                // Another writer claimed the number between our check and
                // the insert; try the next candidate.
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ApiError::configuration(format!(
            "exhausted {} attempts allocating a backlog number for year {}",
            self.settings.entry_number_max_attempts, year
        )))
    }

    pub async fn assign_to_analyst(
        &self,
        entry_id: &Uuid,
        assignee_id: Uuid,
        by: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::AssignToAnalyst).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "cannot assign entry {} to an analyst from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        let assignee = self.require_active_user(&assignee_id).await?;
        let previous = entry.analyst_id;

        entry.analyst_id = Some(assignee_id);
        entry.assigned_at = Some(self.clock.now());
        entry.status = next;
        entry.updated_at = self.clock.now();

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::Assignment,
                from_value: previous.map(|id| id.to_string()),
                to_value: Some(assignee_id.to_string()),
                description: format!("Assigned to analyst {}", assignee.display_name),
                actor_id: by,
            })
            .await;

        Ok(updated)
    }

    pub async fn assign_to_manager(
        &self,
        entry_id: &Uuid,
        assignee_id: Uuid,
        by: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::AssignToManager).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "cannot assign entry {} to a manager from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        let assignee = self.require_active_user(&assignee_id).await?;
        let previous = entry.manager_id;

        entry.manager_id = Some(assignee_id);
        entry.assigned_at = Some(self.clock.now());
        entry.status = next;
        entry.updated_at = self.clock.now();

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::Assignment,
                from_value: previous.map(|id| id.to_string()),
                to_value: Some(assignee_id.to_string()),
                description: format!("Assigned to manager {}", assignee.display_name),
                actor_id: by,
            })
            .await;

        Ok(updated)
    }

    pub async fn analyst_approve(
        &self,
        entry_id: &Uuid,
        comments: String,
        analyst_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::AnalystApprove).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "entry {} cannot be analyst-approved from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        if entry.analyst_id != Some(analyst_id) {
            return Err(ApiError::unauthorized(format!(
                "user {} is not the assigned analyst for entry {}",
                analyst_id, entry.entry_number
            )));
        }

        let previous = entry.status;
        entry.status = next;
        entry.analyst_comments = Some(comments);
        entry.updated_at = self.clock.now();

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::AnalystApproval,
                from_value: Some(previous.to_string()),
                to_value: Some(updated.status.to_string()),
                description: "Analyst approved; forwarded to manager review".to_string(),
                actor_id: analyst_id,
            })
            .await;

        Ok(updated)
    }

    pub async fn analyst_reject(
        &self,
        entry_id: &Uuid,
        reason: String,
        analyst_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::AnalystReject).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "entry {} cannot be analyst-rejected from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        if entry.analyst_id != Some(analyst_id) {
            return Err(ApiError::unauthorized(format!(
                "user {} is not the assigned analyst for entry {}",
                analyst_id, entry.entry_number
            )));
        }

        let previous = entry.status;
        let now = self.clock.now();
        entry.status = next;
        entry.rejection_reason = Some(reason.clone());
        entry.completed_at = Some(now);
        entry.updated_at = now;

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::AnalystRejection,
                from_value: Some(previous.to_string()),
                to_value: Some(updated.status.to_string()),
                description: format!("Rejected by analyst: {}", reason),
                actor_id: analyst_id,
            })
            .await;

        Ok(updated)
    }

    /// Final approval. For a new-risk entry without a linked risk the draft
    /// is materialized first; a malformed draft fails the whole call and
    /// the entry stays in manager review, retryable. The risk link is
    /// backfilled in the same version-checked update that sets Approved.
    pub async fn manager_approve(
        &self,
        entry_id: &Uuid,
        comments: String,
        manager_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::ManagerApprove).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "entry {} cannot be manager-approved from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        self.require_manager_actor(&mut entry, manager_id).await?;

        let mut created_risk = None;
        if entry.action == BacklogAction::NewRisk && entry.risk_id.is_none() {
            let risk = self.materializer.materialize(&entry).await?;
            entry.risk_id = Some(risk.id);
            created_risk = Some(risk.id);
        }

        let previous = entry.status;
        let now = self.clock.now();
        entry.status = next;
        entry.manager_comments = Some(comments);
        entry.completed_at = Some(now);
        entry.updated_at = now;

        let updated = match self.backlog_repo.update_guarded(&entry).await {
            Ok(updated) => updated,
            Err(e) => {
                // The approval lost its version race after the risk row was
                // written; remove the risk so no phantom record survives.
                if let Some(risk_id) = created_risk {
                    self.materializer.discard(&risk_id).await;
                }
                return Err(e);
            }
        };

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::ManagerApproval,
                from_value: Some(previous.to_string()),
                to_value: Some(updated.status.to_string()),
                description: match updated.risk_id {
                    Some(risk_id) => format!("Approved by manager; risk {} linked", risk_id),
                    None => "Approved by manager".to_string(),
                },
                actor_id: manager_id,
            })
            .await;

        Ok(updated)
    }

    pub async fn manager_reject(
        &self,
        entry_id: &Uuid,
        reason: String,
        manager_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::ManagerReject).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "entry {} cannot be manager-rejected from status {}",
                entry.entry_number, entry.status
            ))
        })?;

        self.require_manager_actor(&mut entry, manager_id).await?;

        let previous = entry.status;
        let now = self.clock.now();
        entry.status = next;
        entry.rejection_reason = Some(reason.clone());
        entry.completed_at = Some(now);
        entry.updated_at = now;

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::ManagerRejection,
                from_value: Some(previous.to_string()),
                to_value: Some(updated.status.to_string()),
                description: format!("Rejected by manager: {}", reason),
                actor_id: manager_id,
            })
            .await;

        Ok(updated)
    }

    /// Override path used for SLA-breach handling: forces Critical priority
    /// and pulls the entry into heightened visibility from any non-terminal
    /// position.
    pub async fn escalate(
        &self,
        entry_id: &Uuid,
        reason: String,
        actor_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        let next = next_status(entry.status, WorkflowEvent::Escalate).ok_or_else(|| {
            ApiError::invalid_transition(format!(
                "entry {} is terminal and cannot be escalated",
                entry.entry_number
            ))
        })?;

        let previous = entry.status;
        entry.status = next;
        entry.priority = RiskPriority::Critical;
        entry.updated_at = self.clock.now();

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        tracing::warn!(
            entry_id = %updated.id,
            entry_number = %updated.entry_number,
            reason = %reason,
            "backlog entry escalated"
        );

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::Escalation,
                from_value: Some(previous.to_string()),
                to_value: Some(updated.status.to_string()),
                description: format!("Escalated: {}", reason),
                actor_id,
            })
            .await;

        Ok(updated)
    }

    pub async fn set_priority(
        &self,
        entry_id: &Uuid,
        priority: RiskPriority,
        actor_id: Uuid,
    ) -> Result<BacklogEntry, ApiError> {
        let mut entry = self.get_entry(entry_id).await?;

        if entry.status.is_terminal() {
            return Err(ApiError::invalid_transition(format!(
                "entry {} is terminal; its priority is frozen",
                entry.entry_number
            )));
        }

        let previous = entry.priority;
        entry.priority = priority;
        entry.updated_at = self.clock.now();

        let updated = self.backlog_repo.update_guarded(&entry).await?;

        self.audit
            .record(ActivityCreate {
                entry_id: updated.id,
                activity_type: ActivityType::PriorityChange,
                from_value: Some(previous.to_string()),
                to_value: Some(priority.to_string()),
                description: format!("Priority changed from {} to {}", previous, priority),
                actor_id,
            })
            .await;

        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        entry_id: &Uuid,
        comment: CommentCreate,
    ) -> Result<Comment, ApiError> {
        let entry = self.get_entry(entry_id).await?;
        self.audit.add_comment(entry.id, comment).await
    }

    pub async fn bulk_assign_to_analyst(
        &self,
        entry_ids: &[Uuid],
        assignee_id: Uuid,
        by: Uuid,
    ) -> Result<BulkOperationResult, ApiError> {
        self.check_bulk_size(entry_ids)?;

        let mut result = BulkOperationResult::default();
        for entry_id in entry_ids {
            match self.assign_to_analyst(entry_id, assignee_id, by).await {
                Ok(_) => result.record_success(),
                Err(e) => result.record_error(*entry_id, &e),
            }
        }

        Ok(result)
    }

    pub async fn bulk_assign_to_manager(
        &self,
        entry_ids: &[Uuid],
        assignee_id: Uuid,
        by: Uuid,
    ) -> Result<BulkOperationResult, ApiError> {
        self.check_bulk_size(entry_ids)?;

        let mut result = BulkOperationResult::default();
        for entry_id in entry_ids {
            match self.assign_to_manager(entry_id, assignee_id, by).await {
                Ok(_) => result.record_success(),
                Err(e) => result.record_error(*entry_id, &e),
            }
        }

        Ok(result)
    }

    pub async fn bulk_approve_by_manager(
        &self,
        entry_ids: &[Uuid],
        comments: String,
        manager_id: Uuid,
    ) -> Result<BulkOperationResult, ApiError> {
        self.check_bulk_size(entry_ids)?;

        let mut result = BulkOperationResult::default();
        for entry_id in entry_ids {
            match self
                .manager_approve(entry_id, comments.clone(), manager_id)
                .await
            {
                Ok(_) => result.record_success(),
                Err(e) => result.record_error(*entry_id, &e),
            }
        }

        Ok(result)
    }

    pub async fn bulk_set_priority(
        &self,
        entry_ids: &[Uuid],
        priority: RiskPriority,
        actor_id: Uuid,
    ) -> Result<BulkOperationResult, ApiError> {
        self.check_bulk_size(entry_ids)?;

        let mut result = BulkOperationResult::default();
        for entry_id in entry_ids {
            match self.set_priority(entry_id, priority, actor_id).await {
                Ok(_) => result.record_success(),
                Err(e) => result.record_error(*entry_id, &e),
            }
        }

        Ok(result)
    }

    pub async fn get_entry(&self, entry_id: &Uuid) -> Result<BacklogEntry, ApiError> {
        self.backlog_repo
            .get_by_id(entry_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("backlog entry {} not found", entry_id)))
    }

    pub async fn list(&self, filter: &BacklogFilter) -> Result<BacklogListResponse, ApiError> {
        self.backlog_repo.filter(filter).await
    }

    pub async fn statistics(&self) -> Result<BacklogStatistics, ApiError> {
        self.backlog_repo.statistics(self.clock.now()).await
    }

    fn check_bulk_size(&self, entry_ids: &[Uuid]) -> Result<(), ApiError> {
        if entry_ids.is_empty() {
            return Err(ApiError::validation("bulk operation requires at least one entry"));
        }
        if entry_ids.len() > self.settings.max_bulk_items {
            return Err(ApiError::validation(format!(
                "bulk operation exceeds the limit of {} items",
                self.settings.max_bulk_items
            )));
        }
        Ok(())
    }

    async fn require_active_user(&self, user_id: &Uuid) -> Result<UserRef, ApiError> {
        let user = self
            .user_directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("user {} not found", user_id)))?;

        if !user.is_active {
            return Err(ApiError::validation(format!(
                "user {} is deactivated",
                user.display_name
            )));
        }

        Ok(user)
    }

    /// A manager decision requires the acting user to be the assigned
    /// manager. Entries forwarded by an analyst may not have one yet; the
    /// first manager to act becomes the manager of record.
    async fn require_manager_actor(
        &self,
        entry: &mut BacklogEntry,
        manager_id: Uuid,
    ) -> Result<(), ApiError> {
        match entry.manager_id {
            Some(assigned) if assigned == manager_id => Ok(()),
            Some(_) => Err(ApiError::unauthorized(format!(
                "user {} is not the assigned manager for entry {}",
                manager_id, entry.entry_number
            ))),
            None => {
                self.require_active_user(&manager_id).await?;
                entry.manager_id = Some(manager_id);
                Ok(())
            }
        }
    }
}

fn is_unique_violation(err: &ApiError) -> bool {
    match err {
        ApiError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

use crate::{
    error::ApiError,
    models::{
        Activity, ActivityCreate, ActivityType, Comment, CommentCreate, SlaHistory,
        SlaHistoryCreate,
    },
    repositories::AuditRepository,
};
use std::sync::Arc;
use uuid::Uuid;

/// Appends audit records for every workflow mutation. Activity and SLA
/// history writes are swallowed on failure so the primary state transition
/// always commits; comments are a primary mutation and propagate errors.
pub struct AuditService {
    audit_repo: Arc<dyn AuditRepository + Send + Sync>,
}

impl AuditService {
    pub fn new(audit_repo: Arc<dyn AuditRepository + Send + Sync>) -> Self {
        Self { audit_repo }
    }

    pub async fn record(&self, activity: ActivityCreate) {
        let entry_id = activity.entry_id;
        let activity_type = activity.activity_type;

        if let Err(e) = self.audit_repo.insert_activity(&activity).await {
            tracing::error!(
                entry_id = %entry_id,
                activity_type = %activity_type,
                error = %e,
                "failed to append activity record; state transition unaffected"
            );
        }
    }

    pub async fn record_sla_breach(&self, record: SlaHistoryCreate) {
        let entry_id = record.entry_id;

        if let Err(e) = self.audit_repo.insert_sla_history(&record).await {
            tracing::error!(
                entry_id = %entry_id,
                error = %e,
                "failed to append SLA history record; breach flag unaffected"
            );
        }
    }

    pub async fn add_comment(
        &self,
        entry_id: Uuid,
        comment: CommentCreate,
    ) -> Result<Comment, ApiError> {
        let created = self.audit_repo.insert_comment(&entry_id, &comment).await?;

        self.record(ActivityCreate {
            entry_id,
            activity_type: ActivityType::CommentAdded,
            from_value: None,
            to_value: None,
            description: "Comment added".to_string(),
            actor_id: comment.author_id,
        })
        .await;

        Ok(created)
    }

    pub async fn activities(&self, entry_id: &Uuid) -> Result<Vec<Activity>, ApiError> {
        self.audit_repo.list_activities(entry_id).await
    }

    pub async fn comments(
        &self,
        entry_id: &Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, ApiError> {
        self.audit_repo.list_comments(entry_id, include_internal).await
    }

    pub async fn sla_history(&self, entry_id: &Uuid) -> Result<Vec<SlaHistory>, ApiError> {
        self.audit_repo.list_sla_history(entry_id).await
    }
}

use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{Activity, ActivityCreate, Comment, CommentCreate, SlaHistory, SlaHistoryCreate},
};
use async_trait::async_trait;
use uuid::Uuid;

/// Append-only store for the audit trail. Nothing here is ever updated or
/// deleted through the workflow.
#[async_trait]
pub trait AuditRepository {
    async fn insert_activity(&self, activity: &ActivityCreate) -> Result<Activity, ApiError>;
    async fn list_activities(&self, entry_id: &Uuid) -> Result<Vec<Activity>, ApiError>;
    async fn insert_comment(
        &self,
        entry_id: &Uuid,
        comment: &CommentCreate,
    ) -> Result<Comment, ApiError>;
    async fn list_comments(
        &self,
        entry_id: &Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, ApiError>;
    async fn insert_sla_history(&self, record: &SlaHistoryCreate) -> Result<SlaHistory, ApiError>;
    async fn list_sla_history(&self, entry_id: &Uuid) -> Result<Vec<SlaHistory>, ApiError>;
}

pub struct SqlxAuditRepository {
    pool: DatabasePool,
}

impl SqlxAuditRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqlxAuditRepository {
    async fn insert_activity(&self, activity: &ActivityCreate) -> Result<Activity, ApiError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let result = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (
                id, entry_id, activity_type, from_value, to_value, description,
                actor_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, entry_id, activity_type, from_value, to_value, description,
                      actor_id, created_at
            "#,
        )
        .bind(id)
        .bind(activity.entry_id)
        .bind(activity.activity_type)
        .bind(&activity.from_value)
        .bind(&activity.to_value)
        .bind(&activity.description)
        .bind(activity.actor_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_activities(&self, entry_id: &Uuid) -> Result<Vec<Activity>, ApiError> {
        let results = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, entry_id, activity_type, from_value, to_value, description,
                   actor_id, created_at
            FROM activities
            WHERE entry_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn insert_comment(
        &self,
        entry_id: &Uuid,
        comment: &CommentCreate,
    ) -> Result<Comment, ApiError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let result = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, entry_id, author_id, body, is_internal, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, entry_id, author_id, body, is_internal, created_at
            "#,
        )
        .bind(id)
        .bind(entry_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .bind(comment.is_internal)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_comments(
        &self,
        entry_id: &Uuid,
        include_internal: bool,
    ) -> Result<Vec<Comment>, ApiError> {
        let results = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, entry_id, author_id, body, is_internal, created_at
            FROM comments
            WHERE entry_id = $1 AND (is_internal = FALSE OR $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(entry_id)
        .bind(include_internal)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn insert_sla_history(&self, record: &SlaHistoryCreate) -> Result<SlaHistory, ApiError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let result = sqlx::query_as::<_, SlaHistory>(
            r#"
            INSERT INTO sla_history (
                id, entry_id, risk_level, deadline, breached_at, recorded_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, entry_id, risk_level, deadline, breached_at, recorded_by, created_at
            "#,
        )
        .bind(id)
        .bind(record.entry_id)
        .bind(record.risk_level)
        .bind(record.deadline)
        .bind(record.breached_at)
        .bind(record.recorded_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_sla_history(&self, entry_id: &Uuid) -> Result<Vec<SlaHistory>, ApiError> {
        let results = sqlx::query_as::<_, SlaHistory>(
            r#"
            SELECT id, entry_id, risk_level, deadline, breached_at, recorded_by, created_at
            FROM sla_history
            WHERE entry_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }
}

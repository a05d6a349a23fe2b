use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{BacklogEntry, BacklogFilter, BacklogListResponse, BacklogStatistics},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, entry_number, action, status, priority, justification, draft, \
     risk_source, requester_id, analyst_id, manager_id, assigned_at, analyst_comments, \
     manager_comments, rejection_reason, due_date, sla_breached, risk_id, version, \
     created_at, updated_at, completed_at";

#[async_trait]
pub trait BacklogRepository {
    async fn create(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<BacklogEntry>, ApiError>;
    /// Version-guarded read-modify-write. The update only applies when the
    /// stored version still matches `entry.version`; the returned entry
    /// carries the incremented version.
    async fn update_guarded(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError>;
    async fn entry_number_exists(&self, entry_number: &str) -> Result<bool, ApiError>;
    async fn count_created_in_year(&self, year: i32) -> Result<i64, ApiError>;
    async fn filter(&self, filter: &BacklogFilter) -> Result<BacklogListResponse, ApiError>;
    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<BacklogEntry>, ApiError>;
    async fn list_due_within(
        &self,
        now: DateTime<Utc>,
        window_hours: i64,
    ) -> Result<Vec<BacklogEntry>, ApiError>;
    /// Non-terminal entries past their due date whose breach flag is unset.
    async fn list_breach_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BacklogEntry>, ApiError>;
    /// Sets the breach flag if not already set. Returns false when another
    /// writer got there first; the flag is monotonic so that is fine.
    async fn mark_sla_breached(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, ApiError>;
    async fn statistics(&self, now: DateTime<Utc>) -> Result<BacklogStatistics, ApiError>;
}

pub struct SqlxBacklogRepository {
    pool: DatabasePool,
}

impl SqlxBacklogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BacklogRepository for SqlxBacklogRepository {
    async fn create(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError> {
        let sql = format!(
            r#"
            INSERT INTO backlog_entries (
                id, entry_number, action, status, priority, justification, draft,
                risk_source, requester_id, analyst_id, manager_id, assigned_at,
                analyst_comments, manager_comments, rejection_reason, due_date,
                sla_breached, risk_id, version, created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let result = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(entry.id)
            .bind(&entry.entry_number)
            .bind(entry.action)
            .bind(entry.status)
            .bind(entry.priority)
            .bind(&entry.justification)
            .bind(&entry.draft)
            .bind(entry.risk_source)
            .bind(entry.requester_id)
            .bind(entry.analyst_id)
            .bind(entry.manager_id)
            .bind(entry.assigned_at)
            .bind(&entry.analyst_comments)
            .bind(&entry.manager_comments)
            .bind(&entry.rejection_reason)
            .bind(entry.due_date)
            .bind(entry.sla_breached)
            .bind(entry.risk_id)
            .bind(entry.version)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .bind(entry.completed_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(result)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<BacklogEntry>, ApiError> {
        let sql = format!(
            "SELECT {} FROM backlog_entries WHERE id = $1",
            ENTRY_COLUMNS
        );

        let result = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn update_guarded(&self, entry: &BacklogEntry) -> Result<BacklogEntry, ApiError> {
        let sql = format!(
            r#"
            UPDATE backlog_entries SET
                status = $3,
                priority = $4,
                draft = $5,
                analyst_id = $6,
                manager_id = $7,
                assigned_at = $8,
                analyst_comments = $9,
                manager_comments = $10,
                rejection_reason = $11,
                due_date = $12,
                sla_breached = $13,
                risk_id = $14,
                version = version + 1,
                updated_at = $15,
                completed_at = $16
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let result = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(entry.id)
            .bind(entry.version)
            .bind(entry.status)
            .bind(entry.priority)
            .bind(&entry.draft)
            .bind(entry.analyst_id)
            .bind(entry.manager_id)
            .bind(entry.assigned_at)
            .bind(&entry.analyst_comments)
            .bind(&entry.manager_comments)
            .bind(&entry.rejection_reason)
            .bind(entry.due_date)
            .bind(entry.sla_breached)
            .bind(entry.risk_id)
            .bind(entry.updated_at)
            .bind(entry.completed_at)
            .fetch_optional(&self.pool)
            .await?;

        match result {
            Some(updated) => Ok(updated),
            // Zero rows: either the entry is gone or someone else won the
            // version race. Distinguish so callers get the right error.
            None => {
                if self.get_by_id(&entry.id).await?.is_some() {
                    Err(ApiError::concurrency_conflict(format!(
                        "backlog entry {} was modified concurrently (stale version {})",
                        entry.entry_number, entry.version
                    )))
                } else {
                    Err(ApiError::not_found(format!(
                        "backlog entry {} not found",
                        entry.id
                    )))
                }
            }
        }
    }

    async fn entry_number_exists(&self, entry_number: &str) -> Result<bool, ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM backlog_entries WHERE entry_number = $1",
        )
        .bind(entry_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn count_created_in_year(&self, year: i32) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM backlog_entries WHERE date_part('year', created_at) = $1",
        )
        .bind(year as f64)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn filter(&self, filter: &BacklogFilter) -> Result<BacklogListResponse, ApiError> {
        let mut where_clauses: Vec<String> = Vec::new();
        let mut param_index = 1;

        if let Some(ref statuses) = filter.statuses {
            if !statuses.is_empty() {
                where_clauses.push(format!("status = ANY(${})", param_index));
                param_index += 1;
            }
        }

        if let Some(ref actions) = filter.actions {
            if !actions.is_empty() {
                where_clauses.push(format!("action = ANY(${})", param_index));
                param_index += 1;
            }
        }

        if let Some(ref priorities) = filter.priorities {
            if !priorities.is_empty() {
                where_clauses.push(format!("priority = ANY(${})", param_index));
                param_index += 1;
            }
        }

        if filter.requester_id.is_some() {
            where_clauses.push(format!("requester_id = ${}", param_index));
            param_index += 1;
        }

        if filter.analyst_id.is_some() {
            where_clauses.push(format!("analyst_id = ${}", param_index));
            param_index += 1;
        }

        if filter.manager_id.is_some() {
            where_clauses.push(format!("manager_id = ${}", param_index));
            param_index += 1;
        }

        if filter.breached_only {
            where_clauses.push("sla_breached".to_string());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_clauses.join(" AND "))
        };

        let limit = filter.limit.max(1).min(1000);
        let offset = filter.offset.max(0);

        let count_sql = format!("SELECT COUNT(*) FROM backlog_entries {}", where_sql);
        let main_sql = format!(
            "SELECT {} FROM backlog_entries {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            ENTRY_COLUMNS,
            where_sql,
            param_index,
            param_index + 1
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut main_query = sqlx::query_as::<_, BacklogEntry>(&main_sql);

        if let Some(ref statuses) = filter.statuses {
            if !statuses.is_empty() {
                count_query = count_query.bind(statuses);
                main_query = main_query.bind(statuses);
            }
        }

        if let Some(ref actions) = filter.actions {
            if !actions.is_empty() {
                count_query = count_query.bind(actions);
                main_query = main_query.bind(actions);
            }
        }

        if let Some(ref priorities) = filter.priorities {
            if !priorities.is_empty() {
                count_query = count_query.bind(priorities);
                main_query = main_query.bind(priorities);
            }
        }

        if let Some(ref requester_id) = filter.requester_id {
            count_query = count_query.bind(requester_id);
            main_query = main_query.bind(requester_id);
        }

        if let Some(ref analyst_id) = filter.analyst_id {
            count_query = count_query.bind(analyst_id);
            main_query = main_query.bind(analyst_id);
        }

        if let Some(ref manager_id) = filter.manager_id {
            count_query = count_query.bind(manager_id);
            main_query = main_query.bind(manager_id);
        }

        let total_count = count_query.fetch_one(&self.pool).await?;

        let entries = main_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(BacklogListResponse {
            entries,
            total_count,
            limit,
            offset,
        })
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<BacklogEntry>, ApiError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backlog_entries
            WHERE due_date < $1 AND status NOT IN ('approved', 'rejected')
            ORDER BY due_date ASC
            "#,
            ENTRY_COLUMNS
        );

        let results = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }

    async fn list_due_within(
        &self,
        now: DateTime<Utc>,
        window_hours: i64,
    ) -> Result<Vec<BacklogEntry>, ApiError> {
        let until = now + chrono::Duration::hours(window_hours);

        let sql = format!(
            r#"
            SELECT {}
            FROM backlog_entries
            WHERE due_date >= $1 AND due_date <= $2
              AND status NOT IN ('approved', 'rejected')
            ORDER BY due_date ASC
            "#,
            ENTRY_COLUMNS
        );

        let results = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(now)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }

    async fn list_breach_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<BacklogEntry>, ApiError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM backlog_entries
            WHERE due_date < $1
              AND NOT sla_breached
              AND status NOT IN ('approved', 'rejected')
            ORDER BY due_date ASC
            "#,
            ENTRY_COLUMNS
        );

        let results = sqlx::query_as::<_, BacklogEntry>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(results)
    }

    async fn mark_sla_breached(&self, id: &Uuid, now: DateTime<Utc>) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE backlog_entries
            SET sla_breached = TRUE, updated_at = $2
            WHERE id = $1 AND NOT sla_breached
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn statistics(&self, now: DateTime<Utc>) -> Result<BacklogStatistics, ApiError> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM backlog_entries")
                .fetch_one(&self.pool)
                .await?;

        let by_status_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status::text, COUNT(*) FROM backlog_entries GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_priority_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT priority::text, COUNT(*) FROM backlog_entries GROUP BY priority",
        )
        .fetch_all(&self.pool)
        .await?;

        let by_action_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT action::text, COUNT(*) FROM backlog_entries GROUP BY action",
        )
        .fetch_all(&self.pool)
        .await?;

        let overdue = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM backlog_entries
            WHERE due_date < $1 AND status NOT IN ('approved', 'rejected')
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let sla_breached = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM backlog_entries WHERE sla_breached",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(BacklogStatistics {
            total,
            by_status: by_status_rows.into_iter().collect::<HashMap<_, _>>(),
            by_priority: by_priority_rows.into_iter().collect::<HashMap<_, _>>(),
            by_action: by_action_rows.into_iter().collect::<HashMap<_, _>>(),
            overdue,
            sla_breached,
        })
    }
}

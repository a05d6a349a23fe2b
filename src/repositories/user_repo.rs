use crate::{database::DatabasePool, error::ApiError, models::UserRef};
use async_trait::async_trait;
use uuid::Uuid;

/// Identity lookups for assignees and actors. Authentication itself lives
/// outside this service; the workflow only needs to resolve ids.
#[async_trait]
pub trait UserDirectory {
    async fn get_user(&self, id: &Uuid) -> Result<Option<UserRef>, ApiError>;
}

pub struct SqlxUserDirectory {
    pool: DatabasePool,
}

impl SqlxUserDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for SqlxUserDirectory {
    async fn get_user(&self, id: &Uuid) -> Result<Option<UserRef>, ApiError> {
        let result = sqlx::query_as::<_, UserRef>(
            r#"
            SELECT id, display_name, email, role, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }
}

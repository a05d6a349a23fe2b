use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{Risk, RiskCandidate},
};
use async_trait::async_trait;
use uuid::Uuid;

const RISK_COLUMNS: &str = "id, risk_number, title, description, asset, business_unit, owner_id, \
     impact, likelihood, exposure, inherent_level, status, source, created_at, updated_at";

/// Seam to the risk register. The workflow only ever creates risks through
/// the materializer and deletes one as compensation when an approval loses
/// its version race after the risk row was written.
#[async_trait]
pub trait RiskDirectory {
    async fn create_risk(
        &self,
        candidate: &RiskCandidate,
        risk_number: &str,
    ) -> Result<Risk, ApiError>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Risk>, ApiError>;
    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError>;
    async fn next_risk_number(&self) -> Result<String, ApiError>;
}

pub struct SqlxRiskDirectory {
    pool: DatabasePool,
}

impl SqlxRiskDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskDirectory for SqlxRiskDirectory {
    async fn create_risk(
        &self,
        candidate: &RiskCandidate,
        risk_number: &str,
    ) -> Result<Risk, ApiError> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let sql = format!(
            r#"
            INSERT INTO risks (
                id, risk_number, title, description, asset, business_unit, owner_id,
                impact, likelihood, exposure, inherent_level, status, source,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'open', $12, $13, $13)
            RETURNING {}
            "#,
            RISK_COLUMNS
        );

        let result = sqlx::query_as::<_, Risk>(&sql)
            .bind(id)
            .bind(risk_number)
            .bind(&candidate.title)
            .bind(&candidate.description)
            .bind(&candidate.asset)
            .bind(&candidate.business_unit)
            .bind(candidate.owner_id)
            .bind(candidate.impact)
            .bind(candidate.likelihood)
            .bind(candidate.exposure)
            .bind(candidate.inherent_level)
            .bind(candidate.source)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(result)
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Risk>, ApiError> {
        let sql = format!("SELECT {} FROM risks WHERE id = $1", RISK_COLUMNS);

        let result = sqlx::query_as::<_, Risk>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM risks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn next_risk_number(&self) -> Result<String, ApiError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM risks")
            .fetch_one(&self.pool)
            .await?;

        Ok(format!("R-{:04}", count + 1))
    }
}

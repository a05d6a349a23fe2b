use crate::{
    database::DatabasePool,
    error::ApiError,
    models::{RiskMatrix, RiskMatrixCell, RiskMatrixRow},
};
use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

const MATRIX_COLUMNS: &str = "id, name, size, kind, is_default, is_active, impact_levels, \
     likelihood_levels, exposure_levels, thresholds, sla_hours, created_at, updated_at";

#[async_trait]
pub trait MatrixRepository {
    async fn create(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError>;
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<RiskMatrix>, ApiError>;
    async fn list(&self) -> Result<Vec<RiskMatrix>, ApiError>;
    async fn update(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError>;
    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError>;
    /// The single matrix that is both default and active, if any.
    async fn get_default_active(&self) -> Result<Option<RiskMatrix>, ApiError>;
    /// Promotes a matrix to default+active and demotes any previous default
    /// in the same transaction.
    async fn set_default(&self, id: &Uuid) -> Result<RiskMatrix, ApiError>;
    /// Transactional delete-then-insert of the full cell set, so concurrent
    /// lookups never observe a partially regenerated matrix.
    async fn replace_cells(
        &self,
        matrix_id: &Uuid,
        cells: &[RiskMatrixCell],
    ) -> Result<(), ApiError>;
    async fn get_cell(
        &self,
        matrix_id: &Uuid,
        impact_index: i32,
        likelihood_index: i32,
        exposure_index: Option<i32>,
    ) -> Result<Option<RiskMatrixCell>, ApiError>;
    async fn list_cells(&self, matrix_id: &Uuid) -> Result<Vec<RiskMatrixCell>, ApiError>;
    async fn count_cells(&self, matrix_id: &Uuid) -> Result<i64, ApiError>;
}

pub struct SqlxMatrixRepository {
    pool: DatabasePool,
}

impl SqlxMatrixRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatrixRepository for SqlxMatrixRepository {
    async fn create(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError> {
        let sql = format!(
            r#"
            INSERT INTO risk_matrices (
                id, name, size, kind, is_default, is_active, impact_levels,
                likelihood_levels, exposure_levels, thresholds, sla_hours,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            MATRIX_COLUMNS
        );

        let row = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .bind(matrix.id)
            .bind(&matrix.name)
            .bind(matrix.size)
            .bind(matrix.kind)
            .bind(matrix.is_default)
            .bind(matrix.is_active)
            .bind(Json(&matrix.impact_levels))
            .bind(Json(&matrix.likelihood_levels))
            .bind(Json(&matrix.exposure_levels))
            .bind(matrix.thresholds.map(Json))
            .bind(Json(&matrix.sla_hours))
            .bind(matrix.created_at)
            .bind(matrix.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<RiskMatrix>, ApiError> {
        let sql = format!("SELECT {} FROM risk_matrices WHERE id = $1", MATRIX_COLUMNS);

        let row = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RiskMatrix::from))
    }

    async fn list(&self) -> Result<Vec<RiskMatrix>, ApiError> {
        let sql = format!(
            "SELECT {} FROM risk_matrices ORDER BY created_at DESC",
            MATRIX_COLUMNS
        );

        let rows = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(RiskMatrix::from).collect())
    }

    async fn update(&self, matrix: &RiskMatrix) -> Result<RiskMatrix, ApiError> {
        let sql = format!(
            r#"
            UPDATE risk_matrices SET
                name = $2,
                size = $3,
                kind = $4,
                impact_levels = $5,
                likelihood_levels = $6,
                exposure_levels = $7,
                thresholds = $8,
                sla_hours = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING {}
            "#,
            MATRIX_COLUMNS
        );

        let row = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .bind(matrix.id)
            .bind(&matrix.name)
            .bind(matrix.size)
            .bind(matrix.kind)
            .bind(Json(&matrix.impact_levels))
            .bind(Json(&matrix.likelihood_levels))
            .bind(Json(&matrix.exposure_levels))
            .bind(matrix.thresholds.map(Json))
            .bind(Json(&matrix.sla_hours))
            .bind(matrix.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RiskMatrix::from)
            .ok_or_else(|| ApiError::not_found(format!("risk matrix {} not found", matrix.id)))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM risk_matrices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_default_active(&self) -> Result<Option<RiskMatrix>, ApiError> {
        let sql = format!(
            "SELECT {} FROM risk_matrices WHERE is_default AND is_active",
            MATRIX_COLUMNS
        );

        let row = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RiskMatrix::from))
    }

    async fn set_default(&self, id: &Uuid) -> Result<RiskMatrix, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE risk_matrices SET is_default = FALSE, updated_at = NOW() WHERE is_default")
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            r#"
            UPDATE risk_matrices
            SET is_default = TRUE, is_active = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MATRIX_COLUMNS
        );

        let row = sqlx::query_as::<_, RiskMatrixRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let matrix = match row {
            Some(row) => RiskMatrix::from(row),
            None => {
                tx.rollback().await?;
                return Err(ApiError::not_found(format!("risk matrix {} not found", id)));
            }
        };

        tx.commit().await?;

        Ok(matrix)
    }

    async fn replace_cells(
        &self,
        matrix_id: &Uuid,
        cells: &[RiskMatrixCell],
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM risk_matrix_cells WHERE matrix_id = $1")
            .bind(matrix_id)
            .execute(&mut *tx)
            .await?;

        for cell in cells {
            sqlx::query(
                r#"
                INSERT INTO risk_matrix_cells (
                    id, matrix_id, impact_index, likelihood_index, exposure_index,
                    score, level, color
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(cell.id)
            .bind(cell.matrix_id)
            .bind(cell.impact_index)
            .bind(cell.likelihood_index)
            .bind(cell.exposure_index)
            .bind(cell.score)
            .bind(cell.level)
            .bind(&cell.color)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn get_cell(
        &self,
        matrix_id: &Uuid,
        impact_index: i32,
        likelihood_index: i32,
        exposure_index: Option<i32>,
    ) -> Result<Option<RiskMatrixCell>, ApiError> {
        let result = sqlx::query_as::<_, RiskMatrixCell>(
            r#"
            SELECT id, matrix_id, impact_index, likelihood_index, exposure_index,
                   score, level, color
            FROM risk_matrix_cells
            WHERE matrix_id = $1
              AND impact_index = $2
              AND likelihood_index = $3
              AND exposure_index IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(matrix_id)
        .bind(impact_index)
        .bind(likelihood_index)
        .bind(exposure_index)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_cells(&self, matrix_id: &Uuid) -> Result<Vec<RiskMatrixCell>, ApiError> {
        let results = sqlx::query_as::<_, RiskMatrixCell>(
            r#"
            SELECT id, matrix_id, impact_index, likelihood_index, exposure_index,
                   score, level, color
            FROM risk_matrix_cells
            WHERE matrix_id = $1
            ORDER BY impact_index, likelihood_index, exposure_index
            "#,
        )
        .bind(matrix_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn count_cells(&self, matrix_id: &Uuid) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM risk_matrix_cells WHERE matrix_id = $1",
        )
        .bind(matrix_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

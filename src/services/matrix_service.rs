use crate::{
    config::Settings,
    error::ApiError,
    models::{
        MatrixKind, RiskLevel, RiskMatrix, RiskMatrixCell, RiskMatrixCreate, RiskMatrixUpdate,
    },
    repositories::MatrixRepository,
};
use std::sync::Arc;
use uuid::Uuid;

/// Converts configured impact/likelihood/(exposure) levels into scores,
/// discrete risk levels and per-level SLA hours.
pub struct MatrixService {
    matrix_repo: Arc<dyn MatrixRepository + Send + Sync>,
    settings: Arc<Settings>,
}

impl MatrixService {
    pub fn new(
        matrix_repo: Arc<dyn MatrixRepository + Send + Sync>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            matrix_repo,
            settings,
        }
    }

    /// Level-set counts must match the declared size per axis before a
    /// matrix can be activated or have its cells generated.
    pub fn validate_matrix(matrix: &RiskMatrix) -> Result<(), ApiError> {
        let size = matrix.size as usize;

        if matrix.size < 2 {
            return Err(ApiError::configuration(format!(
                "matrix {} declares size {}, minimum is 2",
                matrix.name, matrix.size
            )));
        }

        if matrix.impact_levels.len() != size {
            return Err(ApiError::configuration(format!(
                "matrix {} declares size {} but has {} impact levels",
                matrix.name,
                matrix.size,
                matrix.impact_levels.len()
            )));
        }

        if matrix.likelihood_levels.len() != size {
            return Err(ApiError::configuration(format!(
                "matrix {} declares size {} but has {} likelihood levels",
                matrix.name,
                matrix.size,
                matrix.likelihood_levels.len()
            )));
        }

        if matrix.kind == MatrixKind::ImpactLikelihoodExposure
            && matrix.exposure_levels.len() != size
        {
            return Err(ApiError::configuration(format!(
                "3-D matrix {} declares size {} but has {} exposure levels",
                matrix.name,
                matrix.size,
                matrix.exposure_levels.len()
            )));
        }

        if let Some(t) = matrix.thresholds {
            if !(t.medium < t.high && t.high < t.critical) {
                return Err(ApiError::configuration(format!(
                    "matrix {} thresholds must ascend medium < high < critical",
                    matrix.name
                )));
            }
        }

        Ok(())
    }

    /// Maps a raw cell score to a discrete level. Explicit matrix thresholds
    /// take precedence; otherwise the score is normalized against the
    /// maximum weight product (size squared).
    pub fn level_for_score(matrix: &RiskMatrix, score: f64) -> RiskLevel {
        if let Some(t) = matrix.thresholds {
            return if score >= t.critical {
                RiskLevel::Critical
            } else if score >= t.high {
                RiskLevel::High
            } else if score >= t.medium {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
        }

        let normalized = score / (matrix.size as f64 * matrix.size as f64);
        if normalized >= 0.8 {
            RiskLevel::Critical
        } else if normalized >= 0.6 {
            RiskLevel::High
        } else if normalized >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Computes the full cross product of the configured levels.
    /// 2-D: score = impact_weight * likelihood_weight.
    /// 3-D: score = (likelihood_weight * impact_weight) * exposure_multiplier.
    pub fn build_cells(matrix: &RiskMatrix) -> Result<Vec<RiskMatrixCell>, ApiError> {
        Self::validate_matrix(matrix)?;

        let mut cells = Vec::new();

        for (impact_index, impact) in matrix.impact_levels.iter().enumerate() {
            for (likelihood_index, likelihood) in matrix.likelihood_levels.iter().enumerate() {
                match matrix.kind {
                    MatrixKind::ImpactLikelihood => {
                        let score = impact.weight * likelihood.weight;
                        let level = Self::level_for_score(matrix, score);
                        cells.push(RiskMatrixCell {
                            id: Uuid::new_v4(),
                            matrix_id: matrix.id,
                            impact_index: impact_index as i32,
                            likelihood_index: likelihood_index as i32,
                            exposure_index: None,
                            score,
                            level,
                            color: level.color().to_string(),
                        });
                    }
                    MatrixKind::ImpactLikelihoodExposure => {
                        for (exposure_index, exposure) in
                            matrix.exposure_levels.iter().enumerate()
                        {
                            let score =
                                (likelihood.weight * impact.weight) * exposure.multiplier;
                            let level = Self::level_for_score(matrix, score);
                            cells.push(RiskMatrixCell {
                                id: Uuid::new_v4(),
                                matrix_id: matrix.id,
                                impact_index: impact_index as i32,
                                likelihood_index: likelihood_index as i32,
                                exposure_index: Some(exposure_index as i32),
                                score,
                                level,
                                color: level.color().to_string(),
                            });
                        }
                    }
                }
            }
        }

        Ok(cells)
    }

    pub async fn create_matrix(&self, request: RiskMatrixCreate) -> Result<RiskMatrix, ApiError> {
        let now = chrono::Utc::now();

        let matrix = RiskMatrix {
            id: Uuid::new_v4(),
            name: request.name,
            size: request.size,
            kind: request.kind,
            is_default: false,
            is_active: false,
            impact_levels: request.impact_levels,
            likelihood_levels: request.likelihood_levels,
            exposure_levels: request.exposure_levels,
            thresholds: request.thresholds,
            sla_hours: request.sla_hours,
            created_at: now,
            updated_at: now,
        };

        let created = self.matrix_repo.create(&matrix).await?;

        tracing::info!(
            matrix_id = %created.id,
            name = %created.name,
            size = created.size,
            "risk matrix created"
        );

        Ok(created)
    }

    pub async fn get_matrix(&self, id: &Uuid) -> Result<RiskMatrix, ApiError> {
        self.matrix_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("risk matrix {} not found", id)))
    }

    pub async fn list_matrices(&self) -> Result<Vec<RiskMatrix>, ApiError> {
        self.matrix_repo.list().await
    }

    pub async fn update_matrix(
        &self,
        id: &Uuid,
        request: RiskMatrixUpdate,
    ) -> Result<RiskMatrix, ApiError> {
        let mut matrix = self.get_matrix(id).await?;

        if let Some(name) = request.name {
            matrix.name = name;
        }
        if let Some(levels) = request.impact_levels {
            matrix.impact_levels = levels;
        }
        if let Some(levels) = request.likelihood_levels {
            matrix.likelihood_levels = levels;
        }
        if let Some(levels) = request.exposure_levels {
            matrix.exposure_levels = levels;
        }
        if let Some(thresholds) = request.thresholds {
            matrix.thresholds = Some(thresholds);
        }
        if let Some(sla_hours) = request.sla_hours {
            matrix.sla_hours = sla_hours;
        }
        matrix.updated_at = chrono::Utc::now();

        self.matrix_repo.update(&matrix).await
    }

    pub async fn delete_matrix(&self, id: &Uuid) -> Result<(), ApiError> {
        if !self.matrix_repo.delete(id).await? {
            return Err(ApiError::not_found(format!("risk matrix {} not found", id)));
        }

        tracing::info!(matrix_id = %id, "risk matrix deleted");

        Ok(())
    }

    /// Validates and promotes a matrix to be the system-wide default,
    /// demoting any previous default transactionally.
    pub async fn set_default(&self, id: &Uuid) -> Result<RiskMatrix, ApiError> {
        let matrix = self.get_matrix(id).await?;
        Self::validate_matrix(&matrix)?;

        let cell_count = self.matrix_repo.count_cells(id).await?;
        if cell_count == 0 {
            return Err(ApiError::configuration(format!(
                "matrix {} has no generated cells; run cell generation before activation",
                matrix.name
            )));
        }

        let promoted = self.matrix_repo.set_default(id).await?;

        tracing::info!(matrix_id = %id, name = %promoted.name, "default risk matrix changed");

        Ok(promoted)
    }

    /// Regenerates the complete cell set. Delete and insert happen in one
    /// store transaction so lookups never see a partial mix.
    pub async fn generate_cells(&self, matrix_id: &Uuid) -> Result<i64, ApiError> {
        let matrix = self.get_matrix(matrix_id).await?;
        let cells = Self::build_cells(&matrix)?;

        self.matrix_repo.replace_cells(matrix_id, &cells).await?;

        tracing::info!(
            matrix_id = %matrix_id,
            cell_count = cells.len(),
            "matrix cells regenerated"
        );

        Ok(cells.len() as i64)
    }

    pub async fn calculate_risk_level(
        &self,
        matrix_id: &Uuid,
        impact_index: i32,
        likelihood_index: i32,
        exposure_index: Option<i32>,
    ) -> Result<RiskLevel, ApiError> {
        // Matrix existence is a hard error; a missing cell is a
        // configuration gap absorbed with the documented fallback.
        self.get_matrix(matrix_id).await?;

        match self
            .matrix_repo
            .get_cell(matrix_id, impact_index, likelihood_index, exposure_index)
            .await?
        {
            Some(cell) => Ok(cell.level),
            None => {
                tracing::warn!(
                    matrix_id = %matrix_id,
                    impact_index,
                    likelihood_index,
                    ?exposure_index,
                    "matrix cell missing, falling back to medium level"
                );
                Ok(RiskLevel::Medium)
            }
        }
    }

    pub async fn calculate_risk_score(
        &self,
        matrix_id: &Uuid,
        impact_index: i32,
        likelihood_index: i32,
        exposure_index: Option<i32>,
    ) -> Result<f64, ApiError> {
        self.get_matrix(matrix_id).await?;

        match self
            .matrix_repo
            .get_cell(matrix_id, impact_index, likelihood_index, exposure_index)
            .await?
        {
            Some(cell) => Ok(cell.score),
            None => {
                tracing::warn!(
                    matrix_id = %matrix_id,
                    impact_index,
                    likelihood_index,
                    ?exposure_index,
                    "matrix cell missing, falling back to zero score"
                );
                Ok(0.0)
            }
        }
    }

    /// Classifies an externally computed qualitative score through the
    /// active default matrix's ascending threshold triple.
    pub async fn classify_score(&self, score: f64) -> Result<RiskLevel, ApiError> {
        let matrix = self
            .matrix_repo
            .get_default_active()
            .await?
            .ok_or_else(|| {
                ApiError::configuration("no active default risk matrix is configured")
            })?;

        Ok(Self::level_for_score(&matrix, score))
    }

    /// Per-level SLA hours from the active default matrix; fixed settings
    /// defaults apply only when no such matrix exists.
    pub async fn sla_hours_for_level(&self, level: RiskLevel) -> Result<i64, ApiError> {
        match self.matrix_repo.get_default_active().await? {
            Some(matrix) => Ok(matrix.sla_hours.hours_for(level)),
            None => {
                tracing::debug!(
                    level = %level,
                    "no active default matrix, using configured SLA hour defaults"
                );
                Ok(match level {
                    RiskLevel::Critical => self.settings.sla_hours_critical,
                    RiskLevel::High => self.settings.sla_hours_high,
                    RiskLevel::Medium => self.settings.sla_hours_medium,
                    RiskLevel::Low => self.settings.sla_hours_low,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExposureBand, MatrixLevel, ScoreThresholds, SlaHoursConfig};

    fn matrix_2d(size: i32) -> RiskMatrix {
        let now = chrono::Utc::now();
        RiskMatrix {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            size,
            kind: MatrixKind::ImpactLikelihood,
            is_default: true,
            is_active: true,
            impact_levels: (1..=size)
                .map(|w| MatrixLevel {
                    name: format!("I{}", w),
                    weight: w as f64,
                })
                .collect(),
            likelihood_levels: (1..=size)
                .map(|w| MatrixLevel {
                    name: format!("L{}", w),
                    weight: w as f64,
                })
                .collect(),
            exposure_levels: vec![],
            thresholds: None,
            sla_hours: SlaHoursConfig {
                critical: 4,
                high: 24,
                medium: 168,
                low: 720,
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn matrix_3d(size: i32) -> RiskMatrix {
        let mut matrix = matrix_2d(size);
        matrix.kind = MatrixKind::ImpactLikelihoodExposure;
        matrix.exposure_levels = (1..=size)
            .map(|i| ExposureBand {
                name: format!("E{}", i),
                weight: i as f64,
                multiplier: 0.5 + i as f64 * 0.25,
            })
            .collect();
        matrix
    }

    #[test]
    fn two_d_cell_count_is_size_squared() {
        let cells = MatrixService::build_cells(&matrix_2d(5)).unwrap();
        assert_eq!(cells.len(), 25);
    }

    #[test]
    fn three_d_cell_count_is_size_cubed() {
        let cells = MatrixService::build_cells(&matrix_3d(4)).unwrap();
        assert_eq!(cells.len(), 64);
    }

    #[test]
    fn max_weight_cell_in_five_by_five_is_critical() {
        let matrix = matrix_2d(5);
        let cells = MatrixService::build_cells(&matrix).unwrap();

        let top = cells
            .iter()
            .find(|c| c.impact_index == 4 && c.likelihood_index == 4)
            .unwrap();
        assert_eq!(top.score, 25.0);
        assert_eq!(top.level, RiskLevel::Critical);

        let bottom = cells
            .iter()
            .find(|c| c.impact_index == 0 && c.likelihood_index == 0)
            .unwrap();
        assert_eq!(bottom.level, RiskLevel::Low);
    }

    #[test]
    fn normalized_breakpoints_band_correctly() {
        let matrix = matrix_2d(5);
        // size squared is 25: bands at 10 / 15 / 20
        assert_eq!(
            MatrixService::level_for_score(&matrix, 9.0),
            RiskLevel::Low
        );
        assert_eq!(
            MatrixService::level_for_score(&matrix, 10.0),
            RiskLevel::Medium
        );
        assert_eq!(
            MatrixService::level_for_score(&matrix, 15.0),
            RiskLevel::High
        );
        assert_eq!(
            MatrixService::level_for_score(&matrix, 20.0),
            RiskLevel::Critical
        );
    }

    #[test]
    fn explicit_thresholds_take_precedence() {
        let mut matrix = matrix_2d(5);
        matrix.thresholds = Some(ScoreThresholds {
            medium: 2.0,
            high: 4.0,
            critical: 6.0,
        });

        // 5.0 normalized would be Low, but explicit thresholds say High
        assert_eq!(
            MatrixService::level_for_score(&matrix, 5.0),
            RiskLevel::High
        );
        assert_eq!(
            MatrixService::level_for_score(&matrix, 1.0),
            RiskLevel::Low
        );
        assert_eq!(
            MatrixService::level_for_score(&matrix, 6.0),
            RiskLevel::Critical
        );
    }

    #[test]
    fn exposure_multiplier_scales_three_d_scores() {
        let matrix = matrix_3d(3);
        let cells = MatrixService::build_cells(&matrix).unwrap();

        // impact 3 * likelihood 3 = 9, times the third band's 1.25 multiplier
        let cell = cells
            .iter()
            .find(|c| {
                c.impact_index == 2 && c.likelihood_index == 2 && c.exposure_index == Some(2)
            })
            .unwrap();
        assert!((cell.score - 11.25).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_wrong_level_counts() {
        let mut matrix = matrix_2d(5);
        matrix.impact_levels.pop();

        let err = MatrixService::validate_matrix(&matrix).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn validate_rejects_three_d_without_exposure_levels() {
        let mut matrix = matrix_2d(5);
        matrix.kind = MatrixKind::ImpactLikelihoodExposure;

        let err = MatrixService::validate_matrix(&matrix).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn validate_rejects_non_ascending_thresholds() {
        let mut matrix = matrix_2d(5);
        matrix.thresholds = Some(ScoreThresholds {
            medium: 10.0,
            high: 5.0,
            critical: 20.0,
        });

        let err = MatrixService::validate_matrix(&matrix).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}

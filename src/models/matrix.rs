use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "matrix_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatrixKind {
    /// 2-D matrix: impact x likelihood
    ImpactLikelihood,
    /// 3-D matrix: impact x likelihood, scaled by an exposure multiplier
    ImpactLikelihoodExposure,
}

/// One configured level on the impact or likelihood axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixLevel {
    pub name: String,
    pub weight: f64,
}

/// One configured level on the exposure axis; carries the score multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureBand {
    pub name: String,
    pub weight: f64,
    pub multiplier: f64,
}

/// Explicit ascending score boundaries; overrides the normalized breakpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

/// Per-level SLA hours configured on the matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaHoursConfig {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl SlaHoursConfig {
    pub fn hours_for(&self, level: RiskLevel) -> i64 {
        match level {
            RiskLevel::Critical => self.critical,
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }
}

/// Configurable scoring grid mapping impact/likelihood/(exposure)
/// combinations to a discrete risk level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMatrix {
    pub id: Uuid,
    pub name: String,
    pub size: i32,
    pub kind: MatrixKind,
    pub is_default: bool,
    pub is_active: bool,
    pub impact_levels: Vec<MatrixLevel>,
    pub likelihood_levels: Vec<MatrixLevel>,
    pub exposure_levels: Vec<ExposureBand>,
    pub thresholds: Option<ScoreThresholds>,
    pub sla_hours: SlaHoursConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row shape; the level sets live in JSONB columns
#[derive(Debug, Clone, FromRow)]
pub struct RiskMatrixRow {
    pub id: Uuid,
    pub name: String,
    pub size: i32,
    pub kind: MatrixKind,
    pub is_default: bool,
    pub is_active: bool,
    pub impact_levels: Json<Vec<MatrixLevel>>,
    pub likelihood_levels: Json<Vec<MatrixLevel>>,
    pub exposure_levels: Json<Vec<ExposureBand>>,
    pub thresholds: Option<Json<ScoreThresholds>>,
    pub sla_hours: Json<SlaHoursConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RiskMatrixRow> for RiskMatrix {
    fn from(row: RiskMatrixRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            size: row.size,
            kind: row.kind,
            is_default: row.is_default,
            is_active: row.is_active,
            impact_levels: row.impact_levels.0,
            likelihood_levels: row.likelihood_levels.0,
            exposure_levels: row.exposure_levels.0,
            thresholds: row.thresholds.map(|t| t.0),
            sla_hours: row.sla_hours.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// One generated cell of a matrix. The cell set is always the full cross
/// product of the configured levels.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RiskMatrixCell {
    pub id: Uuid,
    pub matrix_id: Uuid,
    pub impact_index: i32,
    pub likelihood_index: i32,
    pub exposure_index: Option<i32>,
    pub score: f64,
    pub level: RiskLevel,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskMatrixCreate {
    pub name: String,
    pub size: i32,
    pub kind: MatrixKind,
    pub impact_levels: Vec<MatrixLevel>,
    pub likelihood_levels: Vec<MatrixLevel>,
    #[serde(default)]
    pub exposure_levels: Vec<ExposureBand>,
    #[serde(default)]
    pub thresholds: Option<ScoreThresholds>,
    pub sla_hours: SlaHoursConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskMatrixUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub impact_levels: Option<Vec<MatrixLevel>>,
    #[serde(default)]
    pub likelihood_levels: Option<Vec<MatrixLevel>>,
    #[serde(default)]
    pub exposure_levels: Option<Vec<ExposureBand>>,
    #[serde(default)]
    pub thresholds: Option<ScoreThresholds>,
    #[serde(default)]
    pub sla_hours: Option<SlaHoursConfig>,
}

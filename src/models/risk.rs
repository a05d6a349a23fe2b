use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "risk_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl From<&str> for RiskLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "high" => RiskLevel::High,
            "critical" => RiskLevel::Critical,
            _ => RiskLevel::Medium,
        }
    }
}

impl RiskLevel {
    /// Display color used by matrix cells and dashboards
    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Low => "#4caf50",
            RiskLevel::Medium => "#ffc107",
            RiskLevel::High => "#ff9800",
            RiskLevel::Critical => "#f44336",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "risk_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Open,
    Accepted,
    Mitigated,
    Closed,
}

impl Default for RiskStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Open => write!(f, "open"),
            RiskStatus::Accepted => write!(f, "accepted"),
            RiskStatus::Mitigated => write!(f, "mitigated"),
            RiskStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "risk_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskSource {
    BacklogRequest,
    Assessment,
    Incident,
    Manual,
}

impl std::fmt::Display for RiskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskSource::BacklogRequest => write!(f, "backlog_request"),
            RiskSource::Assessment => write!(f, "assessment"),
            RiskSource::Incident => write!(f, "incident"),
            RiskSource::Manual => write!(f, "manual"),
        }
    }
}

/// Qualitative impact scale used by assessments and pending drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "impact_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Negligible,
    Low,
    Moderate,
    High,
    Severe,
}

impl Default for ImpactLevel {
    fn default() -> Self {
        Self::Moderate
    }
}

impl From<&str> for ImpactLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "negligible" => ImpactLevel::Negligible,
            "low" => ImpactLevel::Low,
            "high" => ImpactLevel::High,
            "severe" => ImpactLevel::Severe,
            _ => ImpactLevel::Moderate,
        }
    }
}

impl ImpactLevel {
    pub fn weight(&self) -> f64 {
        match self {
            ImpactLevel::Negligible => 1.0,
            ImpactLevel::Low => 2.0,
            ImpactLevel::Moderate => 3.0,
            ImpactLevel::High => 4.0,
            ImpactLevel::Severe => 5.0,
        }
    }

    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.as_deref().map(Self::from).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "likelihood_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LikelihoodLevel {
    Rare,
    Unlikely,
    Possible,
    Likely,
    AlmostCertain,
}

impl Default for LikelihoodLevel {
    fn default() -> Self {
        Self::Possible
    }
}

impl From<&str> for LikelihoodLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rare" => LikelihoodLevel::Rare,
            "unlikely" => LikelihoodLevel::Unlikely,
            "likely" => LikelihoodLevel::Likely,
            "almost_certain" => LikelihoodLevel::AlmostCertain,
            _ => LikelihoodLevel::Possible,
        }
    }
}

impl LikelihoodLevel {
    pub fn weight(&self) -> f64 {
        match self {
            LikelihoodLevel::Rare => 1.0,
            LikelihoodLevel::Unlikely => 2.0,
            LikelihoodLevel::Possible => 3.0,
            LikelihoodLevel::Likely => 4.0,
            LikelihoodLevel::AlmostCertain => 5.0,
        }
    }

    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.as_deref().map(Self::from).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "exposure_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExposureLevel {
    Minimal,
    Low,
    Moderate,
    High,
    Extensive,
}

impl Default for ExposureLevel {
    fn default() -> Self {
        Self::Moderate
    }
}

impl From<&str> for ExposureLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "minimal" => ExposureLevel::Minimal,
            "low" => ExposureLevel::Low,
            "high" => ExposureLevel::High,
            "extensive" => ExposureLevel::Extensive,
            _ => ExposureLevel::Moderate,
        }
    }
}

impl ExposureLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            ExposureLevel::Minimal => 0.5,
            ExposureLevel::Low => 0.75,
            ExposureLevel::Moderate => 1.0,
            ExposureLevel::High => 1.25,
            ExposureLevel::Extensive => 1.5,
        }
    }

    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.as_deref().map(Self::from).unwrap_or_default())
    }
}

/// Persisted risk aggregate; only ever created by the materializer or
/// administrative imports outside this service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Risk {
    pub id: Uuid,
    pub risk_number: String,
    pub title: String,
    pub description: Option<String>,
    pub asset: Option<String>,
    pub business_unit: Option<String>,
    pub owner_id: Option<Uuid>,
    pub impact: ImpactLevel,
    pub likelihood: LikelihoodLevel,
    pub exposure: ExposureLevel,
    pub inherent_level: RiskLevel,
    pub status: RiskStatus,
    pub source: RiskSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully defaulted candidate produced by the materializer, ready to persist
#[derive(Debug, Clone)]
pub struct RiskCandidate {
    pub title: String,
    pub description: Option<String>,
    pub asset: Option<String>,
    pub business_unit: Option<String>,
    pub owner_id: Option<Uuid>,
    pub impact: ImpactLevel,
    pub likelihood: LikelihoodLevel,
    pub exposure: ExposureLevel,
    pub inherent_level: RiskLevel,
    pub source: RiskSource,
}

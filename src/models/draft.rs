use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::risk::{ExposureLevel, ImpactLevel, LikelihoodLevel};

/// Current draft schema version accepted by the materializer
pub const DRAFT_SCHEMA_VERSION: i32 = 1;

/// Candidate risk captured at request time and held inside the backlog
/// entry until a manager approves it. Nothing is written to the risk
/// register before approval.
///
/// Field-level gaps are tolerated: every field has a default and the
/// severity enums degrade unknown tokens to their mid value. Only a
/// structurally unparsable payload or an unsupported schema_version is
/// treated as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRiskDraft {
    #[serde(default = "default_schema_version")]
    pub schema_version: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(
        default,
        deserialize_with = "ImpactLevel::deserialize_lenient"
    )]
    pub impact: ImpactLevel,
    #[serde(
        default,
        deserialize_with = "LikelihoodLevel::deserialize_lenient"
    )]
    pub likelihood: LikelihoodLevel,
    #[serde(
        default,
        deserialize_with = "ExposureLevel::deserialize_lenient"
    )]
    pub exposure: ExposureLevel,
}

fn default_schema_version() -> i32 {
    DRAFT_SCHEMA_VERSION
}

impl Default for PendingRiskDraft {
    fn default() -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            title: String::new(),
            description: None,
            asset: None,
            business_unit: None,
            owner_id: None,
            impact: ImpactLevel::default(),
            likelihood: LikelihoodLevel::default(),
            exposure: ExposureLevel::default(),
        }
    }
}

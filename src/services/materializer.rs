use crate::{
    error::ApiError,
    models::{
        BacklogEntry, PendingRiskDraft, Risk, RiskCandidate, RiskLevel, RiskSource,
        DRAFT_SCHEMA_VERSION,
    },
    repositories::RiskDirectory,
    services::MatrixService,
};
use std::sync::Arc;
use uuid::Uuid;

/// Turns an approved new-risk entry's stored draft into a persisted risk
/// aggregate. Nothing reaches the risk register before manager approval.
pub struct RiskMaterializer {
    risk_directory: Arc<dyn RiskDirectory + Send + Sync>,
    matrix_service: Arc<MatrixService>,
}

impl RiskMaterializer {
    pub fn new(
        risk_directory: Arc<dyn RiskDirectory + Send + Sync>,
        matrix_service: Arc<MatrixService>,
    ) -> Self {
        Self {
            risk_directory,
            matrix_service,
        }
    }

    /// Deserializes the stored draft payload. Field-level gaps are tolerated
    /// by the draft schema itself; only a structurally unparsable payload or
    /// an unsupported schema version is fatal.
    pub fn parse_draft(entry: &BacklogEntry) -> Result<PendingRiskDraft, ApiError> {
        let value = entry.draft.clone().ok_or_else(|| {
            ApiError::materialization(format!(
                "entry {} carries no draft payload to materialize",
                entry.entry_number
            ))
        })?;

        let draft: PendingRiskDraft = serde_json::from_value(value).map_err(|e| {
            ApiError::materialization(format!(
                "entry {} draft payload is unparsable: {}",
                entry.entry_number, e
            ))
        })?;

        if draft.schema_version > DRAFT_SCHEMA_VERSION {
            return Err(ApiError::materialization(format!(
                "entry {} draft uses unsupported schema version {}",
                entry.entry_number, draft.schema_version
            )));
        }

        Ok(draft)
    }

    /// Parses the draft, applies defensive defaults, computes the inherent
    /// level and persists the risk with status Open. The caller backfills
    /// the entry's risk link in its own version-checked update and invokes
    /// `discard` if that update loses the version race.
    pub async fn materialize(&self, entry: &BacklogEntry) -> Result<Risk, ApiError> {
        let draft = Self::parse_draft(entry)?;

        let title = if draft.title.trim().is_empty() {
            entry.entry_number.clone()
        } else {
            draft.title.clone()
        };

        let score = draft.impact.weight() * draft.likelihood.weight() * draft.exposure.multiplier();
        let inherent_level = match self.matrix_service.classify_score(score).await {
            Ok(level) => level,
            // No active default matrix; band against the standard five-level
            // weight range so materialization still succeeds.
            Err(_) => fallback_level(score),
        };

        let candidate = RiskCandidate {
            title,
            description: draft.description,
            asset: draft.asset,
            business_unit: draft.business_unit,
            owner_id: draft.owner_id,
            impact: draft.impact,
            likelihood: draft.likelihood,
            exposure: draft.exposure,
            inherent_level,
            source: RiskSource::BacklogRequest,
        };

        let risk_number = self.risk_directory.next_risk_number().await?;
        let risk = self.risk_directory.create_risk(&candidate, &risk_number).await?;

        tracing::info!(
            entry_id = %entry.id,
            risk_id = %risk.id,
            risk_number = %risk.risk_number,
            inherent_level = %risk.inherent_level,
            "draft materialized into risk"
        );

        Ok(risk)
    }

    /// Compensation for an approval that lost its version race after the
    /// risk row was already written.
    pub async fn discard(&self, risk_id: &Uuid) {
        match self.risk_directory.delete(risk_id).await {
            Ok(true) => {
                tracing::warn!(risk_id = %risk_id, "discarded risk after failed approval");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    risk_id = %risk_id,
                    error = %e,
                    "failed to discard risk after failed approval"
                );
            }
        }
    }
}

fn fallback_level(score: f64) -> RiskLevel {
    let normalized = score / 25.0;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BacklogAction, BacklogStatus, ExposureLevel, ImpactLevel, LikelihoodLevel, RiskPriority,
    };
    use serde_json::json;

    fn entry_with_draft(draft: Option<serde_json::Value>) -> BacklogEntry {
        let now = chrono::Utc::now();
        BacklogEntry {
            id: Uuid::new_v4(),
            entry_number: "RB-2025-0001".to_string(),
            action: BacklogAction::NewRisk,
            status: BacklogStatus::AssignedToManager,
            priority: RiskPriority::Medium,
            justification: "test".to_string(),
            draft,
            risk_source: None,
            requester_id: Uuid::new_v4(),
            analyst_id: None,
            manager_id: None,
            assigned_at: None,
            analyst_comments: None,
            manager_comments: None,
            rejection_reason: None,
            due_date: now,
            sla_breached: false,
            risk_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn missing_payload_is_a_materialization_failure() {
        let err = RiskMaterializer::parse_draft(&entry_with_draft(None)).unwrap_err();
        assert!(matches!(err, ApiError::MaterializationFailure(_)));
    }

    #[test]
    fn unparsable_payload_is_a_materialization_failure() {
        let entry = entry_with_draft(Some(json!("not an object")));
        let err = RiskMaterializer::parse_draft(&entry).unwrap_err();
        assert!(matches!(err, ApiError::MaterializationFailure(_)));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let entry = entry_with_draft(Some(json!({
            "schema_version": 99,
            "title": "From the future"
        })));
        let err = RiskMaterializer::parse_draft(&entry).unwrap_err();
        assert!(matches!(err, ApiError::MaterializationFailure(_)));
    }

    #[test]
    fn cosmetic_gaps_parse_with_defaults() {
        let entry = entry_with_draft(Some(json!({
            "title": "Stale firewall rules",
            "impact": "not-a-real-impact"
        })));

        let draft = RiskMaterializer::parse_draft(&entry).unwrap();
        assert_eq!(draft.impact, ImpactLevel::Moderate);
        assert_eq!(draft.likelihood, LikelihoodLevel::Possible);
        assert_eq!(draft.exposure, ExposureLevel::Moderate);
    }

    #[test]
    fn fallback_banding_covers_the_weight_range() {
        assert_eq!(fallback_level(1.0), RiskLevel::Low);
        assert_eq!(fallback_level(10.0), RiskLevel::Medium);
        assert_eq!(fallback_level(15.0), RiskLevel::High);
        assert_eq!(fallback_level(25.0), RiskLevel::Critical);
    }
}

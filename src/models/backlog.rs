use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::draft::PendingRiskDraft;
use crate::models::risk::RiskSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "backlog_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BacklogAction {
    NewRisk,
    RiskAcceptance,
    RiskExtension,
    RiskReview,
    RiskReassessment,
}

impl BacklogAction {
    /// Default number of days until an entry of this kind is due
    pub fn default_due_days(&self) -> i64 {
        match self {
            BacklogAction::NewRisk => 5,
            BacklogAction::RiskAcceptance => 3,
            BacklogAction::RiskExtension => 2,
            BacklogAction::RiskReview => 7,
            BacklogAction::RiskReassessment => 10,
        }
    }
}

impl std::fmt::Display for BacklogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacklogAction::NewRisk => write!(f, "new_risk"),
            BacklogAction::RiskAcceptance => write!(f, "risk_acceptance"),
            BacklogAction::RiskExtension => write!(f, "risk_extension"),
            BacklogAction::RiskReview => write!(f, "risk_review"),
            BacklogAction::RiskReassessment => write!(f, "risk_reassessment"),
        }
    }
}

impl sqlx::postgres::PgHasArrayType for BacklogAction {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_backlog_action")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "backlog_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BacklogStatus {
    Unassigned,
    AssignedToAnalyst,
    AssignedToManager,
    Approved,
    Rejected,
    Escalated,
}

impl BacklogStatus {
    /// Approved and Rejected are terminal and never re-entered
    pub fn is_terminal(&self) -> bool {
        matches!(self, BacklogStatus::Approved | BacklogStatus::Rejected)
    }
}

impl std::fmt::Display for BacklogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacklogStatus::Unassigned => write!(f, "unassigned"),
            BacklogStatus::AssignedToAnalyst => write!(f, "assigned_to_analyst"),
            BacklogStatus::AssignedToManager => write!(f, "assigned_to_manager"),
            BacklogStatus::Approved => write!(f, "approved"),
            BacklogStatus::Rejected => write!(f, "rejected"),
            BacklogStatus::Escalated => write!(f, "escalated"),
        }
    }
}

impl sqlx::postgres::PgHasArrayType for BacklogStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_backlog_status")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "risk_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for RiskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for RiskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskPriority::Low => write!(f, "low"),
            RiskPriority::Medium => write!(f, "medium"),
            RiskPriority::High => write!(f, "high"),
            RiskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl sqlx::postgres::PgHasArrayType for RiskPriority {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_risk_priority")
    }
}

impl From<crate::models::risk::RiskLevel> for RiskPriority {
    fn from(level: crate::models::risk::RiskLevel) -> Self {
        use crate::models::risk::RiskLevel;
        match level {
            RiskLevel::Low => RiskPriority::Low,
            RiskLevel::Medium => RiskPriority::Medium,
            RiskLevel::High => RiskPriority::High,
            RiskLevel::Critical => RiskPriority::Critical,
        }
    }
}

impl From<RiskPriority> for crate::models::risk::RiskLevel {
    fn from(priority: RiskPriority) -> Self {
        use crate::models::risk::RiskLevel;
        match priority {
            RiskPriority::Low => RiskLevel::Low,
            RiskPriority::Medium => RiskLevel::Medium,
            RiskPriority::High => RiskLevel::High,
            RiskPriority::Critical => RiskLevel::Critical,
        }
    }
}

/// A pending request to change the risk register, tracked through the
/// analyst/manager approval workflow.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub id: Uuid,
    pub entry_number: String,
    pub action: BacklogAction,
    pub status: BacklogStatus,
    pub priority: RiskPriority,
    pub justification: String,
    /// Serialized PendingRiskDraft for new-risk entries until approval
    pub draft: Option<Value>,
    pub risk_source: Option<RiskSource>,
    pub requester_id: Uuid,
    pub analyst_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub analyst_comments: Option<String>,
    pub manager_comments: Option<String>,
    pub rejection_reason: Option<String>,
    pub due_date: DateTime<Utc>,
    pub sla_breached: bool,
    pub risk_id: Option<Uuid>,
    /// Optimistic concurrency token, incremented on every mutation
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacklogEntryCreate {
    pub action: BacklogAction,
    pub justification: String,
    #[serde(default)]
    pub risk_id: Option<Uuid>,
    #[serde(default)]
    pub draft: Option<PendingRiskDraft>,
    pub requester_id: Uuid,
}

/// Filter criteria for backlog queries
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BacklogFilter {
    #[serde(default)]
    pub statuses: Option<Vec<BacklogStatus>>,
    #[serde(default)]
    pub actions: Option<Vec<BacklogAction>>,
    #[serde(default)]
    pub priorities: Option<Vec<RiskPriority>>,
    #[serde(default)]
    pub requester_id: Option<Uuid>,
    #[serde(default)]
    pub analyst_id: Option<Uuid>,
    #[serde(default)]
    pub manager_id: Option<Uuid>,
    #[serde(default)]
    pub breached_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

/// Response for paginated backlog listings
#[derive(Debug, Clone, Serialize)]
pub struct BacklogListResponse {
    pub entries: Vec<BacklogEntry>,
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Dashboard aggregates over the backlog
#[derive(Debug, Clone, Serialize)]
pub struct BacklogStatistics {
    pub total: i64,
    pub by_status: std::collections::HashMap<String, i64>,
    pub by_priority: std::collections::HashMap<String, i64>,
    pub by_action: std::collections::HashMap<String, i64>,
    pub overdue: i64,
    pub sla_breached: i64,
}

/// Result of a bulk workflow operation; items fail independently
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOperationResult {
    pub success_count: i32,
    pub error_count: i32,
    pub errors: Vec<String>,
}

impl BulkOperationResult {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_error(&mut self, entry_id: Uuid, err: &crate::error::ApiError) {
        self.error_count += 1;
        if self.errors.len() < 10 {
            self.errors.push(format!("{}: {}", entry_id, err));
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    Assignment,
    AnalystApproval,
    AnalystRejection,
    ManagerApproval,
    ManagerRejection,
    Escalation,
    PriorityChange,
    SlaBreach,
    CommentAdded,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityType::Created => "created",
            ActivityType::Assignment => "assignment",
            ActivityType::AnalystApproval => "analyst_approval",
            ActivityType::AnalystRejection => "analyst_rejection",
            ActivityType::ManagerApproval => "manager_approval",
            ActivityType::ManagerRejection => "manager_rejection",
            ActivityType::Escalation => "escalation",
            ActivityType::PriorityChange => "priority_change",
            ActivityType::SlaBreach => "sla_breach",
            ActivityType::CommentAdded => "comment_added",
        };
        write!(f, "{}", s)
    }
}

/// Append-only audit record; one or more per workflow mutation
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub activity_type: ActivityType,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub description: String,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityCreate {
    pub entry_id: Uuid,
    pub activity_type: ActivityType,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub description: String,
    pub actor_id: Uuid,
}

/// Free-form discussion on an entry, separate from the activity log.
/// Internal comments are filtered out for non-staff readers by the
/// access-control layer.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentCreate {
    pub body: String,
    #[serde(default)]
    pub is_internal: bool,
    pub author_id: Uuid,
}

/// Record of an SLA breach detected by the sweep
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SlaHistory {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub risk_level: RiskLevel,
    pub deadline: DateTime<Utc>,
    pub breached_at: DateTime<Utc>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SlaHistoryCreate {
    pub entry_id: Uuid,
    pub risk_level: RiskLevel,
    pub deadline: DateTime<Utc>,
    pub breached_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reserved principal used as the actor for background sweeps. Always
/// passed explicitly by the trigger, never inferred from a missing
/// parameter.
pub const SYSTEM_PRINCIPAL: Uuid = Uuid::from_u128(1);

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

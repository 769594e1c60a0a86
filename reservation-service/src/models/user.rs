//! Local user records, keyed by the identity provider's user id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Approver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Approver => "approver",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub accepted_terms: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(id: i64, first_name: String, last_name: String) -> Self {
        Self {
            id,
            first_name,
            last_name,
            role: UserRole::Student,
            accepted_terms: false,
            created_at: Utc::now(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_approver(&self) -> bool {
        self.role == UserRole::Approver
    }
}

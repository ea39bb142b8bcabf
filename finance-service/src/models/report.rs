use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Sent,
    Failed,
    NoActivity,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Sent => write!(f, "SENT"),
            ReportStatus::Failed => write!(f, "FAILED"),
            ReportStatus::NoActivity => write!(f, "NO_ACTIVITY"),
        }
    }
}

/// Audit row appended once per processed report setting. Never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub sent_date: DateTime<Utc>,
    pub period: String,
    pub status: ReportStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Report {
    pub fn new(user_id: ObjectId, period: String, status: ReportStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            sent_date: now,
            period,
            status,
            created_utc: now,
            updated_utc: now,
        }
    }
}

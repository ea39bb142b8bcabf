use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::opt_chrono_datetime_as_bson_datetime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFrequency {
    #[default]
    Monthly,
}

impl ReportFrequency {
    /// Human readable form used in email subjects.
    pub fn label(&self) -> &'static str {
        match self {
            ReportFrequency::Monthly => "Monthly",
        }
    }
}

impl std::fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFrequency::Monthly => write!(f, "MONTHLY"),
        }
    }
}

/// Per-user report subscription. Exactly one exists for each user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSetting {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub frequency: ReportFrequency,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default, with = "opt_chrono_datetime_as_bson_datetime")]
    pub next_report_date: Option<DateTime<Utc>>,
    #[serde(default, with = "opt_chrono_datetime_as_bson_datetime")]
    pub last_sent_date: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl ReportSetting {
    pub fn new(user_id: ObjectId, next_report_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            frequency: ReportFrequency::Monthly,
            is_enabled: true,
            next_report_date: Some(next_report_date),
            last_sent_date: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && self.next_report_date.is_some_and(|next| next <= now)
    }
}

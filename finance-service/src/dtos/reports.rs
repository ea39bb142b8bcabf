use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Report, ReportFrequency, ReportSetting, ReportStatus};
use crate::services::{Pagination, ReportPage};

const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSettingResponse {
    pub id: String,
    pub frequency: ReportFrequency,
    pub is_enabled: bool,
    pub next_report_date: Option<DateTime<Utc>>,
    pub last_sent_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReportSetting> for ReportSettingResponse {
    fn from(setting: ReportSetting) -> Self {
        Self {
            id: setting.id.to_hex(),
            frequency: setting.frequency,
            is_enabled: setting.is_enabled,
            next_report_date: setting.next_report_date,
            last_sent_date: setting.last_sent_date,
            created_at: setting.created_utc,
            updated_at: setting.updated_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportSettingRequest {
    pub is_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub period: String,
    pub status: ReportStatus,
    pub sent_date: DateTime<Utc>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            id: report.id.to_hex(),
            period: report.period,
            status: report.status,
            sent_date: report.sent_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListParams {
    pub page_size: Option<u64>,
    pub page_number: Option<u64>,
}

impl ReportListParams {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination::new(
            self.page_size
                .unwrap_or(defaults.page_size)
                .min(MAX_PAGE_SIZE),
            self.page_number.unwrap_or(defaults.page_number),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    pub reports: Vec<ReportResponse>,
    pub total_count: u64,
    pub total_pages: u64,
    pub page_number: u64,
    pub page_size: u64,
}

impl From<ReportPage> for ReportListResponse {
    fn from(page: ReportPage) -> Self {
        Self {
            reports: page.reports.into_iter().map(ReportResponse::from).collect(),
            total_count: page.total_count,
            total_pages: page.total_pages,
            page_number: page.page_number,
            page_size: page.page_size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportParams {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_default_and_cap() {
        let page = ReportListParams::default().pagination();
        assert_eq!((page.page_size, page.page_number), (20, 1));

        let page = ReportListParams {
            page_size: Some(500),
            page_number: Some(0),
        }
        .pagination();
        assert_eq!((page.page_size, page.page_number), (100, 1));
    }
}

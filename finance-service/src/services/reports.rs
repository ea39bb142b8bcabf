//! On-demand report generation and the report audit trail.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;

use crate::jobs::dates::period_label;
use crate::models::Report;
use crate::services::aggregator::{ReportAggregator, ReportSummary};
use crate::services::error::ServiceError;
use crate::services::insights::InsightGenerator;
use crate::services::providers::TextProvider;
use crate::services::store::{FinanceStore, Pagination};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedReport {
    pub period: String,
    pub summary: ReportSummary,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total_count: u64,
    pub total_pages: u64,
    pub page_number: u64,
    pub page_size: u64,
}

pub struct ReportService {
    store: Arc<dyn FinanceStore>,
    aggregator: ReportAggregator,
    insights: InsightGenerator,
}

impl ReportService {
    pub fn new(store: Arc<dyn FinanceStore>, text_provider: Arc<dyn TextProvider>) -> Self {
        Self {
            aggregator: ReportAggregator::new(store.clone()),
            insights: InsightGenerator::new(text_provider),
            store,
        }
    }

    /// Summary and insights for `[from, to]`, or `None` without activity.
    pub async fn generate(
        &self,
        user_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<GeneratedReport>, ServiceError> {
        if from > to {
            return Err(ServiceError::Validation(
                "report start must not be after its end".to_string(),
            ));
        }

        let Some(summary) = self.aggregator.aggregate(user_id, from, to).await? else {
            return Ok(None);
        };

        let period = period_label(from, to);
        let insights = self.insights.generate(&summary, &period).await;

        Ok(Some(GeneratedReport {
            period,
            summary,
            insights,
        }))
    }

    pub async fn list(
        &self,
        user_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<ReportPage, ServiceError> {
        let (reports, total_count) = self.store.list_reports(user_id, pagination).await?;

        Ok(ReportPage {
            reports,
            total_count,
            total_pages: total_count.div_ceil(pagination.page_size),
            page_number: pagination.page_number,
            page_size: pagination.page_size,
        })
    }
}

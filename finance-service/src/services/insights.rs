//! Best-effort AI commentary attached to a report.

use std::sync::Arc;
use thiserror::Error;

use crate::services::aggregator::ReportSummary;
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};

const INSIGHT_COUNT: usize = 3;

#[derive(Debug, Error)]
enum InsightError {
    #[error("provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("empty response")]
    Empty,

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct InsightGenerator {
    provider: Arc<dyn TextProvider>,
}

impl InsightGenerator {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self { provider }
    }

    /// Short observations about the period. Any failure yields an empty list.
    pub async fn generate(&self, summary: &ReportSummary, period: &str) -> Vec<String> {
        match self.request(summary, period).await {
            Ok(insights) => insights,
            Err(e) => {
                tracing::warn!(period = %period, error = %e, "Insight generation failed");
                Vec::new()
            }
        }
    }

    async fn request(
        &self,
        summary: &ReportSummary,
        period: &str,
    ) -> Result<Vec<String>, InsightError> {
        let params = GenerationParams {
            temperature: Some(0.4),
            json_output: true,
            ..Default::default()
        };
        let response = self
            .provider
            .generate(&build_prompt(summary, period), &params)
            .await?;
        let text = response.text.ok_or(InsightError::Empty)?;
        parse_insights(&text)
    }
}

fn build_prompt(summary: &ReportSummary, period: &str) -> String {
    let mut prompt = format!(
        "You are a personal finance assistant. Review this spending summary for {period} \
         and write {INSIGHT_COUNT} short, practical observations for the account owner.\n\n\
         Total income: ${income}\n\
         Total expenses: ${expenses}\n\
         Available balance: ${balance}\n\
         Savings rate: {rate}%\n",
        income = summary.income,
        expenses = summary.expenses,
        balance = summary.balance,
        rate = summary.savings_rate,
    );

    if !summary.top_categories.is_empty() {
        prompt.push_str("Top expense categories:\n");
        for category in &summary.top_categories {
            prompt.push_str(&format!(
                "- {}: ${} ({}%)\n",
                category.name, category.amount, category.percentage
            ));
        }
    }

    prompt.push_str(
        "\nRespond with a JSON array of strings only, for example \
         [\"insight one\", \"insight two\"]. No markdown, no keys, no extra text.",
    );
    prompt
}

/// Parse a JSON array of strings, tolerating markdown code fences.
fn parse_insights(raw: &str) -> Result<Vec<String>, InsightError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(InsightError::Empty);
    }
    Ok(serde_json::from_str(cleaned)?)
}

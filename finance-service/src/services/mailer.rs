//! Renders a generated report into an email and hands it to the provider.

use askama::Template;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

use crate::models::{ReportFrequency, User};
use crate::services::providers::{EmailMessage, EmailProvider, ProviderError, ProviderResponse};
use crate::services::reports::GeneratedReport;

pub struct ReportMailer {
    provider: Arc<dyn EmailProvider>,
}

impl ReportMailer {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }

    /// Fails with `NotEnabled` when the provider is disabled.
    pub async fn send_report(
        &self,
        user: &User,
        frequency: ReportFrequency,
        report: &GeneratedReport,
    ) -> Result<ProviderResponse, ProviderError> {
        if !self.provider.is_enabled() {
            return Err(ProviderError::NotEnabled(
                "no email provider configured for report delivery".to_string(),
            ));
        }
        let message = render_report_email(user, frequency, report)?;
        self.provider.send(&message).await
    }
}

struct CategoryLine {
    name: String,
    amount: String,
    percentage: u32,
}

#[derive(Template)]
#[template(path = "report_email.html")]
struct ReportEmailTemplate {
    frequency: &'static str,
    user_name: String,
    period: String,
    income: String,
    expenses: String,
    balance: String,
    savings_rate: String,
    categories: Vec<CategoryLine>,
    insights: Vec<String>,
}

impl ReportEmailTemplate {
    fn new(user: &User, frequency: ReportFrequency, report: &GeneratedReport) -> Self {
        let summary = &report.summary;
        Self {
            frequency: frequency.label(),
            user_name: user.name.clone(),
            period: report.period.clone(),
            income: format_currency(summary.income),
            expenses: format_currency(summary.expenses),
            balance: format_currency(summary.balance),
            savings_rate: format!("{:.1}", summary.savings_rate),
            categories: summary
                .top_categories
                .iter()
                .map(|category| CategoryLine {
                    name: category.name.clone(),
                    amount: format_currency(category.amount),
                    percentage: category.percentage,
                })
                .collect(),
            insights: report.insights.clone(),
        }
    }
}

pub fn render_report_email(
    user: &User,
    frequency: ReportFrequency,
    report: &GeneratedReport,
) -> Result<EmailMessage, ProviderError> {
    let html = ReportEmailTemplate::new(user, frequency, report)
        .render()
        .map_err(|e| ProviderError::SendFailed(format!("Failed to render report email: {}", e)))?;

    Ok(EmailMessage {
        to: user.email.clone(),
        subject: format!("{} Financial Report - {}", frequency.label(), report.period),
        body_text: Some(render_text(frequency, report)),
        body_html: Some(html),
        from_name: None,
    })
}

fn render_text(frequency: ReportFrequency, report: &GeneratedReport) -> String {
    let summary = &report.summary;
    let mut text = format!(
        "Your {} Financial Report ({})\n\n\
         Income: {}\n\
         Expenses: {}\n\
         Balance: {}\n\
         Savings Rate: {:.1}%\n",
        frequency.label(),
        report.period,
        format_currency(summary.income),
        format_currency(summary.expenses),
        format_currency(summary.balance),
        summary.savings_rate,
    );

    if !summary.top_categories.is_empty() {
        text.push_str("\nTop Spending Categories:\n");
        for category in &summary.top_categories {
            text.push_str(&format!(
                "  {}: {} ({}%)\n",
                category.name,
                format_currency(category.amount),
                category.percentage
            ));
        }
    }

    if !report.insights.is_empty() {
        text.push_str("\nInsights:\n");
        for insight in &report.insights {
            text.push_str(&format!("  - {}\n", insight));
        }
    }

    text
}

/// `1234.5` -> `$1,234.50`, negatives as `-$12.50`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_string();
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{:0<2}", sign, grouped, fraction)
}

//! Per-user income/expense summary for a date window.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;

use crate::services::store::{FinanceStore, PeriodTotals, StoreError};

/// Minor units per display unit.
const MINOR_UNIT_SCALE: u32 = 2;
const TOP_CATEGORY_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub amount: Decimal,
    /// Whole-number share of total expenses.
    pub percentage: u32,
}

/// Display-unit view of one user's activity over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    /// Percentage of income kept, one decimal place.
    pub savings_rate: Decimal,
    pub top_categories: Vec<CategorySummary>,
}

pub fn to_display_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// Convert display units to minor units, rejecting sub-cent precision.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let scaled = amount.checked_mul(Decimal::from(100))?;
    if scaled.fract() != Decimal::ZERO {
        return None;
    }
    scaled.to_i64()
}

pub fn savings_rate(income: i64, expenses: i64) -> Decimal {
    if income <= 0 {
        return Decimal::ZERO;
    }
    let rate = Decimal::from(income - expenses) * Decimal::from(100) / Decimal::from(income);
    rate.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// `total / expenses` as a whole percentage, halves rounded up.
fn category_percentage(total: i64, expenses: i64) -> u32 {
    if expenses <= 0 {
        return 0;
    }
    let (total, expenses) = (i128::from(total), i128::from(expenses));
    let rounded = (total * 200 + expenses) / (expenses * 2);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// Turn raw sums into a summary. `None` when the window had no activity.
pub fn summarize(totals: PeriodTotals) -> Option<ReportSummary> {
    if totals.income == 0 && totals.expenses == 0 {
        return None;
    }

    let mut categories = totals.expense_categories;
    // Stable: equal totals keep store order.
    categories.sort_by(|a, b| b.total.cmp(&a.total));
    categories.truncate(TOP_CATEGORY_LIMIT);

    let top_categories = categories
        .into_iter()
        .map(|c| CategorySummary {
            amount: to_display_units(c.total),
            percentage: category_percentage(c.total, totals.expenses),
            name: c.category,
        })
        .collect();

    Some(ReportSummary {
        income: to_display_units(totals.income),
        expenses: to_display_units(totals.expenses),
        balance: to_display_units(totals.income - totals.expenses),
        savings_rate: savings_rate(totals.income, totals.expenses),
        top_categories,
    })
}

pub struct ReportAggregator {
    store: Arc<dyn FinanceStore>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    pub async fn aggregate(
        &self,
        user_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Option<ReportSummary>, StoreError> {
        let totals = self.store.period_totals(user_id, from, to).await?;
        Ok(summarize(totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::CategoryTotal;
    use std::str::FromStr;

    fn category(name: &str, total: i64) -> CategoryTotal {
        CategoryTotal {
            category: name.to_string(),
            total,
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_summary_for_mixed_activity() {
        let summary = summarize(PeriodTotals {
            income: 10_000,
            expenses: 5_000,
            expense_categories: vec![category("rent", 3_000), category("food", 2_000)],
        })
        .unwrap();

        assert_eq!(summary.income, dec("100"));
        assert_eq!(summary.expenses, dec("50"));
        assert_eq!(summary.balance, dec("50"));
        assert_eq!(summary.savings_rate, dec("50.0"));
        assert_eq!(summary.top_categories[0].name, "rent");
        assert_eq!(summary.top_categories[0].amount, dec("30"));
        assert_eq!(summary.top_categories[0].percentage, 60);
        assert_eq!(summary.top_categories[1].percentage, 40);
    }

    #[test]
    fn test_no_activity_yields_none() {
        assert_eq!(summarize(PeriodTotals::default()), None);
    }

    #[test]
    fn test_expenses_without_income() {
        let summary = summarize(PeriodTotals {
            income: 0,
            expenses: 1_250,
            expense_categories: vec![category("food", 1_250)],
        })
        .unwrap();

        assert_eq!(summary.savings_rate, Decimal::ZERO);
        assert_eq!(summary.balance, dec("-12.50"));
        assert_eq!(summary.top_categories[0].percentage, 100);
    }

    #[test]
    fn test_savings_rate_rounding() {
        // 2/3 of income kept: 66.666.. -> 66.67 -> 66.7
        assert_eq!(savings_rate(300, 100), dec("66.7"));
        // Overspending goes negative.
        assert_eq!(savings_rate(100, 150), dec("-50.0"));
    }

    #[test]
    fn test_category_percentage_rounds_half_up() {
        assert_eq!(category_percentage(1, 8), 13);
        assert_eq!(category_percentage(1, 3), 33);
        assert_eq!(category_percentage(5, 0), 0);
    }

    #[test]
    fn test_top_categories_capped_and_stable_on_ties() {
        let summary = summarize(PeriodTotals {
            income: 0,
            expenses: 700,
            expense_categories: vec![
                category("a", 100),
                category("b", 200),
                category("c", 100),
                category("d", 100),
                category("e", 100),
                category("f", 100),
            ],
        })
        .unwrap();

        let names: Vec<&str> = summary
            .top_categories
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "c", "d", "e"]);
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec("12.34")), Some(1_234));
        assert_eq!(to_minor_units(dec("5")), Some(500));
        assert_eq!(to_minor_units(dec("0.001")), None);
        assert_eq!(to_display_units(1_234), dec("12.34"));
    }
}

mod common;

use common::{at, entry, recurring, TestHarness};
use finance_service::jobs::{JobRunSummary, RecurrenceProcessor};
use finance_service::models::{RecurringInterval, TransactionType};
use finance_service::services::FinanceStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn due_template_materializes_one_instance() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    let rent = recurring(
        user.id,
        "Rent",
        120_000,
        RecurringInterval::Monthly,
        at(2024, 3, 1, 0, 0),
    );
    harness.store.insert_transaction(&rent).await.unwrap();

    let summary = harness.state.recurrence.run().await;

    assert_eq!(summary, JobRunSummary::completed(1, 0));
    let all = harness.store.transactions();
    assert_eq!(all.len(), 2);

    let template = harness.store.transaction(&rent.id).unwrap();
    assert_eq!(template.next_recurring_date, Some(at(2024, 4, 1, 0, 0)));
    assert_eq!(template.last_processed, Some(now));
    assert!(template.is_recurring);

    let instance = all.iter().find(|t| t.id != rent.id).unwrap();
    assert_eq!(instance.title, "Recurring - Rent");
    assert_eq!(instance.date, at(2024, 3, 1, 0, 0));
    assert_eq!(instance.amount, 120_000);
    assert!(!instance.is_recurring);
    assert_eq!(instance.next_recurring_date, None);
    assert_eq!(instance.recurring_interval, None);
}

#[tokio::test]
async fn second_run_without_clock_advance_processes_nothing() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    for (title, interval) in [
        ("Coffee", RecurringInterval::Daily),
        ("Cleaner", RecurringInterval::Weekly),
        ("Rent", RecurringInterval::Monthly),
        ("Insurance", RecurringInterval::Yearly),
    ] {
        let tx = recurring(user.id, title, 1_000, interval, at(2024, 3, 1, 0, 0));
        harness.store.insert_transaction(&tx).await.unwrap();
    }

    assert_eq!(
        harness.state.recurrence.run().await,
        JobRunSummary::completed(4, 0)
    );
    assert_eq!(
        harness.state.recurrence.run().await,
        JobRunSummary::completed(0, 0)
    );
    assert_eq!(harness.store.transactions().len(), 8);
}

#[tokio::test]
async fn overdue_template_catches_up_one_period_per_run() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    let gym = recurring(user.id, "Gym", 4_000, RecurringInterval::Monthly, at(2023, 12, 1, 9, 0));
    harness.store.insert_transaction(&gym).await.unwrap();

    let summary = harness.state.recurrence.run().await;

    assert_eq!(summary, JobRunSummary::completed(1, 0));
    assert_eq!(harness.store.transactions().len(), 2);
    assert_eq!(
        harness.store.transaction(&gym.id).unwrap().next_recurring_date,
        Some(at(2024, 1, 1, 9, 0))
    );

    // Still behind, so the next run takes exactly one more step.
    harness.state.recurrence.run().await;
    assert_eq!(harness.store.transactions().len(), 3);
    assert_eq!(
        harness.store.transaction(&gym.id).unwrap().next_recurring_date,
        Some(at(2024, 2, 1, 9, 0))
    );
}

#[tokio::test]
async fn month_end_anchor_clamps() {
    let harness = TestHarness::new(at(2024, 2, 1, 0, 5));
    let user = harness.add_user("Ada");
    let loan = recurring(
        user.id,
        "Loan",
        50_000,
        RecurringInterval::Monthly,
        at(2024, 1, 31, 0, 0),
    );
    harness.store.insert_transaction(&loan).await.unwrap();

    harness.state.recurrence.run().await;

    assert_eq!(
        harness.store.transaction(&loan.id).unwrap().next_recurring_date,
        Some(at(2024, 2, 29, 0, 0))
    );
}

#[tokio::test]
async fn failed_update_persists_nothing_for_that_record() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    let rent = recurring(
        user.id,
        "Rent",
        120_000,
        RecurringInterval::Monthly,
        at(2024, 3, 1, 0, 0),
    );
    let phone = recurring(
        user.id,
        "Phone",
        3_000,
        RecurringInterval::Monthly,
        at(2024, 3, 1, 0, 0),
    );
    harness.store.insert_transactions(&[rent.clone(), phone.clone()]).await.unwrap();
    harness.store.fail_transaction_update(rent.id);

    let summary = harness.state.recurrence.run().await;

    assert_eq!(summary, JobRunSummary::completed(1, 1));
    let all = harness.store.transactions();
    assert_eq!(all.len(), 3);
    assert!(!all.iter().any(|t| t.title == "Recurring - Rent"));
    assert!(all.iter().any(|t| t.title == "Recurring - Phone"));
    assert_eq!(harness.store.transaction(&rent.id).unwrap(), rent);
}

#[tokio::test]
async fn unavailable_store_aborts_the_run() {
    let harness = TestHarness::new(at(2024, 3, 1, 0, 5));
    harness.store.set_unavailable(true);

    let summary = harness.state.recurrence.run().await;

    assert!(!summary.success);
    assert_eq!(summary.processed_count, 0);
    assert_eq!(summary.failed_count, 0);
    assert!(summary.error.is_some());
}

#[tokio::test]
async fn one_off_and_future_transactions_are_ignored() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    let salary = entry(user.id, TransactionType::Income, "salary", 500_000, at(2024, 2, 28, 0, 0));
    let later = recurring(user.id, "Later", 1_000, RecurringInterval::Weekly, at(2024, 3, 2, 0, 0));
    harness.store.insert_transactions(&[salary, later]).await.unwrap();

    assert_eq!(
        harness.state.recurrence.run().await,
        JobRunSummary::completed(0, 0)
    );
    assert_eq!(harness.store.transactions().len(), 2);
}

#[tokio::test]
async fn overlapping_runs_materialize_once() {
    let now = at(2024, 3, 1, 0, 5);
    let harness = TestHarness::new(now);
    let user = harness.add_user("Ada");
    let rent = recurring(
        user.id,
        "Rent",
        120_000,
        RecurringInterval::Monthly,
        at(2024, 3, 1, 0, 0),
    );
    harness.store.insert_transaction(&rent).await.unwrap();

    let second = RecurrenceProcessor::new(
        harness.store.clone(),
        harness.clock.clone(),
        Duration::from_secs(20),
    );
    let first = Arc::clone(&harness.state.recurrence);

    let (a, b) = tokio::join!(first.run(), second.run());

    assert_eq!(a.processed_count + b.processed_count, 1);
    assert_eq!(harness.store.transactions().len(), 2);
}

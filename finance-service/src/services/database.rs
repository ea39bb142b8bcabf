use crate::models::{Report, ReportSetting, Transaction, TransactionType, User};
use crate::services::store::{
    CategoryTotal, FinanceStore, Pagination, PeriodTotals, RecordStream, RecurrenceUnit,
    ReportOutcomeUnit, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document},
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{FindOptions, IndexOptions, TransactionOptions},
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Duration;

const MAX_TRANSACTION_ATTEMPTS: u32 = 3;
const MAX_COMMIT_ATTEMPTS: u32 = 3;
const TOP_CATEGORY_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct FinanceDb {
    client: MongoClient,
    db: Database,
}

impl FinanceDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for finance-service");

        let indexes: [(&str, Document, &str, bool); 5] = [
            (
                "transactions",
                doc! { "is_recurring": 1, "next_recurring_date": 1 },
                "recurring_due_idx",
                false,
            ),
            (
                "transactions",
                doc! { "user_id": 1, "date": -1 },
                "user_date_idx",
                false,
            ),
            (
                "report_settings",
                doc! { "user_id": 1 },
                "user_id_idx",
                true,
            ),
            (
                "report_settings",
                doc! { "is_enabled": 1, "next_report_date": 1 },
                "report_due_idx",
                false,
            ),
            (
                "reports",
                doc! { "user_id": 1, "created_utc": -1 },
                "user_created_idx",
                false,
            ),
        ];

        for (collection, keys, name, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(name.to_string())
                        .unique(unique)
                        .build(),
                )
                .build();

            self.db
                .collection::<Document>(collection)
                .create_index(model, None)
                .await
                .map_err(|e| {
                    tracing::error!(collection, index = name, "Failed to create index: {}", e);
                    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
                })?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn transactions(&self) -> Collection<Transaction> {
        self.db.collection("transactions")
    }

    pub fn report_settings(&self) -> Collection<ReportSetting> {
        self.db.collection("report_settings")
    }

    pub fn reports(&self) -> Collection<Report> {
        self.db.collection("reports")
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    async fn start_transaction(&self, deadline: Duration) -> Result<ClientSession, StoreError> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .max_commit_time(deadline)
            .build();
        session.start_transaction(options).await?;
        Ok(session)
    }

    async fn apply_recurrence(
        &self,
        unit: &RecurrenceUnit,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        self.transactions()
            .insert_one_with_session(&unit.instance, None, session)
            .await?;

        let result = self
            .transactions()
            .update_one_with_session(
                doc! {
                    "_id": unit.source_id,
                    "is_recurring": true,
                    "next_recurring_date": BsonDateTime::from_chrono(unit.expected_next_date),
                },
                doc! {
                    "$set": {
                        "next_recurring_date": BsonDateTime::from_chrono(unit.next_recurring_date),
                        "last_processed": BsonDateTime::from_chrono(unit.processed_at),
                        "updated_utc": BsonDateTime::from_chrono(unit.processed_at),
                    }
                },
                None,
                session,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::StaleRecord(format!(
                "transaction {} was already advanced",
                unit.source_id
            )));
        }
        Ok(())
    }

    async fn apply_report_outcome(
        &self,
        unit: &ReportOutcomeUnit,
        session: &mut ClientSession,
    ) -> Result<(), StoreError> {
        self.reports()
            .insert_one_with_session(&unit.report, None, session)
            .await?;

        let expected = unit
            .expected_next_report_date
            .map(BsonDateTime::from_chrono);
        let result = self
            .report_settings()
            .update_one_with_session(
                doc! { "_id": unit.setting_id, "next_report_date": expected },
                doc! {
                    "$set": {
                        "last_sent_date": unit.last_sent_date.map(BsonDateTime::from_chrono),
                        "next_report_date": BsonDateTime::from_chrono(unit.next_report_date),
                        "updated_utc": BsonDateTime::from_chrono(unit.updated_at),
                    }
                },
                None,
                session,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(StoreError::StaleRecord(format!(
                "report setting {} was already advanced",
                unit.setting_id
            )));
        }
        Ok(())
    }
}

/// Commit, retrying while the server cannot tell whether the commit landed.
async fn commit_with_retry(session: &mut ClientSession) -> Result<(), StoreError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                tracing::warn!(attempt, "Commit result unknown, retrying commit: {}", e);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Finish a session whose writes have been applied (or failed).
async fn finish(
    mut session: ClientSession,
    applied: Result<(), StoreError>,
) -> Result<(), StoreError> {
    match applied {
        Ok(()) => commit_with_retry(&mut session).await,
        Err(e) => {
            if let Err(abort_err) = session.abort_transaction().await {
                tracing::warn!("Failed to abort transaction: {}", abort_err);
            }
            Err(e)
        }
    }
}

fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Database(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

fn bson_to_i64(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => v.round() as i64,
        _ => 0,
    }
}

fn parse_period_totals(result: &Document) -> PeriodTotals {
    let summary = result
        .get_array("summary")
        .ok()
        .and_then(|rows| rows.first())
        .and_then(Bson::as_document);

    let expense_categories = result
        .get_array("categories")
        .map(|rows| {
            rows.iter()
                .filter_map(Bson::as_document)
                .map(|row| CategoryTotal {
                    category: row.get_str("_id").unwrap_or_default().to_string(),
                    total: bson_to_i64(row.get("total")),
                })
                .collect()
        })
        .unwrap_or_default();

    PeriodTotals {
        income: summary.map_or(0, |s| bson_to_i64(s.get("total_income"))),
        expenses: summary.map_or(0, |s| bson_to_i64(s.get("total_expenses"))),
        expense_categories,
    }
}

#[async_trait]
impl FinanceStore for FinanceDb {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn find_user(&self, user_id: &ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": *user_id }, None).await?)
    }

    async fn insert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.transactions().insert_one(transaction, None).await?;
        Ok(())
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError> {
        if transactions.is_empty() {
            return Ok(0);
        }
        let result = self.transactions().insert_many(transactions, None).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn find_transaction(
        &self,
        user_id: &ObjectId,
        transaction_id: &ObjectId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .transactions()
            .find_one(doc! { "_id": *transaction_id, "user_id": *user_id }, None)
            .await?)
    }

    async fn replace_transaction(&self, transaction: &Transaction) -> Result<bool, StoreError> {
        let result = self
            .transactions()
            .replace_one(
                doc! { "_id": transaction.id, "user_id": transaction.user_id },
                transaction,
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_transactions(
        &self,
        user_id: &ObjectId,
        transaction_ids: &[ObjectId],
    ) -> Result<u64, StoreError> {
        let result = self
            .transactions()
            .delete_many(
                doc! { "_id": { "$in": transaction_ids.to_vec() }, "user_id": *user_id },
                None,
            )
            .await?;
        Ok(result.deleted_count)
    }

    async fn due_recurring_transactions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<Transaction>, StoreError> {
        let cursor = self
            .transactions()
            .find(
                doc! {
                    "is_recurring": true,
                    "next_recurring_date": { "$lte": BsonDateTime::from_chrono(now) },
                },
                None,
            )
            .await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn commit_recurrence(
        &self,
        unit: &RecurrenceUnit,
        deadline: Duration,
    ) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            let mut session = self.start_transaction(deadline).await?;
            let applied = self.apply_recurrence(unit, &mut session).await;
            match finish(session, applied).await {
                Err(e) if is_transient(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::warn!(
                        transaction_id = %unit.source_id,
                        attempt,
                        "Transient transaction error, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn period_totals(
        &self,
        user_id: &ObjectId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PeriodTotals, StoreError> {
        let income = TransactionType::Income.as_str();
        let expense = TransactionType::Expense.as_str();
        let pipeline = vec![
            doc! {
                "$match": {
                    "user_id": *user_id,
                    "date": {
                        "$gte": BsonDateTime::from_chrono(from),
                        "$lte": BsonDateTime::from_chrono(to),
                    },
                }
            },
            doc! {
                "$facet": {
                    "summary": [
                        {
                            "$group": {
                                "_id": Bson::Null,
                                "total_income": {
                                    "$sum": { "$cond": [{ "$eq": ["$type", income] }, { "$abs": "$amount" }, 0] }
                                },
                                "total_expenses": {
                                    "$sum": { "$cond": [{ "$eq": ["$type", expense] }, { "$abs": "$amount" }, 0] }
                                },
                            }
                        }
                    ],
                    "categories": [
                        { "$match": { "type": expense } },
                        { "$group": { "_id": "$category", "total": { "$sum": { "$abs": "$amount" } } } },
                        { "$sort": { "total": -1 } },
                        { "$limit": TOP_CATEGORY_LIMIT },
                    ],
                }
            },
        ];

        let mut cursor = self.transactions().aggregate(pipeline, None).await?;
        match cursor.try_next().await? {
            Some(result) => Ok(parse_period_totals(&result)),
            None => Ok(PeriodTotals::default()),
        }
    }

    async fn find_report_setting(
        &self,
        user_id: &ObjectId,
    ) -> Result<Option<ReportSetting>, StoreError> {
        Ok(self
            .report_settings()
            .find_one(doc! { "user_id": *user_id }, None)
            .await?)
    }

    async fn insert_report_setting(&self, setting: &ReportSetting) -> Result<(), StoreError> {
        self.report_settings().insert_one(setting, None).await?;
        Ok(())
    }

    async fn replace_report_setting(&self, setting: &ReportSetting) -> Result<bool, StoreError> {
        let result = self
            .report_settings()
            .replace_one(doc! { "_id": setting.id }, setting, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn due_report_settings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RecordStream<ReportSetting>, StoreError> {
        let cursor = self
            .report_settings()
            .find(
                doc! {
                    "is_enabled": true,
                    "next_report_date": { "$lte": BsonDateTime::from_chrono(now) },
                },
                None,
            )
            .await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }

    async fn commit_report_outcome(
        &self,
        unit: &ReportOutcomeUnit,
        deadline: Duration,
    ) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            let mut session = self.start_transaction(deadline).await?;
            let applied = self.apply_report_outcome(unit, &mut session).await;
            match finish(session, applied).await {
                Err(e) if is_transient(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::warn!(
                        setting_id = %unit.setting_id,
                        attempt,
                        "Transient transaction error, retrying: {}",
                        e
                    );
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn list_reports(
        &self,
        user_id: &ObjectId,
        pagination: Pagination,
    ) -> Result<(Vec<Report>, u64), StoreError> {
        let filter = doc! { "user_id": *user_id };
        let find_options = FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .skip(pagination.skip())
            .limit(pagination.page_size as i64)
            .build();

        let cursor = self.reports().find(filter.clone(), find_options).await?;
        let reports: Vec<Report> = cursor.try_collect().await?;
        let total = self.reports().count_documents(filter, None).await?;
        Ok((reports, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period_totals_mixed_numeric_types() {
        let result = doc! {
            "summary": [{ "_id": Bson::Null, "total_income": 0_i32, "total_expenses": 5_000_i64 }],
            "categories": [
                { "_id": "food", "total": 3_000_i64 },
                { "_id": "transport", "total": 2_000_i32 },
            ],
        };

        let totals = parse_period_totals(&result);
        assert_eq!(totals.income, 0);
        assert_eq!(totals.expenses, 5_000);
        assert_eq!(
            totals.expense_categories,
            vec![
                CategoryTotal {
                    category: "food".to_string(),
                    total: 3_000
                },
                CategoryTotal {
                    category: "transport".to_string(),
                    total: 2_000
                },
            ]
        );
    }

    #[test]
    fn test_parse_period_totals_without_matches() {
        let result = doc! { "summary": [], "categories": [] };
        assert_eq!(parse_period_totals(&result), PeriodTotals::default());
    }
}

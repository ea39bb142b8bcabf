pub mod aggregator;
pub mod clock;
pub mod database;
pub mod error;
pub mod insights;
pub mod mailer;
pub mod memory_store;
pub mod metrics;
pub mod providers;
pub mod report_settings;
pub mod reports;
pub mod store;
pub mod transactions;

pub use aggregator::{ReportAggregator, ReportSummary};
pub use clock::{Clock, FixedClock, SystemClock};
pub use database::FinanceDb;
pub use error::ServiceError;
pub use insights::InsightGenerator;
pub use mailer::ReportMailer;
pub use memory_store::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use providers::{
    EmailMessage, EmailProvider, GeminiConfig, GeminiTextProvider, MockEmailProvider,
    MockTextProvider, ProviderError, SmtpProvider, TextProvider,
};
pub use report_settings::ReportSettingService;
pub use reports::{GeneratedReport, ReportPage, ReportService};
pub use store::{FinanceStore, Pagination, StoreError};
pub use transactions::{NewTransaction, TransactionService, UpdateTransaction};

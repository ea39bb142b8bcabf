//! Application wiring and lifecycle.
//!
//! The HTTP surface serves the user-scoped transaction and report APIs
//! next to health, readiness, metrics and manual job triggers. The
//! scheduler runs alongside the server and stops with it.

use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::FinanceConfig;
use crate::handlers::{health, jobs, reports, transactions};
use crate::jobs::{RecurrenceProcessor, ReportDeliveryProcessor, Scheduler};
use crate::services::{
    Clock, EmailProvider, FinanceDb, FinanceStore, GeminiConfig, GeminiTextProvider,
    MockEmailProvider, MockTextProvider, ReportMailer, ReportService, ReportSettingService,
    SmtpProvider, SystemClock, TextProvider, TransactionService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FinanceStore>,
    pub clock: Arc<dyn Clock>,
    pub transactions: Arc<TransactionService>,
    pub report_settings: Arc<ReportSettingService>,
    pub reports: Arc<ReportService>,
    pub recurrence: Arc<RecurrenceProcessor>,
    pub report_delivery: Arc<ReportDeliveryProcessor>,
}

impl AppState {
    /// Wire services and processors over one store, clock and provider set.
    pub fn new(
        store: Arc<dyn FinanceStore>,
        clock: Arc<dyn Clock>,
        text_provider: Arc<dyn TextProvider>,
        email_provider: Arc<dyn EmailProvider>,
        scheduler_config: &crate::config::SchedulerConfig,
    ) -> Self {
        let reports = Arc::new(ReportService::new(store.clone(), text_provider));
        let mailer = Arc::new(ReportMailer::new(email_provider));

        Self {
            transactions: Arc::new(TransactionService::new(store.clone())),
            report_settings: Arc::new(ReportSettingService::new(store.clone())),
            recurrence: Arc::new(RecurrenceProcessor::new(
                store.clone(),
                clock.clone(),
                scheduler_config.recurrence_commit_timeout(),
            )),
            report_delivery: Arc::new(ReportDeliveryProcessor::new(
                store.clone(),
                clock.clone(),
                reports.clone(),
                mailer,
                scheduler_config.report_commit_timeout(),
            )),
            reports,
            store,
            clock,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .route("/transactions", post(transactions::create_transaction))
        .route("/transactions/bulk", post(transactions::bulk_insert_transactions))
        .route(
            "/transactions/bulk-delete",
            post(transactions::bulk_delete_transactions),
        )
        .route(
            "/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        .route(
            "/transactions/:id/duplicate",
            post(transactions::duplicate_transaction),
        )
        .route(
            "/reports/settings",
            get(reports::get_report_settings)
                .post(reports::create_report_settings)
                .put(reports::update_report_settings),
        )
        .route("/reports", get(reports::list_reports))
        .route("/reports/generate", get(reports::generate_report))
        .route("/jobs/recurring-transactions/run", post(jobs::run_recurrence_job))
        .route("/jobs/reports/run", post(jobs::run_report_job))
        .with_state(state)
}

fn email_provider(config: &FinanceConfig) -> Arc<dyn EmailProvider> {
    if !config.smtp.enabled {
        tracing::warn!("SMTP provider disabled, report emails will be recorded as failed");
        return Arc::new(MockEmailProvider::new(false));
    }

    match SmtpProvider::new(config.smtp.clone()) {
        Ok(provider) => {
            tracing::info!("SMTP email provider initialized");
            Arc::new(provider)
        }
        Err(e) => {
            tracing::error!(
                "Failed to initialize SMTP provider: {}. Report emails will be recorded as failed.",
                e
            );
            Arc::new(MockEmailProvider::new(false))
        }
    }
}

fn text_provider(config: &FinanceConfig) -> Arc<dyn TextProvider> {
    let Some(api_key) = config.google.api_key.clone() else {
        tracing::info!("No Google API key, report insights disabled");
        return Arc::new(MockTextProvider::silent());
    };

    match GeminiTextProvider::new(GeminiConfig {
        api_key,
        model: config.google.text_model.clone(),
    }) {
        Ok(provider) => {
            tracing::info!(
                model = %config.google.text_model,
                "Gemini text provider initialized"
            );
            Arc::new(provider)
        }
        Err(e) => {
            tracing::warn!("Failed to initialize Gemini provider: {}. Insights disabled.", e);
            Arc::new(MockTextProvider::silent())
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
    scheduler: Option<Scheduler>,
}

impl Application {
    pub async fn build(config: FinanceConfig) -> Result<Self, AppError> {
        let db = FinanceDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let text = text_provider(&config);
        let email = email_provider(&config);
        if let Err(e) = text.health_check().await {
            tracing::warn!("Text provider health check failed: {}", e);
        }
        if email.is_enabled() {
            if let Err(e) = email.health_check().await {
                tracing::warn!("Email provider health check failed: {}", e);
            }
        }

        let state = AppState::new(
            Arc::new(db),
            Arc::new(SystemClock),
            text,
            email,
            &config.scheduler,
        );

        let scheduler = if config.scheduler.enabled {
            let mut scheduler = Scheduler::new();
            scheduler
                .add_job(&config.scheduler.recurrence_cron, state.recurrence.clone())
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
            scheduler
                .add_job(&config.scheduler.report_cron, state.report_delivery.clone())
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
            Some(scheduler)
        } else {
            tracing::info!("Scheduler disabled by configuration");
            None
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();
        tracing::info!("Finance service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
            scheduler,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve HTTP and run scheduled jobs until `shutdown` resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handles = self
            .scheduler
            .as_ref()
            .map(Scheduler::start)
            .unwrap_or_default();

        let result = axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Scheduler task failed: {}", e);
            }
        }

        result.map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::services::{FixedClock, MemoryStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tower::ServiceExt;

    fn state(store: Arc<MemoryStore>) -> AppState {
        AppState::new(
            store,
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap(),
            )),
            Arc::new(MockTextProvider::silent()),
            Arc::new(MockEmailProvider::new(true)),
            &SchedulerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_health_reports_store_state() {
        let store = Arc::new(MemoryStore::new());
        let app = router(state(store.clone()));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        store.set_unavailable(true);
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_manual_job_trigger_returns_summary() {
        let app = router(state(Arc::new(MemoryStore::new())));

        let response = app
            .oneshot(
                Request::post("/jobs/recurring-transactions/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            summary,
            json!({"success": true, "processedCount": 0, "failedCount": 0})
        );
    }
}

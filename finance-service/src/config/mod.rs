use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// 00:05 UTC on the first day of every month.
const DEFAULT_RECURRENCE_CRON: &str = "0 5 0 1 * *";
/// 02:30 UTC on the first day of every month, after the recurrence run.
const DEFAULT_REPORT_CRON: &str = "0 30 2 1 * *";
const DEFAULT_RECURRENCE_COMMIT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_REPORT_COMMIT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct FinanceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub smtp: SmtpConfig,
    pub google: GoogleConfig,
    pub scheduler: SchedulerConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Without a key the service falls back to the mock text provider.
    pub api_key: Option<String>,
    pub text_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub recurrence_cron: String,
    pub report_cron: String,
    pub recurrence_commit_timeout_secs: u64,
    pub report_commit_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn recurrence_commit_timeout(&self) -> Duration {
        Duration::from_secs(self.recurrence_commit_timeout_secs)
    }

    pub fn report_commit_timeout(&self) -> Duration {
        Duration::from_secs(self.report_commit_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recurrence_cron: DEFAULT_RECURRENCE_CRON.to_string(),
            report_cron: DEFAULT_REPORT_CRON.to_string(),
            recurrence_commit_timeout_secs: DEFAULT_RECURRENCE_COMMIT_TIMEOUT_SECS,
            report_commit_timeout_secs: DEFAULT_REPORT_COMMIT_TIMEOUT_SECS,
        }
    }
}

impl FinanceConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(FinanceConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("finance_db"), is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                port: parse_env("SMTP_PORT", 587, is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_email: get_env("SMTP_FROM_EMAIL", Some("reports@localhost"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Finance Reports"), is_prod)?,
                enabled: parse_env("SMTP_ENABLED", false, is_prod)?,
            },
            google: GoogleConfig {
                api_key: env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty()),
                text_model: get_env("GENAI_TEXT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
            },
            scheduler: SchedulerConfig {
                enabled: parse_env("SCHEDULER_ENABLED", true, false)?,
                recurrence_cron: get_env(
                    "RECURRENCE_JOB_CRON",
                    Some(DEFAULT_RECURRENCE_CRON),
                    false,
                )?,
                report_cron: get_env("REPORT_JOB_CRON", Some(DEFAULT_REPORT_CRON), false)?,
                recurrence_commit_timeout_secs: parse_env(
                    "RECURRENCE_COMMIT_TIMEOUT_SECS",
                    DEFAULT_RECURRENCE_COMMIT_TIMEOUT_SECS,
                    false,
                )?,
                report_commit_timeout_secs: parse_env(
                    "REPORT_COMMIT_TIMEOUT_SECS",
                    DEFAULT_REPORT_COMMIT_TIMEOUT_SECS,
                    false,
                )?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(&default.to_string()), is_prod)?;
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_defaults() {
        let scheduler = SchedulerConfig::default();
        assert!(scheduler.enabled);
        assert_eq!(scheduler.recurrence_cron, "0 5 0 1 * *");
        assert_eq!(scheduler.report_cron, "0 30 2 1 * *");
        assert_eq!(scheduler.recurrence_commit_timeout(), Duration::from_secs(20));
        assert_eq!(scheduler.report_commit_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_get_env_falls_back_to_default_outside_prod() {
        let value = get_env("FINANCE_TEST_UNSET_VARIABLE", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn test_get_env_required_in_prod() {
        let result = get_env("FINANCE_TEST_UNSET_VARIABLE", Some("fallback"), true);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_parse_env_uses_typed_default() {
        let port: u16 = parse_env("FINANCE_TEST_UNSET_PORT", 587, false).unwrap();
        assert_eq!(port, 587);
    }
}

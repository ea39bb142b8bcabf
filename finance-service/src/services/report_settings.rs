use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::jobs::dates::next_report_date;
use crate::models::ReportSetting;
use crate::services::error::ServiceError;
use crate::services::store::FinanceStore;

fn schedule_overflow() -> ServiceError {
    ServiceError::Validation("report date out of range".to_string())
}

pub struct ReportSettingService {
    store: Arc<dyn FinanceStore>,
}

impl ReportSettingService {
    pub fn new(store: Arc<dyn FinanceStore>) -> Self {
        Self { store }
    }

    /// Enabled monthly reports starting next month. Fails if the user
    /// already has settings.
    pub async fn create_default(
        &self,
        user_id: ObjectId,
        now: DateTime<Utc>,
    ) -> Result<ReportSetting, ServiceError> {
        if self.store.find_report_setting(&user_id).await?.is_some() {
            return Err(ServiceError::Validation(
                "report settings already exist for this user".to_string(),
            ));
        }

        let next = next_report_date(None, now).ok_or_else(schedule_overflow)?;
        let setting = ReportSetting::new(user_id, next, now);
        self.store.insert_report_setting(&setting).await?;
        Ok(setting)
    }

    pub async fn get(&self, user_id: &ObjectId) -> Result<ReportSetting, ServiceError> {
        self.store
            .find_report_setting(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Report settings not found".to_string()))
    }

    /// Enabling keeps a pending future date or schedules from the last send;
    /// disabling clears the schedule so the report job skips the user.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn update(
        &self,
        user_id: &ObjectId,
        is_enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<ReportSetting, ServiceError> {
        let mut setting = self.get(user_id).await?;

        setting.next_report_date = if is_enabled {
            match setting.next_report_date {
                Some(next) if next > now => Some(next),
                _ => Some(
                    next_report_date(setting.last_sent_date, now)
                        .ok_or_else(schedule_overflow)?,
                ),
            }
        } else {
            None
        };
        setting.is_enabled = is_enabled;
        setting.updated_utc = now;

        if !self.store.replace_report_setting(&setting).await? {
            return Err(ServiceError::NotFound("Report settings not found".to_string()));
        }
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn service() -> (Arc<MemoryStore>, ReportSettingService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ReportSettingService::new(store))
    }

    #[tokio::test]
    async fn test_default_setting_starts_next_month() {
        let (_store, service) = service();
        let user = ObjectId::new();

        let setting = service.create_default(user, at(2024, 3, 15)).await.unwrap();

        assert!(setting.is_enabled);
        assert_eq!(setting.next_report_date, Some(at(2024, 4, 1)));
        assert_eq!(setting.last_sent_date, None);
        assert!(matches!(
            service.create_default(user, at(2024, 3, 15)).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_disable_then_enable_reschedules() {
        let (store, service) = service();
        let user = ObjectId::new();
        service.create_default(user, at(2024, 3, 15)).await.unwrap();

        let disabled = service.update(&user, false, at(2024, 3, 20)).await.unwrap();
        assert!(!disabled.is_enabled);
        assert_eq!(disabled.next_report_date, None);

        let enabled = service.update(&user, true, at(2024, 5, 10)).await.unwrap();
        assert!(enabled.is_enabled);
        assert_eq!(enabled.next_report_date, Some(at(2024, 6, 1)));
        assert_eq!(store.report_settings()[0], enabled);
    }

    #[tokio::test]
    async fn test_enable_keeps_future_date() {
        let (_store, service) = service();
        let user = ObjectId::new();
        service.create_default(user, at(2024, 3, 15)).await.unwrap();

        let setting = service.update(&user, true, at(2024, 3, 20)).await.unwrap();
        assert_eq!(setting.next_report_date, Some(at(2024, 4, 1)));
    }

    #[tokio::test]
    async fn test_update_without_setting_is_not_found() {
        let (_store, service) = service();
        assert!(matches!(
            service.update(&ObjectId::new(), true, at(2024, 3, 20)).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

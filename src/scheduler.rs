//! Named daily triggers backed by tokio tasks.
//!
//! Each registered job is a loop that sleeps until the next Moscow-time
//! occurrence of its time-of-day and then invokes its callback with the
//! associated chat id. Callbacks receive the chat explicitly; nothing is
//! captured mutably inside the scheduler.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime};
use log::{debug, info};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use teloxide::types::ChatId;
use tokio::task::JoinHandle;

use crate::models::now_msk;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type JobCallback = Arc<dyn Fn(ChatId) -> JobFuture + Send + Sync>;

/// Registry of named daily triggers. Registering an already-taken name
/// replaces the previous trigger, so re-registration never duplicates jobs.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_daily(&self, name: &str, at: NaiveTime, chat: ChatId, callback: JobCallback) {
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let now = now_msk();
                let next = next_occurrence(now, at);
                debug!("Trigger {task_name} sleeping until {next}");
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                callback(chat).await;
            }
        });

        let mut jobs = self.jobs.lock().expect("job registry lock poisoned");
        if let Some(old) = jobs.insert(name.to_string(), handle) {
            old.abort();
        }
        info!("Registered daily trigger {name} at {at} for chat {chat}");
    }

    /// Cancels a trigger by name. Unknown names are a no-op.
    pub fn cancel(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().expect("job registry lock poisoned");
        match jobs.remove(name) {
            Some(handle) => {
                handle.abort();
                info!("Cancelled trigger {name}");
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        let jobs = self.jobs.lock().expect("job registry lock poisoned");
        jobs.contains_key(name)
    }

    pub fn job_count(&self) -> usize {
        let jobs = self.jobs.lock().expect("job registry lock poisoned");
        jobs.len()
    }
}

/// Next wall-clock occurrence of `at` strictly after `now`.
pub fn next_occurrence(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let today = now
        .date_naive()
        .and_time(at)
        .and_local_timezone(*now.offset())
        .single()
        .unwrap_or(now);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::models::msk;

    fn msk_datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        msk().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn noop_callback() -> JobCallback {
        Arc::new(|_chat| Box::pin(async {}) as JobFuture)
    }

    #[test]
    fn test_next_occurrence_later_today() {
        let now = msk_datetime(2024, 5, 10, 7, 0);
        let at = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        assert_eq!(next_occurrence(now, at), msk_datetime(2024, 5, 10, 8, 30));
    }

    #[test]
    fn test_next_occurrence_rolls_over_to_tomorrow() {
        let now = msk_datetime(2024, 5, 10, 9, 0);
        let at = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        assert_eq!(next_occurrence(now, at), msk_datetime(2024, 5, 11, 8, 30));

        // An exact match also rolls over; triggers fire strictly after now.
        let now = msk_datetime(2024, 5, 10, 8, 30);
        assert_eq!(next_occurrence(now, at), msk_datetime(2024, 5, 11, 8, 30));
    }

    #[test]
    fn test_next_occurrence_crosses_month_boundary() {
        let now = msk_datetime(2024, 5, 31, 23, 0);
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert_eq!(next_occurrence(now, at), msk_datetime(2024, 6, 1, 8, 0));
    }

    #[tokio::test]
    async fn test_register_and_cancel() {
        let registry = JobRegistry::new();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

        registry.register_daily("reminder_1_0", at, ChatId(1), noop_callback());
        assert!(registry.is_registered("reminder_1_0"));
        assert_eq!(registry.job_count(), 1);

        assert!(registry.cancel("reminder_1_0"));
        assert!(!registry.is_registered("reminder_1_0"));
        assert!(!registry.cancel("reminder_1_0"), "unknown name is a no-op");
    }

    #[tokio::test]
    async fn test_reregistering_a_name_replaces_the_job() {
        let registry = JobRegistry::new();
        let at = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

        registry.register_daily("reminder_1_0", at, ChatId(1), noop_callback());
        registry.register_daily("reminder_1_0", at, ChatId(1), noop_callback());
        assert_eq!(registry.job_count(), 1);
    }
}

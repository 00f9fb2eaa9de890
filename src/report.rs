//! Monthly report dispatcher: one daily trigger that, on the first day of a
//! month, sends each chat its previous-month chart at most once.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use log::{error, info};
use std::future::Future;
use teloxide::types::ChatId;

use crate::chart;
use crate::models::month_key;
use crate::store::Store;

/// Scheduler trigger name of the daily dispatch check.
pub const DISPATCH_JOB_NAME: &str = "monthly_chart_sender";

/// The month to report on, or `None` when today is not the first of a month.
pub fn previous_month(today: NaiveDate) -> Option<(i32, u32)> {
    if today.day() != 1 {
        return None;
    }
    let last_of_previous = today.pred_opt()?;
    Some((last_of_previous.year(), last_of_previous.month()))
}

/// Runs one dispatch pass. The transport is injected as `send_chart`, like
/// the reminder notification callback; the dispatcher itself never touches
/// the bot. A chat is skipped when its ledger already holds the target
/// month-key or when the month has no data; the key is recorded only after
/// a successful send. One chat's failure never blocks the rest.
pub async fn dispatch_monthly_charts<F, Fut>(
    store: &Store,
    today: NaiveDate,
    send_chart: F,
) -> Result<()>
where
    F: Fn(ChatId, Vec<u8>, String) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let Some((year, month)) = previous_month(today) else {
        return Ok(());
    };
    let key = month_key(year, month);
    info!("Monthly dispatch for {key}");

    let rows = store.all_measurements().await?;
    for (owner, profile) in store.all_profiles().await? {
        if store.ledger(owner).await.contains(&key) {
            continue;
        }
        let Some(series) = chart::aggregate(&rows, year, month) else {
            // No data: skip without marking, so the month stays eligible
            // until something was actually sent.
            continue;
        };
        let png = match chart::render_png(&series) {
            Ok(png) => png,
            Err(e) => {
                error!("Failed to render monthly chart for chat {owner}: {e:#}");
                continue;
            }
        };

        let caption = format!(
            "Привет, {}! Вот твой дневник за {}.",
            profile.display_name,
            chart::month_label(year, month)
        );
        match send_chart(ChatId(owner), png, caption).await {
            Ok(()) => {
                if let Err(e) = store.mark_month_sent(owner, &key).await {
                    error!("Chart delivered but ledger update failed for {owner}: {e:#}");
                }
            }
            Err(e) => error!("Failed to deliver monthly chart to chat {owner}: {e:#}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Measurement, Period, Profile, Sex};
    use anyhow::anyhow;
    use chrono::NaiveTime;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("diary.db"), &dir.path().join("cache")).unwrap();
        (store, dir)
    }

    fn sample_profile() -> Profile {
        Profile {
            date_of_birth: NaiveDate::from_ymd_opt(2018, 6, 15).unwrap(),
            sex: Sex::Female,
            display_name: "Маша".to_string(),
        }
    }

    fn may_row(seq: i64) -> Measurement {
        Measurement {
            seq,
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            period: Period::Morning,
            reading: 300,
            breathing: "Нет".to_string(),
            cough: "Нет".to_string(),
            sputum: "Нет".to_string(),
            medication: "Нет".to_string(),
            age: "5 лет".to_string(),
            sex: "женский".to_string(),
        }
    }

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    /// Records every delivered chat id; delivery always succeeds.
    fn recording_sender(
        sent: &Arc<Mutex<Vec<i64>>>,
    ) -> impl Fn(ChatId, Vec<u8>, String) -> std::pin::Pin<Box<dyn Future<Output = Result<()>>>>
    {
        let sent = Arc::clone(sent);
        move |chat, _png, _caption| {
            let sent = Arc::clone(&sent);
            Box::pin(async move {
                sent.lock().unwrap().push(chat.0);
                Ok(())
            })
        }
    }

    fn failing_sender(
    ) -> impl Fn(ChatId, Vec<u8>, String) -> std::pin::Pin<Box<dyn Future<Output = Result<()>>>>
    {
        |_chat, _png, _caption| Box::pin(async { Err(anyhow!("telegram down")) })
    }

    #[test]
    fn test_no_dispatch_mid_month() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert_eq!(previous_month(today), None);
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(previous_month(today), None);
    }

    #[test]
    fn test_first_of_month_targets_previous_month() {
        assert_eq!(previous_month(june_first()), Some((2024, 5)));
    }

    #[test]
    fn test_january_first_targets_last_december() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(previous_month(today), Some((2024, 12)));
    }

    #[tokio::test]
    async fn test_successful_send_marks_the_month_exactly_once() {
        let (store, _dir) = test_store();
        store.set_profile(1, &sample_profile()).await.unwrap();
        store.append_measurement(1, &may_row(1)).await.unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        dispatch_monthly_charts(&store, june_first(), recording_sender(&sent))
            .await
            .unwrap();
        dispatch_monthly_charts(&store, june_first(), recording_sender(&sent))
            .await
            .unwrap();

        assert_eq!(*sent.lock().unwrap(), vec![1], "second pass must skip");
        let ledger = store.ledger(1).await;
        assert!(ledger.contains("2024-05"));
        assert_eq!(ledger.months.len(), 1);
    }

    #[tokio::test]
    async fn test_ledgered_month_is_not_resent() {
        let (store, _dir) = test_store();
        store.set_profile(1, &sample_profile()).await.unwrap();
        store.append_measurement(1, &may_row(1)).await.unwrap();
        store.mark_month_sent(1, "2024-05").await.unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        dispatch_monthly_charts(&store, june_first(), recording_sender(&sent))
            .await
            .unwrap();

        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_leaves_the_month_eligible() {
        let (store, _dir) = test_store();
        store.set_profile(1, &sample_profile()).await.unwrap();
        store.append_measurement(1, &may_row(1)).await.unwrap();

        dispatch_monthly_charts(&store, june_first(), failing_sender())
            .await
            .unwrap();
        assert!(!store.ledger(1).await.contains("2024-05"));

        // The next run retries and only then records the month.
        let sent = Arc::new(Mutex::new(Vec::new()));
        dispatch_monthly_charts(&store, june_first(), recording_sender(&sent))
            .await
            .unwrap();
        assert_eq!(*sent.lock().unwrap(), vec![1]);
        assert!(store.ledger(1).await.contains("2024-05"));
    }

    #[tokio::test]
    async fn test_month_without_rows_is_skipped_without_marking() {
        let (store, _dir) = test_store();
        store.set_profile(1, &sample_profile()).await.unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        dispatch_monthly_charts(&store, june_first(), recording_sender(&sent))
            .await
            .unwrap();

        assert!(sent.lock().unwrap().is_empty());
        assert!(store.ledger(1).await.months.is_empty());
    }
}

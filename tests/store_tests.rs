use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;

use peakflow_bot::models::{Measurement, Period, Profile, ReminderSet, Sex};
use peakflow_bot::store::Store;

fn open_store(dir: &TempDir) -> Result<Store> {
    Ok(Store::open(
        &dir.path().join("diary.db"),
        &dir.path().join("cache"),
    )?)
}

fn sample_profile(name: &str) -> Profile {
    Profile {
        date_of_birth: NaiveDate::from_ymd_opt(2018, 6, 15).unwrap(),
        sex: Sex::Male,
        display_name: name.to_string(),
    }
}

fn sample_measurement(seq: i64) -> Measurement {
    Measurement {
        seq,
        date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        time: NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
        period: Period::Morning,
        reading: 310,
        breathing: "Нет".to_string(),
        cough: "Да".to_string(),
        sputum: "Нет".to_string(),
        medication: "Базисная терапия".to_string(),
        age: "5 лет".to_string(),
        sex: "мужской".to_string(),
    }
}

/// Documents and diary rows survive a process restart.
#[tokio::test]
async fn test_data_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    {
        let store = open_store(&dir)?;
        store.set_profile(1, &sample_profile("Маша")).await?;
        store
            .set_reminder_set(
                1,
                &ReminderSet {
                    times: vec![
                        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                        NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
                    ],
                    job_names: vec!["reminder_1_0".to_string(), "reminder_1_1".to_string()],
                },
            )
            .await?;
        store.mark_month_sent(1, "2024-05").await?;
        store.append_measurement(1, &sample_measurement(1)).await?;
    }

    let store = open_store(&dir)?;
    assert_eq!(store.profile(1).await, Some(sample_profile("Маша")));
    assert_eq!(store.reminder_set(1).await.unwrap().times.len(), 2);
    assert!(store.ledger(1).await.contains("2024-05"));
    assert_eq!(store.measurement_count().await?, 1);
    assert_eq!(store.all_measurements().await?[0], sample_measurement(1));
    Ok(())
}

/// The full reset leaves profile, reminders and ledger empty for the chat.
#[tokio::test]
async fn test_wipe_owner_full_reset() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir)?;

    store.set_profile(9, &sample_profile("Петя")).await?;
    store.mark_month_sent(9, "2024-04").await?;
    store.append_measurement(9, &sample_measurement(1)).await?;

    store.wipe_owner(9).await?;

    assert!(store.profile(9).await.is_none());
    assert!(store.reminder_set(9).await.is_none());
    assert!(store.ledger(9).await.months.is_empty());
    assert_eq!(store.measurement_count().await?, 0);
    assert!(store.all_profiles().await?.is_empty());
    Ok(())
}

/// Listing collections only yields decodable documents.
#[tokio::test]
async fn test_all_profiles_lists_every_owner() -> Result<()> {
    let dir = TempDir::new()?;
    let store = open_store(&dir)?;

    store.set_profile(1, &sample_profile("Маша")).await?;
    store.set_profile(2, &sample_profile("Петя")).await?;

    let mut profiles = store.all_profiles().await?;
    profiles.sort_by_key(|(owner, _)| *owner);
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].1.display_name, "Маша");
    assert_eq!(profiles[1].1.display_name, "Петя");
    Ok(())
}

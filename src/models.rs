//! Persisted record types and the small calendar helpers shared by the
//! dialog flows, the scheduler and the monthly report dispatcher.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// All user-facing times run on a fixed Moscow offset, matching the diary
/// spreadsheet the bot grew out of. No DST handling.
pub const MSK_OFFSET_SECS: i32 = 3 * 3600;

pub fn msk() -> FixedOffset {
    FixedOffset::east_opt(MSK_OFFSET_SECS).expect("UTC+3 is a valid offset")
}

pub fn now_msk() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&msk())
}

/// Month-key used by the sent-report ledger, e.g. `2024-05`.
pub fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Parses the Russian button labels, case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "мужской" => Some(Sex::Male),
            "женский" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "мужской",
            Sex::Female => "женский",
        }
    }
}

/// One per chat. Overwritten wholesale on every profile dialog completion.
/// Completeness (dob + sex present) is guaranteed by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub display_name: String,
}

impl Profile {
    /// Russian age string with the correct plural form, e.g. "1 год",
    /// "2 года", "5 лет". Teens are always "лет".
    pub fn age_on(&self, today: NaiveDate) -> String {
        let mut years = today.year() - self.date_of_birth.year();
        if (today.month(), today.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            years -= 1;
        }
        format_age_years(years.max(0) as i64)
    }
}

pub fn format_age_years(years: i64) -> String {
    if (11..=19).contains(&(years % 100)) {
        return format!("{years} лет");
    }
    match years % 10 {
        1 => format!("{years} год"),
        2..=4 => format!("{years} года"),
        _ => format!("{years} лет"),
    }
}

/// Morning/evening classification of a measurement, by Moscow wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Evening,
}

impl Period {
    /// Before 15:00 MSK counts as a morning measurement.
    pub fn from_msk_hour(hour: u32) -> Self {
        if hour < 15 {
            Period::Morning
        } else {
            Period::Evening
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Morning => "утро",
            Period::Evening => "вечер",
        }
    }

    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "утро" => Some(Period::Morning),
            "вечер" => Some(Period::Evening),
            _ => None,
        }
    }
}

/// One appended diary row. Age and sex are snapshots taken from the profile
/// at write time; later profile edits do not touch historical rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// 1-based sequence number, derived from the diary row count read
    /// immediately before the append. Racy under concurrent writers; an
    /// accepted limitation of the shared-diary design.
    pub seq: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub period: Period,
    pub reading: i64,
    pub breathing: String,
    pub cough: String,
    pub sputum: String,
    pub medication: String,
    pub age: String,
    pub sex: String,
}

/// One per chat: the two daily reminder times together with the scheduler
/// job names registered for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSet {
    pub times: Vec<NaiveTime>,
    pub job_names: Vec<String>,
}

impl ReminderSet {
    pub fn is_consistent(&self) -> bool {
        self.times.len() == self.job_names.len()
    }
}

/// Deterministic scheduler trigger name for the i-th reminder of a chat.
pub fn reminder_job_name(chat: i64, index: usize) -> String {
    format!("reminder_{chat}_{index}")
}

/// Month-keys for which the monthly chart was already delivered to a chat.
/// Grows monotonically; a key is recorded only after a successful send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentReportLedger {
    pub months: Vec<String>,
}

impl SentReportLedger {
    pub fn contains(&self, key: &str) -> bool {
        self.months.iter().any(|m| m == key)
    }

    pub fn record(&mut self, key: &str) {
        if !self.contains(key) {
            self.months.push(key.to_string());
        }
    }
}

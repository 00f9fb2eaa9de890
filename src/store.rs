//! Persistence layer: an explicitly constructed [`Store`] owning the sqlite
//! connection plus a JSON file cache.
//!
//! Documents (profiles, reminder sets, sent-report ledgers) are dual-written:
//! sqlite is the commit point, the cache file is best-effort. Reads prefer
//! sqlite and fall back to the cache when sqlite fails. A crash between the
//! two writes can leave them diverged; that is an accepted limitation.
//!
//! The measurement diary is a flat append-only table shared by all chats,
//! mirroring the family spreadsheet it replaces.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{Measurement, Period, Profile, ReminderSet, SentReportLedger};

const PROFILES: &str = "profiles";
const REMINDERS: &str = "reminders";
const CHARTS_SENT: &str = "charts_sent";

const DATE_FORMAT: &str = "%d.%m.%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

pub struct Store {
    conn: Arc<Mutex<Connection>>,
    cache_dir: PathBuf,
}

/// Initialize the database schema.
fn init_schema(conn: &Connection) -> Result<()> {
    info!("Initializing database schema");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            owner INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, owner)
        )",
        [],
    )
    .context("Failed to create documents table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS measurements (
            seq INTEGER NOT NULL,
            owner INTEGER NOT NULL,
            recorded_on TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            period TEXT NOT NULL,
            reading INTEGER NOT NULL,
            breathing TEXT NOT NULL,
            cough TEXT NOT NULL,
            sputum TEXT NOT NULL,
            medication TEXT NOT NULL,
            age TEXT NOT NULL,
            sex TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create measurements table")?;

    Ok(())
}

impl Store {
    pub fn open(database_path: &Path, cache_dir: &Path) -> Result<Self> {
        fs::create_dir_all(cache_dir).with_context(|| {
            format!("Failed to create cache directory {}", cache_dir.display())
        })?;

        let conn = Connection::open(database_path).with_context(|| {
            format!("Failed to open database at {}", database_path.display())
        })?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    // --- Documents ---

    fn cache_path(&self, collection: &str, owner: i64) -> PathBuf {
        self.cache_dir.join(collection).join(format!("{owner}.json"))
    }

    fn read_cache<T: DeserializeOwned>(&self, collection: &str, owner: i64) -> Option<T> {
        let path = self.cache_path(collection, owner);
        let body = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Malformed cache file {}: {e}", path.display());
                None
            }
        }
    }

    fn write_cache(&self, collection: &str, owner: i64, body: &str) {
        let path = self.cache_path(collection, owner);
        let result = path
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| fs::write(&path, body));
        if let Err(e) = result {
            warn!("Failed to write cache file {}: {e}", path.display());
        }
    }

    fn remove_cache(&self, collection: &str, owner: i64) {
        let path = self.cache_path(collection, owner);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove cache file {}: {e}", path.display());
            }
        }
    }

    async fn get_document<T: DeserializeOwned>(&self, collection: &str, owner: i64) -> Option<T> {
        let queried = {
            let conn = self.conn.lock().await;
            conn.query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND owner = ?2",
                params![collection, owner],
                |row| row.get::<_, String>(0),
            )
            .optional()
        };

        match queried {
            Ok(Some(body)) => match serde_json::from_str(&body) {
                Ok(value) => Some(value),
                Err(e) => {
                    // A malformed document reads as absent.
                    warn!("Malformed {collection} document for owner {owner}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Reading {collection}/{owner} from sqlite failed, using cache: {e}");
                self.read_cache(collection, owner)
            }
        }
    }

    async fn set_document<T: Serialize>(
        &self,
        collection: &str,
        owner: i64,
        value: &T,
    ) -> Result<()> {
        let body = serde_json::to_string(value)
            .with_context(|| format!("Failed to encode {collection} document"))?;

        {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT OR REPLACE INTO documents (collection, owner, body) VALUES (?1, ?2, ?3)",
                params![collection, owner, body],
            )
            .with_context(|| format!("Failed to store {collection} document for {owner}"))?;
        }

        // The durable write above is the commit point; the cache copy is
        // best-effort only.
        self.write_cache(collection, owner, &body);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, owner: i64) -> Result<()> {
        {
            let conn = self.conn.lock().await;
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND owner = ?2",
                params![collection, owner],
            )
            .with_context(|| format!("Failed to delete {collection} document for {owner}"))?;
        }
        self.remove_cache(collection, owner);
        Ok(())
    }

    async fn all_documents<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<(i64, T)>> {
        let queried: rusqlite::Result<Vec<(i64, String)>> = {
            let conn = self.conn.lock().await;
            conn.prepare("SELECT owner, body FROM documents WHERE collection = ?1")
                .and_then(|mut stmt| {
                    let rows = stmt.query_map(params![collection], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                    })?;
                    rows.collect()
                })
        };

        let raw = match queried {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Listing {collection} from sqlite failed, scanning cache: {e}");
                self.scan_cache(collection)
            }
        };

        let mut documents = Vec::with_capacity(raw.len());
        for (owner, body) in raw {
            match serde_json::from_str(&body) {
                Ok(value) => documents.push((owner, value)),
                Err(e) => warn!("Skipping malformed {collection} document for {owner}: {e}"),
            }
        }
        Ok(documents)
    }

    fn scan_cache(&self, collection: &str) -> Vec<(i64, String)> {
        let dir = self.cache_dir.join(collection);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut raw = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let owner = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok());
            if let (Some(owner), Ok(body)) = (owner, fs::read_to_string(&path)) {
                raw.push((owner, body));
            }
        }
        raw
    }

    // --- Typed document accessors ---

    pub async fn profile(&self, owner: i64) -> Option<Profile> {
        self.get_document(PROFILES, owner).await
    }

    pub async fn set_profile(&self, owner: i64, profile: &Profile) -> Result<()> {
        self.set_document(PROFILES, owner, profile).await
    }

    pub async fn all_profiles(&self) -> Result<Vec<(i64, Profile)>> {
        self.all_documents(PROFILES).await
    }

    pub async fn reminder_set(&self, owner: i64) -> Option<ReminderSet> {
        self.get_document(REMINDERS, owner).await
    }

    pub async fn set_reminder_set(&self, owner: i64, set: &ReminderSet) -> Result<()> {
        self.set_document(REMINDERS, owner, set).await
    }

    pub async fn delete_reminder_set(&self, owner: i64) -> Result<()> {
        self.delete_document(REMINDERS, owner).await
    }

    pub async fn all_reminder_sets(&self) -> Result<Vec<(i64, ReminderSet)>> {
        self.all_documents(REMINDERS).await
    }

    pub async fn ledger(&self, owner: i64) -> SentReportLedger {
        self.get_document(CHARTS_SENT, owner).await.unwrap_or_default()
    }

    pub async fn mark_month_sent(&self, owner: i64, key: &str) -> Result<()> {
        let mut ledger = self.ledger(owner).await;
        ledger.record(key);
        self.set_document(CHARTS_SENT, owner, &ledger).await
    }

    // --- Measurement diary ---

    pub async fn measurement_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))
            .context("Failed to count diary rows")
    }

    pub async fn append_measurement(&self, owner: i64, m: &Measurement) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO measurements (seq, owner, recorded_on, recorded_at, period, reading,
                                       breathing, cough, sputum, medication, age, sex)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                m.seq,
                owner,
                m.date.format(DATE_FORMAT).to_string(),
                m.time.format(TIME_FORMAT).to_string(),
                m.period.label(),
                m.reading,
                m.breathing,
                m.cough,
                m.sputum,
                m.medication,
                m.age,
                m.sex,
            ],
        )
        .context("Failed to append diary row")?;
        info!("Appended diary row #{} for chat {owner}", m.seq);
        Ok(())
    }

    pub async fn all_measurements(&self) -> Result<Vec<Measurement>> {
        let raw: Vec<(i64, String, String, String, i64, String, String, String, String, String, String)> = {
            let conn = self.conn.lock().await;
            let mut stmt = conn.prepare(
                "SELECT seq, recorded_on, recorded_at, period, reading, breathing, cough,
                        sputum, medication, age, sex
                 FROM measurements ORDER BY seq",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<_>>()
                .context("Failed to read diary rows")?
        };

        let mut measurements = Vec::with_capacity(raw.len());
        for (seq, date, time, period, reading, breathing, cough, sputum, medication, age, sex) in
            raw
        {
            let parsed_date = NaiveDate::parse_from_str(&date, DATE_FORMAT);
            let parsed_time = NaiveTime::parse_from_str(&time, TIME_FORMAT);
            let parsed_period = Period::parse_label(&period);
            match (parsed_date, parsed_time, parsed_period) {
                (Ok(date), Ok(time), Some(period)) => measurements.push(Measurement {
                    seq,
                    date,
                    time,
                    period,
                    reading,
                    breathing,
                    cough,
                    sputum,
                    medication,
                    age,
                    sex,
                }),
                _ => warn!("Skipping malformed diary row #{seq}"),
            }
        }
        Ok(measurements)
    }

    /// Full data reset for one chat: profile, reminder set, ledger and the
    /// chat's diary rows.
    pub async fn wipe_owner(&self, owner: i64) -> Result<()> {
        self.delete_document(PROFILES, owner).await?;
        self.delete_document(REMINDERS, owner).await?;
        self.delete_document(CHARTS_SENT, owner).await?;

        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM measurements WHERE owner = ?1", params![owner])
            .context("Failed to clear diary rows")?;
        info!("Wiped all data for chat {owner}");
        Ok(())
    }
}

//! SQLite-backed preference store.
//!
//! A single `prefs` table holds `(namespace, key) -> value` rows. Each
//! namespace maps to one state category; the typed accessors below store one
//! row per struct field (JSON-encoded), so a single malformed value falls
//! back to its default without discarding the rest of the category.

use std::path::Path;
use std::time::Duration;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::data_dir;
use crate::achievements::Achievements;
use crate::error::{CoreError, StoreError};
use crate::settings::Settings;
use crate::stats::Statistics;
use crate::sync::SyncCategory;
use crate::timer::TimerState;

/// Shared handle. The mutex is the single critical section for local
/// mutations and remote applications.
pub type SharedStore = Arc<Mutex<PreferenceStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Settings,
    Statistics,
    Achievements,
    Timer,
    Sync,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Settings => "settings",
            Namespace::Statistics => "statistics",
            Namespace::Achievements => "achievements",
            Namespace::Timer => "timer",
            Namespace::Sync => "sync",
        }
    }
}

const ACHIEVEMENTS_KEY: &str = "unlocked";

/// How long a writer waits for another process holding the store.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable key/value storage for settings, timer bookkeeping and statistics.
pub struct PreferenceStore {
    conn: Connection,
}

impl PreferenceStore {
    /// Open the store at `~/.config/eyerest/eyerest.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or the database cannot be opened.
    pub fn open_default() -> Result<Self, CoreError> {
        let path = data_dir()?.join("eyerest.db");
        Ok(Self::open(&path)?)
    }

    /// Open (or create) the store at `path`.
    ///
    /// Several processes may share the file (a running scheduler plus
    /// one-shot commands); writers wait a few seconds for each other.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_failed = |source: rusqlite::Error| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_failed)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(open_failed)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_failed)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    fn migrate(&self) -> Result<(), StoreError> {
        super::migrations::migrate(&self.conn)?;
        Ok(())
    }

    // ── Raw access ───────────────────────────────────────────────────

    pub fn get(&self, ns: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM prefs WHERE namespace = ?1 AND key = ?2")?;
        let result = stmt.query_row(params![ns.as_str(), key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, ns: Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO prefs (namespace, key, value) VALUES (?1, ?2, ?3)",
            params![ns.as_str(), key, value],
        )?;
        Ok(())
    }

    fn entries(&self, ns: Namespace) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM prefs WHERE namespace = ?1")?;
        let rows = stmt.query_map(params![ns.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Run `f` inside one SQLite transaction: every write made through
    /// `self` commits together, or none does if `f` fails.
    ///
    /// The write lock is taken up front so a read-modify-write never has to
    /// upgrade a stale snapshot.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let out = f(self)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn load_timer(&self) -> Result<TimerState, StoreError> {
        self.load_record(Namespace::Timer)
    }

    pub fn save_timer(&self, timer: &TimerState) -> Result<(), StoreError> {
        self.save_record(Namespace::Timer, timer)
    }

    /// Stored statistics as-is; callers apply the day rollover.
    pub fn load_statistics(&self) -> Result<Statistics, StoreError> {
        self.load_record(Namespace::Statistics)
    }

    pub fn save_statistics(&self, stats: &Statistics) -> Result<(), StoreError> {
        self.save_record(Namespace::Statistics, stats)
    }

    pub fn load_settings(&self) -> Result<Settings, StoreError> {
        self.load_record(Namespace::Settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.save_record(Namespace::Settings, settings)
    }

    pub fn load_achievements(&self) -> Result<Achievements, StoreError> {
        let Some(raw) = self.get(Namespace::Achievements, ACHIEVEMENTS_KEY)? else {
            return Ok(Achievements::default());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "corrupt achievements; starting empty");
            Achievements::default()
        }))
    }

    pub fn save_achievements(&self, achievements: &Achievements) -> Result<(), StoreError> {
        let raw = serde_json::to_string(achievements).map_err(encode_error)?;
        self.set(Namespace::Achievements, ACHIEVEMENTS_KEY, &raw)
    }

    /// Wall-clock time (epoch ms) the category last changed, locally or remotely.
    pub fn last_updated(&self, category: SyncCategory) -> Result<i64, StoreError> {
        let key = format!("{}.last_updated", category.as_str());
        Ok(self
            .get(Namespace::Sync, &key)?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    pub fn set_last_updated(&self, category: SyncCategory, at: i64) -> Result<(), StoreError> {
        let key = format!("{}.last_updated", category.as_str());
        self.set(Namespace::Sync, &key, &at.to_string())
    }

    // ── Field-wise records ───────────────────────────────────────────

    fn save_record<T: Serialize>(&self, ns: Namespace, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record).map_err(encode_error)?;
        let Value::Object(fields) = value else {
            return Err(StoreError::QueryFailed(format!(
                "{} record is not a struct",
                ns.as_str()
            )));
        };
        for (key, field) in fields {
            self.set(ns, &key, &field.to_string())?;
        }
        Ok(())
    }

    /// Rebuild a record from its stored fields.
    fn load_record<T>(&self, ns: Namespace) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let mut fields = Vec::new();
        for (key, raw) in self.entries(ns)? {
            match serde_json::from_str::<Value>(&raw) {
                Ok(v) => fields.push((key, v)),
                Err(e) => {
                    tracing::warn!(namespace = ns.as_str(), key = %key, error = %e, "corrupt value; using default");
                }
            }
        }
        merge_fields(ns, fields)
    }

    // ── Sync payloads ────────────────────────────────────────────────

    /// JSON payload of one category, as uploaded to the remote store.
    /// Statistics are rolled over to `today` first; the stored row is left as is.
    pub fn export(&self, category: SyncCategory, today: NaiveDate) -> Result<Value, StoreError> {
        let value = match category {
            SyncCategory::Settings => serde_json::to_value(self.load_settings()?),
            SyncCategory::Statistics => {
                let mut stats = self.load_statistics()?;
                stats.roll_over(today);
                serde_json::to_value(stats)
            }
            SyncCategory::Achievements => serde_json::to_value(self.load_achievements()?),
            SyncCategory::Timer => serde_json::to_value(self.load_timer()?),
        };
        value.map_err(encode_error)
    }

    /// Overwrite one category with a remote payload.
    ///
    /// Achievements are unioned with the local set, never replaced. Record payloads are merged field by field over the defaults, like
    /// stored rows. A payload of the wrong shape is rejected outright so
    /// a bad document cannot wipe local state.
    pub fn import(&self, category: SyncCategory, payload: &Value) -> Result<(), StoreError> {
        let shape_error = || {
            StoreError::QueryFailed(format!("{} payload has the wrong shape", category.as_str()))
        };
        if category == SyncCategory::Achievements {
            let remote: Achievements =
                serde_json::from_value(payload.clone()).map_err(|_| shape_error())?;
            let mut achievements = self.load_achievements()?;
            achievements.merge(&remote);
            return self.save_achievements(&achievements);
        }

        let Value::Object(map) = payload else {
            return Err(shape_error());
        };
        let fields = map.iter().map(|(k, v)| (k.clone(), v.clone()));
        match category {
            SyncCategory::Settings => {
                let settings: Settings = merge_fields(Namespace::Settings, fields)?;
                self.save_settings(&settings.normalized())
            }
            SyncCategory::Statistics => {
                let stats: Statistics = merge_fields(Namespace::Statistics, fields)?;
                self.save_statistics(&stats)
            }
            SyncCategory::Timer => {
                let timer: TimerState = merge_fields(Namespace::Timer, fields)?;
                self.save_timer(&timer)
            }
            SyncCategory::Achievements => Ok(()),
        }
    }
}

/// Merge `fields` over the defaults of `T`. Each field is checked on its
/// own; malformed or unknown ones are logged and dropped.
fn merge_fields<T>(
    ns: Namespace,
    fields: impl IntoIterator<Item = (String, Value)>,
) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned + Default,
{
    let defaults = serde_json::to_value(T::default()).map_err(encode_error)?;
    let Value::Object(default_fields) = &defaults else {
        return Ok(T::default());
    };

    let mut merged = default_fields.clone();
    for (key, value) in fields {
        if !default_fields.contains_key(&key) {
            continue;
        }
        let mut candidate = default_fields.clone();
        candidate.insert(key.clone(), value.clone());
        if let Err(e) = serde_json::from_value::<T>(Value::Object(candidate)) {
            tracing::warn!(namespace = ns.as_str(), key = %key, error = %e, "corrupt value; using default");
            continue;
        }
        merged.insert(key, value);
    }

    Ok(serde_json::from_value(Value::Object(merged)).unwrap_or_default())
}

fn encode_error(err: serde_json::Error) -> StoreError {
    StoreError::QueryFailed(format!("encode failed: {err}"))
}

//! Snapshot storage.
//!
//! Two backends implement [`SnapshotStore`]:
//!
//! - [`SqliteSnapshotStore`]: one row per zone in a single database.
//! - [`JsonFileStore`]: one `<zone>.json` file per zone in a directory.
//!
//! The SQLite schema:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS zone_snapshots (
//!     zone       TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     entities   INTEGER NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```
//!
//! Snapshots are stored as JSON and read back as a [`RawSnapshot`], so a
//! single malformed entity never prevents the rest of the zone from loading.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use crate::config::{PersistenceConfig, StorageBackend};
use crate::error::{Result, TesseraError};
use crate::snapshot::{RawSnapshot, ZoneSnapshot};

/// Where zone snapshots are kept.
pub trait SnapshotStore: Send {
    /// Save (replace) the snapshot of `zone`.
    ///
    /// # Errors
    /// Backend-specific storage or serialization failures.
    fn save(&self, zone: &str, snapshot: &ZoneSnapshot) -> Result<()>;

    /// Load the snapshot of `zone`, or `None` if none was saved.
    ///
    /// # Errors
    /// Backend-specific storage failures, or a document that is not a
    /// snapshot at all.
    fn load(&self, zone: &str) -> Result<Option<RawSnapshot>>;

    /// Make a durable copy of the store, if the backend supports it.
    ///
    /// # Errors
    /// Backend-specific failures.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the store selected by `config`, or `None` for `backend = "none"`.
///
/// # Errors
/// Fails if the database or directory cannot be opened.
pub fn open_store(config: &PersistenceConfig) -> Result<Option<Box<dyn SnapshotStore>>> {
    Ok(match config.backend {
        StorageBackend::Sqlite => Some(Box::new(SqliteSnapshotStore::open(&config.path, config)?)),
        StorageBackend::Json => Some(Box::new(JsonFileStore::open(&config.path)?)),
        StorageBackend::None => None,
    })
}

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42), bitwise.
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS zone_snapshots (
    zone       TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    entities   INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// Zone snapshots in an SQLite database.
pub struct SqliteSnapshotStore {
    conn: Connection,
    config: PersistenceConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteSnapshotStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Snapshot store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Delete the snapshot of `zone`. Returns `true` if one existed.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] on SQLite failures.
    pub fn delete(&self, zone: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM zone_snapshots WHERE zone = ?1", params![zone])?;
        Ok(deleted > 0)
    }

    /// Names of all zones with a saved snapshot.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] on SQLite failures.
    pub fn zones(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT zone FROM zone_snapshots ORDER BY zone")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<_, _>>()?)
    }

    /// Copy the database to `dest_path` with SQLite's online-backup API.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Snapshot store backup completed"
        );
        Ok(())
    }

    /// Write `<db>.bak.1`, shifting older backups up and keeping at most
    /// `backup_count`.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] or [`TesseraError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }
        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        for i in (1..max).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                std::fs::rename(&src, self.backup_path(i + 1))?;
            }
        }
        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        self.backup(self.backup_path(1))?;

        debug!(max_backups = max, "Rotating backup created");
        Ok(())
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    /// Database file, or `:memory:`.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`. Returns `false` on corruption.
    ///
    /// # Errors
    /// Returns [`TesseraError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, zone: &str, snapshot: &ZoneSnapshot) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_vec(snapshot)?;
        let checksum = self.config.checksum_enabled.then(|| crc32_hex(&json));
        let entities = i64::try_from(snapshot.entities.len()).unwrap_or(i64::MAX);

        self.conn.execute(
            "INSERT INTO zone_snapshots (zone, data, entities, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(zone) DO UPDATE SET
                data = excluded.data,
                entities = excluded.entities,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![zone, json, entities, Utc::now().to_rfc3339(), checksum],
        )?;

        info!(
            zone = zone,
            entities = snapshot.entities.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Snapshot saved"
        );
        Ok(())
    }

    fn load(&self, zone: &str) -> Result<Option<RawSnapshot>> {
        let start = Instant::now();
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM zone_snapshots WHERE zone = ?1")?;
        let row: Option<(Vec<u8>, Option<String>)> = stmt
            .query_row(params![zone], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.config.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        zone = zone,
                        expected = %expected,
                        actual = %actual,
                        "Snapshot checksum mismatch; data may be corrupt"
                    );
                }
            }
        }

        let snapshot: RawSnapshot = serde_json::from_slice(&data)?;
        debug!(
            zone = zone,
            entities = snapshot.entities.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    fn checkpoint(&self) -> Result<()> {
        self.create_rotating_backup()
    }
}

/// Adds `.optional()` to `rusqlite::Result`, mapping
/// `QueryReturnedNoRows` to `Ok(None)`.
trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON files
// ---------------------------------------------------------------------------

/// Zone snapshots as pretty-printed JSON files, one per zone.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Use `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns [`TesseraError::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Snapshot directory opened");
        Ok(Self { dir })
    }

    fn path_for(&self, zone: &str) -> Result<PathBuf> {
        let valid = !zone.is_empty()
            && zone
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !zone.starts_with('.');
        if !valid {
            return Err(TesseraError::Config(format!(
                "zone name {zone:?} cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{zone}.json")))
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, zone: &str, snapshot: &ZoneSnapshot) -> Result<()> {
        let path = self.path_for(zone)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &path)?;

        info!(
            zone = zone,
            entities = snapshot.entities.len(),
            path = %path.display(),
            "Snapshot saved"
        );
        Ok(())
    }

    fn load(&self, zone: &str) -> Result<Option<RawSnapshot>> {
        let path = self.path_for(zone)?;
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = RawSnapshot::from_json(&json)?;
        debug!(zone = zone, entities = snapshot.entities.len(), "Snapshot loaded");
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

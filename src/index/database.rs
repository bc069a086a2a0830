//! SQLite-backed file index.
//!
//! Writes go through a single writer connection behind a mutex, so concurrent
//! `upsert` calls from fingerprinting workers never interleave. File-backed
//! indexes also open a read-only connection; with WAL journaling, lookups on
//! it proceed while the writer holds its lock and always see committed rows.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};

use super::entry::{parts_to_time, time_to_parts, IndexEntry};
use crate::duplicates::DuplicateGroup;
use crate::scanner::Hash;

/// Current on-disk schema version (`PRAGMA user_version`).
pub const SCHEMA_VERSION: i64 = 1;

/// Rows fetched per page by the lazy iterators.
const PAGE_SIZE: usize = 512;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    path         TEXT    NOT NULL UNIQUE,
    size         INTEGER NOT NULL,
    fingerprint  BLOB,
    mtime_secs   INTEGER NOT NULL,
    mtime_nanos  INTEGER NOT NULL,
    last_checked TEXT
);
";

const SCHEMA_INDEXES: &str =
    "CREATE INDEX IF NOT EXISTS idx_files_fingerprint ON files (fingerprint);";

const ENTRY_COLUMNS: &str = "path, size, fingerprint, mtime_secs, mtime_nanos, last_checked";

/// Errors raised by the file index.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The file exists but is not a usable index.
    #[error("index at {path} is corrupt or not a dupedb index: {message}")]
    Corrupt {
        /// Location of the index file
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// The index could not be opened at all.
    #[error("failed to open index at {path}: {source}")]
    Open {
        /// Location of the index file
        path: PathBuf,
        /// The underlying database error
        #[source]
        source: rusqlite::Error,
    },

    /// Creating the index directory failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Paths are stored as UTF-8 text.
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    /// A stored row could not be decoded.
    #[error("invalid row for {path}: {message}")]
    InvalidRow {
        /// Stored path of the offending row
        path: String,
        /// What was wrong with it
        message: String,
    },

    /// Another thread panicked while holding a connection.
    #[error("index connection lock poisoned")]
    LockPoisoned,

    /// A query failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Aggregate counts over the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    /// Total entries
    pub entries: u64,
    /// Entries with a fingerprint
    pub fingerprinted: u64,
    /// Fingerprints shared by two or more entries
    pub duplicate_groups: u64,
    /// Entries belonging to a duplicate group
    pub duplicate_files: u64,
    /// Sum of all entry sizes
    pub total_bytes: u64,
    /// Bytes held by copies beyond the first in each group
    pub reclaimable_bytes: u64,
}

/// Persistent catalog of files keyed by absolute path.
pub struct FileIndex {
    writer: Mutex<Connection>,
    reader: Option<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIndex")
            .field("location", &self.location)
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}

impl FileIndex {
    /// Open (or create) an index at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupt`] if the file is not a SQLite database,
    /// was written by a newer schema, or lacks the expected table layout;
    /// [`IndexError::Open`] or [`IndexError::Io`] if it cannot be opened.
    pub fn open(path: &Path) -> IndexResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IndexError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let writer = Connection::open(path).map_err(|e| classify_open_error(path, e))?;
        configure_writer(&writer).map_err(|e| classify_open_error(path, e))?;
        migrate_schema(&writer, path)?;

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .and_then(|conn| {
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Ok(conn)
        })
        .map_err(|e| classify_open_error(path, e))?;

        log::debug!("Opened file index at {}", path.display());

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Some(Mutex::new(reader)),
            location: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory index (single connection).
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_writer(&conn)?;
        migrate_schema(&conn, Path::new(":memory:"))?;
        Ok(Self {
            writer: Mutex::new(conn),
            reader: None,
            location: None,
        })
    }

    /// Location of the index file, if file-backed.
    #[must_use]
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn write_conn(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| IndexError::LockPoisoned)
    }

    fn read_conn(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        match &self.reader {
            Some(reader) => reader.lock().map_err(|_| IndexError::LockPoisoned),
            None => self.write_conn(),
        }
    }

    /// Insert or replace the entry for `path`. Committed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not UTF-8 or the write fails.
    pub fn upsert(
        &self,
        path: &Path,
        size: u64,
        fingerprint: Option<Hash>,
        modified: SystemTime,
    ) -> IndexResult<()> {
        let conn = self.write_conn()?;
        upsert_row(&conn, path, size, fingerprint, modified, Utc::now())?;
        log::trace!("Upserted {}", path.display());
        Ok(())
    }

    /// Upsert many entries in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error (and commits nothing) if any row fails.
    pub fn upsert_batch(&self, entries: &[IndexEntry]) -> IndexResult<usize> {
        let mut conn = self.write_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        for entry in entries {
            let checked = entry.last_checked.unwrap_or(now);
            upsert_row(
                &tx,
                &entry.path,
                entry.size,
                entry.fingerprint,
                entry.modified,
                checked,
            )?;
        }
        tx.commit()?;
        log::debug!("Upserted batch of {} entries", entries.len());
        Ok(entries.len())
    }

    /// Look up the entry for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed.
    pub fn get(&self, path: &Path) -> IndexResult<Option<IndexEntry>> {
        let key = path_to_db(path)?;
        let conn = self.read_conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM files WHERE path = ?1"),
                params![key],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_entry).transpose()
    }

    /// Delete the entry for `path`. Returns whether an entry existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn remove(&self, path: &Path) -> IndexResult<bool> {
        let key = path_to_db(path)?;
        let conn = self.write_conn()?;
        let removed = conn.execute("DELETE FROM files WHERE path = ?1", params![key])?;
        if removed > 0 {
            log::trace!("Removed {} from index", path.display());
        }
        Ok(removed > 0)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear(&self) -> IndexResult<usize> {
        let conn = self.write_conn()?;
        let removed = conn.execute("DELETE FROM files", [])?;
        log::info!("Cleared {} entries from index", removed);
        Ok(removed)
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn len(&self) -> IndexResult<u64> {
        let conn = self.read_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Whether the index holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Aggregate counts for reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn stats(&self) -> IndexResult<IndexStats> {
        let conn = self.read_conn()?;
        let (entries, fingerprinted, total_bytes): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(fingerprint), COALESCE(SUM(size), 0) FROM files",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let (groups, files, reclaimable): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(n), 0), COALESCE(SUM(extra), 0) FROM (
                 SELECT COUNT(*) AS n, SUM(size) - MIN(size) AS extra
                 FROM files WHERE fingerprint IS NOT NULL
                 GROUP BY fingerprint HAVING COUNT(*) > 1
             )",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(IndexStats {
            entries: entries as u64,
            fingerprinted: fingerprinted as u64,
            duplicate_groups: groups as u64,
            duplicate_files: files as u64,
            total_bytes: total_bytes as u64,
            reclaimable_bytes: reclaimable as u64,
        })
    }

    /// Lazily iterate over every entry.
    ///
    /// Rows are fetched in pages keyed on the row id, so the iterator holds no
    /// lock between pages and each call starts a fresh pass.
    #[must_use]
    pub fn all_entries(&self) -> EntryIter<'_> {
        EntryIter {
            index: self,
            last_id: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Lazily iterate over fingerprint groups with two or more members.
    ///
    /// With `within`, only entries inside that directory are considered, and
    /// the two-member threshold applies to the filtered set.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidPath`] if `within` is not UTF-8.
    pub fn groups_by_fingerprint(&self, within: Option<&Path>) -> IndexResult<GroupIter<'_>> {
        let prefix = within.map(dir_prefix).transpose()?;
        Ok(GroupIter {
            index: self,
            prefix,
            last_fingerprint: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn entries_page(&self, after_id: i64) -> IndexResult<Vec<(i64, IndexEntry)>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT id, {ENTRY_COLUMNS} FROM files WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![after_id, PAGE_SIZE as i64], |row| {
                Ok((row.get::<_, i64>(0)?, RawRow::from_row_offset(row, 1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, raw)| raw.into_entry().map(|entry| (id, entry)))
            .collect()
    }

    fn fingerprint_page(&self, after: &[u8], prefix: Option<&str>) -> IndexResult<Vec<Vec<u8>>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT fingerprint FROM files
             WHERE fingerprint IS NOT NULL AND fingerprint > ?1
               AND (?2 IS NULL OR substr(path, 1, length(?2)) = ?2)
             GROUP BY fingerprint HAVING COUNT(*) > 1
             ORDER BY fingerprint LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![after, prefix, PAGE_SIZE as i64], |row| {
                row.get::<_, Vec<u8>>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn group_members(&self, fingerprint: &[u8], prefix: Option<&str>) -> IndexResult<Vec<IndexEntry>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ENTRY_COLUMNS} FROM files
             WHERE fingerprint = ?1
               AND (?2 IS NULL OR substr(path, 1, length(?2)) = ?2)
             ORDER BY path"
        ))?;
        let rows = stmt
            .query_map(params![fingerprint, prefix], RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_entry).collect()
    }
}

/// Lazy iterator over all index entries. See [`FileIndex::all_entries`].
pub struct EntryIter<'a> {
    index: &'a FileIndex,
    last_id: i64,
    buffer: VecDeque<IndexEntry>,
    done: bool,
}

impl Iterator for EntryIter<'_> {
    type Item = IndexResult<IndexEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.buffer.pop_front() {
            return Some(Ok(entry));
        }
        if self.done {
            return None;
        }
        match self.index.entries_page(self.last_id) {
            Ok(page) => {
                if page.len() < PAGE_SIZE {
                    self.done = true;
                }
                if let Some((id, _)) = page.last() {
                    self.last_id = *id;
                }
                self.buffer.extend(page.into_iter().map(|(_, entry)| entry));
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lazy iterator over duplicate groups. See [`FileIndex::groups_by_fingerprint`].
pub struct GroupIter<'a> {
    index: &'a FileIndex,
    prefix: Option<String>,
    last_fingerprint: Vec<u8>,
    pending: VecDeque<Vec<u8>>,
    done: bool,
}

impl Iterator for GroupIter<'_> {
    type Item = IndexResult<DuplicateGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fingerprint) = self.pending.pop_front() {
                let members = match self
                    .index
                    .group_members(&fingerprint, self.prefix.as_deref())
                {
                    Ok(members) => members,
                    Err(e) => return Some(Err(e)),
                };
                // A member may have been removed since the page was read.
                if members.len() < 2 {
                    continue;
                }
                let Ok(hash) = Hash::try_from(fingerprint.as_slice()) else {
                    return Some(Err(IndexError::InvalidRow {
                        path: members[0].path.display().to_string(),
                        message: format!("fingerprint has {} bytes", fingerprint.len()),
                    }));
                };
                return Some(Ok(DuplicateGroup::new(hash, members)));
            }
            if self.done {
                return None;
            }
            match self
                .index
                .fingerprint_page(&self.last_fingerprint, self.prefix.as_deref())
            {
                Ok(page) => {
                    if page.len() < PAGE_SIZE {
                        self.done = true;
                    }
                    if let Some(last) = page.last() {
                        self.last_fingerprint = last.clone();
                    }
                    self.pending.extend(page);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Columns of one `files` row before validation.
struct RawRow {
    path: String,
    size: i64,
    fingerprint: Option<Vec<u8>>,
    mtime_secs: i64,
    mtime_nanos: i64,
    last_checked: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_offset(row, 0)
    }

    fn from_row_offset(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(offset)?,
            size: row.get(offset + 1)?,
            fingerprint: row.get(offset + 2)?,
            mtime_secs: row.get(offset + 3)?,
            mtime_nanos: row.get(offset + 4)?,
            last_checked: row.get(offset + 5)?,
        })
    }

    fn into_entry(self) -> IndexResult<IndexEntry> {
        let fingerprint = match self.fingerprint {
            Some(bytes) => Some(Hash::try_from(bytes.as_slice()).map_err(|_| {
                IndexError::InvalidRow {
                    path: self.path.clone(),
                    message: format!("fingerprint has {} bytes", bytes.len()),
                }
            })?),
            None => None,
        };
        let nanos = u32::try_from(self.mtime_nanos)
            .ok()
            .filter(|n| *n < 1_000_000_000)
            .ok_or_else(|| IndexError::InvalidRow {
                path: self.path.clone(),
                message: format!("mtime nanoseconds out of range: {}", self.mtime_nanos),
            })?;
        let last_checked = self
            .last_checked
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(IndexEntry {
            path: PathBuf::from(self.path),
            size: self.size.max(0) as u64,
            fingerprint,
            modified: parts_to_time(self.mtime_secs, nanos),
            last_checked,
        })
    }
}

fn upsert_row(
    conn: &Connection,
    path: &Path,
    size: u64,
    fingerprint: Option<Hash>,
    modified: SystemTime,
    checked: DateTime<Utc>,
) -> IndexResult<()> {
    let key = path_to_db(path)?;
    let (secs, nanos) = time_to_parts(modified);
    let mut stmt = conn.prepare_cached(
        "INSERT INTO files (path, size, fingerprint, mtime_secs, mtime_nanos, last_checked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
             size = excluded.size,
             fingerprint = excluded.fingerprint,
             mtime_secs = excluded.mtime_secs,
             mtime_nanos = excluded.mtime_nanos,
             last_checked = excluded.last_checked",
    )?;
    stmt.execute(params![
        key,
        size as i64,
        fingerprint.as_ref().map(|h| h.as_slice()),
        secs,
        i64::from(nanos),
        checked.to_rfc3339(),
    ])?;
    Ok(())
}

fn configure_writer(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns a row, so it cannot go through execute_batch
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch(
        "PRAGMA synchronous = FULL;
         PRAGMA busy_timeout = 5000;
         PRAGMA cache_size = -16000;",
    )?;
    log::debug!("SQLite pragmas configured (journal_mode={}, synchronous=FULL)", mode);
    Ok(())
}

/// Create the schema, refusing indexes written by a newer version.
fn migrate_schema(conn: &Connection, path: &Path) -> IndexResult<()> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| classify_open_error(path, e))?;

    if version > SCHEMA_VERSION {
        return Err(IndexError::Corrupt {
            path: path.to_path_buf(),
            message: format!("schema version {version} is newer than supported {SCHEMA_VERSION}"),
        });
    }

    conn.execute_batch(SCHEMA)
        .map_err(|e| classify_open_error(path, e))?;

    // An existing `files` table from some other tool would pass CREATE IF NOT EXISTS.
    conn.prepare(&format!("SELECT id, {ENTRY_COLUMNS} FROM files LIMIT 0"))
        .map_err(|e| IndexError::Corrupt {
            path: path.to_path_buf(),
            message: format!("unexpected table layout: {e}"),
        })?;

    conn.execute_batch(SCHEMA_INDEXES)?;
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;

    log::debug!("Index schema ready (version {})", SCHEMA_VERSION);
    Ok(())
}

fn classify_open_error(path: &Path, error: rusqlite::Error) -> IndexError {
    match error.sqlite_error_code() {
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => IndexError::Corrupt {
            path: path.to_path_buf(),
            message: error.to_string(),
        },
        _ => IndexError::Open {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

fn path_to_db(path: &Path) -> IndexResult<&str> {
    path.to_str()
        .ok_or_else(|| IndexError::InvalidPath(path.to_path_buf()))
}

/// Stored-path prefix matching everything inside `dir`.
fn dir_prefix(dir: &Path) -> IndexResult<String> {
    let mut prefix = path_to_db(dir)?.to_string();
    if !prefix.ends_with(MAIN_SEPARATOR) {
        prefix.push(MAIN_SEPARATOR);
    }
    Ok(prefix)
}

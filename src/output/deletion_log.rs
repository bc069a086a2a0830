//! CSV log of deletion attempts.
//!
//! # Columns
//!
//! - `path`: Duplicate that was (or would have been) removed
//! - `outcome`: `deleted`, `simulated` or `failed`
//! - `reason`: Failure reason, empty otherwise
//! - `size`: Size in bytes as recorded in the index
//! - `timestamp`: Time of the attempt (RFC 3339)
//!
//! In append mode the header is written only when the file is new or empty,
//! so repeated runs accumulate into one well-formed CSV file. A file-backed
//! log is synced to disk after every record.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::actions::{DeletionRecord, DeletionSink};

const HEADER: [&str; 5] = ["path", "outcome", "reason", "size", "timestamp"];

/// How an existing log file is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogMode {
    /// Add records after existing content.
    #[default]
    Append,
    /// Truncate the file first.
    Overwrite,
}

/// CSV deletion log writer.
pub struct DeletionLog<W: Write> {
    writer: csv::Writer<W>,
    /// Second handle on the log file, used to sync each record.
    sync_handle: Option<File>,
}

impl DeletionLog<File> {
    /// Open (or create) a log file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the header written.
    pub fn open(path: &Path, mode: LogMode) -> io::Result<Self> {
        let file = match mode {
            LogMode::Append => OpenOptions::new().create(true).append(true).open(path)?,
            LogMode::Overwrite => File::create(path)?,
        };
        let needs_header = file.metadata()?.len() == 0;
        log::debug!("Writing deletion log to {} ({:?})", path.display(), mode);
        let sync_handle = file.try_clone()?;
        let mut log = Self::new(file, needs_header)?;
        log.sync_handle = Some(sync_handle);
        log.sync()?;
        Ok(log)
    }
}

impl<W: Write> DeletionLog<W> {
    /// Wrap a writer, optionally emitting the header row first.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(writer: W, write_header: bool) -> io::Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        if write_header {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self {
            writer,
            sync_handle: None,
        })
    }

    fn sync(&self) -> io::Result<()> {
        match &self.sync_handle {
            Some(file) => file.sync_data(),
            None => Ok(()),
        }
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

impl<W: Write> DeletionSink for DeletionLog<W> {
    fn record(&mut self, record: &DeletionRecord) -> io::Result<()> {
        self.writer.write_record([
            &*record.path.to_string_lossy(),
            record.outcome.as_str(),
            record.outcome.reason().unwrap_or(""),
            record.size.to_string().as_str(),
            record.timestamp.to_rfc3339().as_str(),
        ])?;
        self.writer.flush()?;
        self.sync()
    }
}

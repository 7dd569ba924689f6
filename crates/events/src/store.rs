//! Audit journal sinks

use crate::error::EventError;
use crate::record::AuditRecord;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<(), EventError>;
}

/// Append-only JSONL journal, rotated per UTC day
pub struct JsonlJournal {
    base_path: PathBuf,
    inner: Mutex<JournalFile>,
}

#[derive(Default)]
struct JournalFile {
    writer: Option<BufWriter<File>>,
    date: Option<String>,
}

impl JsonlJournal {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, EventError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            inner: Mutex::new(JournalFile::default()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn append(&self, record: &AuditRecord) -> Result<(), EventError> {
        let date = record.timestamp.format("%Y-%m-%d").to_string();
        let mut file = self.inner.lock().map_err(|_| EventError::Poisoned)?;

        if file.date.as_ref() != Some(&date) {
            if let Some(ref mut writer) = file.writer {
                writer.flush()?;
            }
            let path = self.base_path.join(format!("{}.jsonl", date));
            let handle = OpenOptions::new().create(true).append(true).open(&path)?;
            file.writer = Some(BufWriter::new(handle));
            file.date = Some(date);
        }

        if let Some(ref mut writer) = file.writer {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
            writer.flush()?;
        }

        Ok(())
    }

    pub fn today_file_path(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        self.base_path.join(format!("{}.jsonl", date))
    }
}

impl AuditSink for JsonlJournal {
    fn record(&self, record: AuditRecord) -> Result<(), EventError> {
        tracing::debug!(actor = %record.actor, action = ?record.action, "Audit record");
        self.append(&record)
    }
}

/// In-memory journal for tests and embedded use
#[derive(Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<AuditRecord>>,
    unavailable: AtomicBool,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails as if the journal device were gone
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryJournal {
    fn record(&self, record: AuditRecord) -> Result<(), EventError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EventError::Io(std::io::Error::other("journal unavailable")));
        }
        self.records
            .lock()
            .map_err(|_| EventError::Poisoned)?
            .push(record);
        Ok(())
    }
}

//! JSONL journal reader

use crate::error::EventError;
use crate::record::AuditRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Sequential reader over every day file in a journal directory
pub struct JournalReader {
    files: Vec<PathBuf>,
}

impl JournalReader {
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if file_path.extension().is_some_and(|ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        // Day files sort chronologically by name
        files.sort();

        Ok(Self { files })
    }

    pub fn read_all(&self) -> Result<Vec<AuditRecord>, EventError> {
        let mut records = Vec::new();

        for file_path in &self.files {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
        }

        Ok(records)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

//! Collaborators the converter calls out to: where output goes, who records
//! it, and who publishes it.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::detect::DocumentFormat;
use crate::error::Result;

/// Supplies the directory converted files are written to.
pub trait OutputLocator: Send + Sync {
    fn output_dir(&self) -> Result<PathBuf>;
}

/// A fixed output directory.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    dir: PathBuf,
}

impl DirectoryLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl OutputLocator for DirectoryLocator {
    fn output_dir(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(self.dir.clone())
    }
}

/// One successful conversion, as handed to a [`HistorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub output_path: PathBuf,
    pub file_name: String,
    pub source_format: DocumentFormat,
    pub target_format: DocumentFormat,
    pub timestamp: DateTime<Utc>,
}

/// Records finished conversions. Called after success only.
///
/// Errors are logged by the converter and otherwise ignored.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &HistoryRecord) -> Result<()>;
}

/// Keeps history records in memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far.
    pub fn records(&self) -> Vec<HistoryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, record: &HistoryRecord) -> Result<()> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }
}

/// Makes a finished output visible to the outside world (a media index, a
/// sync service, ...). Called once per successful conversion, whatever the
/// target format.
pub trait OutputPublisher: Send + Sync {
    /// `relative_path` is the output path relative to the output directory.
    fn publish(&self, path: &Path, relative_path: &Path, mime_type: &str) -> Result<()>;
}

/// Publisher that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl OutputPublisher for LogPublisher {
    fn publish(&self, path: &Path, relative_path: &Path, mime_type: &str) -> Result<()> {
        log::info!(
            "Published {} ({}) at {}",
            relative_path.display(),
            mime_type,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_locator_creates_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested").join("out");
        let located = DirectoryLocator::new(&dir).output_dir().unwrap();
        assert_eq!(located, dir);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_memory_history() {
        let history = MemoryHistory::new();
        let record = HistoryRecord {
            output_path: PathBuf::from("/tmp/a.odt"),
            file_name: "a.odt".to_string(),
            source_format: DocumentFormat::Docx,
            target_format: DocumentFormat::Odt,
            timestamp: Utc::now(),
        };
        history.record(&record).unwrap();
        assert_eq!(history.records(), vec![record]);
    }
}

/// Session history for completed apply runs.
///
/// The planning core never persists anything. This module is used by the CLI
/// to keep a JSON list of past sessions (`sessions.json` in the configuration
/// directory) so users can see what was organized and how it went.
use crate::executor::ApplyReport;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the history inside the configuration directory.
pub const HISTORY_FILE: &str = "sessions.json";

/// Errors that can occur while reading or writing session history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read history file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write history file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid history file format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Summary of one applied session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The plan's session timestamp.
    pub session_id: String,
    /// When the apply finished.
    pub timestamp: DateTime<Local>,
    pub root: PathBuf,
    pub total_ops: usize,
    pub moved: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SessionSummary {
    pub fn from_report(session_id: &str, root: &Path, report: &ApplyReport) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: Local::now(),
            root: root.to_path_buf(),
            total_ops: report.total(),
            moved: report.moved,
            skipped: report.skipped,
            errors: report.errors.len(),
        }
    }

    /// Percentage of operations that moved. 100 for an empty session.
    pub fn success_rate(&self) -> f64 {
        if self.total_ops == 0 {
            return 100.0;
        }
        self.moved as f64 / self.total_ops as f64 * 100.0
    }
}

/// JSON-backed list of past sessions, oldest first.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    path: PathBuf,
}

impl SessionHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// History stored in `config_dir/sessions.json`.
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all sessions. A missing file is an empty history.
    pub fn load(&self) -> HistoryResult<Vec<SessionSummary>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json_string = fs::read_to_string(&self.path).map_err(|e| HistoryError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(serde_json::from_str(&json_string)?)
    }

    /// Appends a session and rewrites the file.
    pub fn append(&self, session: SessionSummary) -> HistoryResult<()> {
        let mut sessions = self.load()?;
        sessions.push(session);
        self.save(&sessions)
    }

    /// Most recent session, if any.
    pub fn last(&self) -> HistoryResult<Option<SessionSummary>> {
        Ok(self.load()?.pop())
    }

    /// Removes the history file.
    pub fn clear(&self) -> HistoryResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| HistoryError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn save(&self, sessions: &[SessionSummary]) -> HistoryResult<()> {
        let write_error = |e| HistoryError::Write {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let json_string = serde_json::to_string_pretty(sessions)?;
        fs::write(&self.path, json_string).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(moved: usize, skipped: usize, errors: usize) -> ApplyReport {
        ApplyReport {
            moved,
            skipped,
            errors: (0..errors)
                .map(|i| (PathBuf::from(format!("f{}", i)), "error: boom".to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_missing_history_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = SessionHistory::in_dir(temp_dir.path());
        assert!(history.load().expect("load").is_empty());
        assert!(history.last().expect("last").is_none());
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = SessionHistory::in_dir(&temp_dir.path().join("nested"));

        let first = SessionSummary::from_report("2024-01-01_00-00-00", temp_dir.path(), &report(3, 0, 1));
        let second = SessionSummary::from_report("2024-01-02_00-00-00", temp_dir.path(), &report(2, 0, 0));
        history.append(first.clone()).expect("append");
        history.append(second.clone()).expect("append");

        let sessions = history.load().expect("load");
        assert_eq!(sessions, vec![first, second.clone()]);
        assert_eq!(history.last().expect("last"), Some(second));
    }

    #[test]
    fn test_summary_counts_and_rate() {
        let summary = SessionSummary::from_report("ts", Path::new("/downloads"), &report(3, 0, 1));
        assert_eq!(summary.total_ops, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.success_rate(), 75.0);

        let empty = SessionSummary::from_report("ts", Path::new("/downloads"), &report(0, 0, 0));
        assert_eq!(empty.success_rate(), 100.0);
    }

    #[test]
    fn test_corrupt_history_is_format_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = SessionHistory::in_dir(temp_dir.path());
        fs::write(history.path(), "{not json").expect("Failed to write file");
        assert!(matches!(history.load(), Err(HistoryError::Format(_))));
    }

    #[test]
    fn test_clear_removes_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = SessionHistory::in_dir(temp_dir.path());
        history
            .append(SessionSummary::from_report("ts", temp_dir.path(), &report(1, 0, 0)))
            .expect("append");
        history.clear().expect("clear");
        assert!(!history.path().exists());
    }
}

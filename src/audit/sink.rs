//! # Durable Audit Sink
//!
//! Append-only JSON-lines file, size-rotated with timestamp-suffixed backups.
//! Appends and rotation share one lock so rotation never drops a line.

use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct AuditFileSink {
    path: PathBuf,
    max_bytes: u64,
    file: Mutex<Option<File>>,
}

impl AuditFileSink {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
    }

    /// Append one line (a trailing newline is added)
    pub fn append_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let result = match guard.as_mut() {
            Some(file) => writeln!(file, "{line}").and_then(|_| file.flush()),
            None => Ok(()),
        };
        if result.is_err() {
            // Reopen on the next append
            *guard = None;
        }
        result
    }

    /// Rotate when the file exceeds the size limit. Returns the backup path
    /// when a rotation happened.
    pub fn rotate_if_needed(&self) -> io::Result<Option<PathBuf>> {
        let mut guard = self.file.lock();

        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if size <= self.max_bytes {
            return Ok(None);
        }

        let backup = self.backup_path();
        // Close the handle before renaming
        guard.take();
        fs::rename(&self.path, &backup)?;
        *guard = Some(self.open()?);

        info!(
            backup = %backup.display(),
            size_bytes = size,
            "🔄 Audit log rotated"
        );
        Ok(Some(backup))
    }

    fn backup_path(&self) -> PathBuf {
        let suffix = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit.log".to_string());
        self.path.with_file_name(format!("{file_name}.{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log").join("audit.log");
        let sink = AuditFileSink::new(&path, 1024);

        sink.append_line(r#"{"a":1}"#).unwrap();
        sink.append_line(r#"{"a":2}"#).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_rotation_only_above_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.log");
        let sink = AuditFileSink::new(&path, 64);

        assert!(sink.rotate_if_needed().unwrap().is_none());
        sink.append_line("short").unwrap();
        assert!(sink.rotate_if_needed().unwrap().is_none());

        sink.append_line(&"x".repeat(100)).unwrap();
        let backup = sink.rotate_if_needed().unwrap().unwrap();
        assert!(backup.exists());
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("audit.log."));

        // Fresh file continues to receive appends
        sink.append_line("after").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
        assert_eq!(fs::read_to_string(&backup).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let sink = AuditFileSink::new(dir.path(), 64);
        assert!(sink.append_line("line").is_err());
    }
}

//! Append-only JSONL sinks for published signals (§4.F, §6). Every write
//! is fsync'd: a published signal must survive a crash immediately after
//! publication, since the truth log is the system's record of what was
//! actually fired.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

/// The authoritative append-only record of every published signal, one
/// JSON object per line.
pub struct TruthLogWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl TruthLogWriter {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(TruthLogWriter { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `record` as one line and fsyncs before returning.
    pub fn append<T: Serialize>(&self, record: &T) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap();
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }
}

/// Secondary sink carrying the richer [`super::TrackingRecord`] metadata
/// (ATR, volatility, would_fire/fired) the truth log omits. Optional:
/// callers that don't configure a path simply don't construct one.
pub struct TrackingLogWriter {
    file: Mutex<File>,
}

impl TrackingLogWriter {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path.into())?;
        Ok(TrackingLogWriter { file: Mutex::new(file) })
    }

    pub fn append<T: Serialize>(&self, record: &T) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap();
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_log_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truth.jsonl");
        let writer = TruthLogWriter::open(&path).unwrap();
        writer.append(&serde_json::json!({"signal_id": "a"})).unwrap();
        writer.append(&serde_json::json!({"signal_id": "b"})).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truth.jsonl");
        TruthLogWriter::open(&path).unwrap().append(&serde_json::json!({"n": 1})).unwrap();
        TruthLogWriter::open(&path).unwrap().append(&serde_json::json!({"n": 2})).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}

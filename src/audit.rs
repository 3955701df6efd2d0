//! Append-only failure log shared by every worker.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;

pub const FAILURE: &str = "Failure";
pub const COMPLETE: &str = "Complete";
pub const TIMEOUT_REASON: &str = "TIMEOUT";

/// CSV sink for per-record failures and the final run summary.
///
/// Each row is written and flushed while the lock is held, so rows from
/// concurrent workers never interleave.
pub struct FailureLog {
    writer: Mutex<csv::Writer<File>>,
}

impl FailureLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn append<I, S>(&self, fields: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut writer = self.writer.lock();
        writer.write_record(fields)?;
        writer.flush()?;
        Ok(())
    }

    pub fn record_failure(&self, login: &str, reason: &str, status: Option<u16>) {
        let status = status.map(|code| code.to_string());
        let mut row = vec![FAILURE, login, reason];
        if let Some(status) = status.as_deref() {
            row.push(status);
        }
        if let Err(err) = self.append(row) {
            log::error!("failed to write failure row for {}: {}", login, err);
        }
    }

    pub fn record_summary(&self, elapsed: Duration) -> csv::Result<()> {
        let secs = elapsed.as_secs();
        self.append([
            COMPLETE.to_string(),
            format!("Time in seconds: {secs}"),
            format!("Time in minutes: {}", secs / 60),
            format!("Time in hours: {}", secs / 3600),
        ])
    }
}

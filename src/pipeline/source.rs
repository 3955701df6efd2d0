use std::fs::File;
use std::path::Path;
use tokio::sync::mpsc;

use crate::error::{ImportError, ImportResult};
use crate::schema::{FieldSchema, Record};

/// Streams records from the input file into the bounded channel.
pub struct RecordSource {
    reader: csv::Reader<File>,
    schema: FieldSchema,
}

impl RecordSource {
    /// Open the input and derive the field schema from its header row.
    pub fn open(path: &Path) -> ImportResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;
        let schema = FieldSchema::from_header(reader.headers()?.iter())?;
        log::info!(
            "read {} columns from {} ({} profile attributes)",
            schema.width(),
            path.display(),
            schema.profile_fields().len()
        );
        Ok(Self { reader, schema })
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Send every remaining row, blocking while the channel is full.
    ///
    /// Must run on a blocking thread. The channel closes when this returns,
    /// whether or not the input was read to the end.
    pub fn stream(self, sender: mpsc::Sender<Record>) -> ImportResult<u64> {
        let width = self.schema.width();
        let mut sent = 0u64;

        for row in self.reader.into_records() {
            let row = row.map_err(row_error)?;
            if row.len() != width {
                return Err(ImportError::RowWidth {
                    line: row.position().map(|pos| pos.line()).unwrap_or_default(),
                    expected: width,
                    actual: row.len(),
                });
            }

            let record = Record::new(row.iter().map(str::to_string).collect());
            if sender.blocking_send(record).is_err() {
                log::warn!("record source: workers have exited, stopping after {} records", sent);
                break;
            }
            sent += 1;
        }

        log::debug!("record source: end of input after {} records", sent);
        Ok(sent)
    }
}

fn row_error(err: csv::Error) -> ImportError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = err.kind()
    {
        return ImportError::RowWidth {
            line: pos.as_ref().map(|pos| pos.line()).unwrap_or_default(),
            expected: *expected_len as usize,
            actual: *len as usize,
        };
    }
    ImportError::Csv(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn input(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn derives_schema_from_header() {
        let file = input("login,email,password\nann,ann@example.com,pw\n");
        let source = RecordSource::open(file.path()).unwrap();
        assert_eq!(source.schema().profile_fields(), ["login", "email"]);
    }

    #[test]
    fn empty_input_is_fatal() {
        let file = input("");
        assert!(matches!(
            RecordSource::open(file.path()),
            Err(ImportError::MissingHeader)
        ));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordSource::open(&dir.path().join("absent.csv")).is_err());
    }

    #[tokio::test]
    async fn streams_rows_in_order_and_closes() {
        let file = input("login,email\na,a@x\nb,b@x\nc,c@x\n");
        let source = RecordSource::open(file.path()).unwrap();
        let (sender, mut receiver) = mpsc::channel(8);

        let sent = tokio::task::spawn_blocking(move || source.stream(sender))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent, 3);

        let mut logins = Vec::new();
        while let Some(record) = receiver.recv().await {
            logins.push(record.get(0).to_string());
        }
        assert_eq!(logins, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn unequal_row_is_fatal() {
        let file = input("login,email\na,a@x\nb\n");
        let source = RecordSource::open(file.path()).unwrap();
        let (sender, mut receiver) = mpsc::channel(8);

        let result = tokio::task::spawn_blocking(move || source.stream(sender))
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(ImportError::RowWidth {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert!(receiver.recv().await.is_some());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn blocks_when_channel_is_full() {
        let rows: String = (0..10).map(|i| format!("user{i},u{i}@x\n")).collect();
        let file = input(&format!("login,email\n{rows}"));
        let source = RecordSource::open(file.path()).unwrap();
        let (sender, mut receiver) = mpsc::channel(2);

        let task = tokio::task::spawn_blocking(move || source.stream(sender));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(receiver.len(), 2);
        assert!(!task.is_finished());

        let mut received = 0;
        while receiver.recv().await.is_some() {
            assert!(receiver.len() <= 2);
            received += 1;
        }
        assert_eq!(received, 10);
        assert_eq!(task.await.unwrap().unwrap(), 10);
    }
}

//! Dataset dump reader.
//!
//! A dump is a directory tree of JSON files, one record per file.

use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::PipelineError;
use media_indexer_shared::DumpRecord;

const READ_AHEAD: usize = 64;

/// Reader for dataset dumps.
pub struct DumpSource;

impl DumpSource {
    /// Stream every `*.json` record under `path`, sorted by path, stopping
    /// after `max_count` parsed records.
    ///
    /// Files are read on the blocking pool. A file that cannot be read or
    /// parsed yields an error item, does not count toward `max_count`, and
    /// the walk continues. Must be called
    /// from within a tokio runtime.
    pub fn open(
        path: impl Into<PathBuf>,
        max_count: Option<usize>,
    ) -> impl Stream<Item = Result<DumpRecord, PipelineError>> + Send + 'static {
        let root = path.into();
        let (tx, rx) = mpsc::channel(READ_AHEAD);

        tokio::task::spawn_blocking(move || {
            info!(path = %root.display(), max_count = ?max_count, "Reading dump");
            let mut sent = 0usize;

            for entry in WalkDir::new(&root).sort_by_file_name() {
                if max_count.is_some_and(|max| sent >= max) {
                    break;
                }

                let item = match entry {
                    Ok(entry) if is_json_file(entry.path()) => read_record(entry.path()),
                    Ok(_) => continue,
                    Err(e) => Err(PipelineError::source(e.to_string())),
                };

                let parsed = item.is_ok();
                if tx.blocking_send(item).is_err() {
                    debug!("Dump reader dropped; stopping walk");
                    return;
                }
                if parsed {
                    sent += 1;
                }
            }

            info!(records = sent, "Finished reading dump");
        });

        ReceiverStream::new(rx)
    }
}

fn is_json_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}

fn read_record(path: &Path) -> Result<DumpRecord, PipelineError> {
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::source(format!("{}: {e}", path.display())))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Unparseable dump record");
        PipelineError::source(format!("{}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_reads_json_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b/2.json", r#"{"_id": "getty_2"}"#);
        write(dir.path(), "a/1.json", r#"{"_id": "getty_1", "title": "One"}"#);
        write(dir.path(), "a/notes.txt", "ignored");
        write(dir.path(), "c.json", r#"{"_id": "getty_3"}"#);

        let records: Vec<_> = DumpSource::open(dir.path(), None).collect().await;
        let ids: Vec<String> = records.into_iter().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, ["getty_1", "getty_2", "getty_3"]);
    }

    #[tokio::test]
    async fn test_max_count_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.json", r#"{"_id": "getty_1"}"#);
        write(dir.path(), "2.json", "{ not json");
        write(dir.path(), "3.json", r#"{"_id": "getty_3"}"#);
        write(dir.path(), "4.json", r#"{"_id": "getty_4"}"#);

        let records: Vec<_> = DumpSource::open(dir.path(), Some(2)).collect().await;
        assert_eq!(records.len(), 3);
        assert!(matches!(records[1], Err(PipelineError::SourceError(_))));

        let ids: Vec<String> = records.into_iter().filter_map(Result::ok).map(|r| r.id).collect();
        assert_eq!(ids, ["getty_1", "getty_3"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error_item() {
        let records: Vec<_> = DumpSource::open("/nonexistent/dump/dir", None).collect().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_err());
    }
}

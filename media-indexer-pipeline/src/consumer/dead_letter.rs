//! Dead-letter sinks for stream events that could not be normalized.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::PipelineError;

/// A rejected event together with the reason it was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub received_at: DateTime<Utc>,
    pub error: String,
    /// The raw payload, lossily decoded as UTF-8.
    pub payload: String,
}

impl DeadLetter {
    pub fn new(payload: &[u8], error: &PipelineError) -> Self {
        Self {
            received_at: Utc::now(),
            error: error.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// Destination for rejected events.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, letter: DeadLetter) -> Result<(), PipelineError>;
}

/// Sink that only logs rejected events.
#[derive(Debug, Default)]
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<(), PipelineError> {
        warn!(
            error = %letter.error,
            payload = %letter.payload,
            "Dead-lettered event"
        );
        Ok(())
    }
}

/// Sink appending rejected events to a JSON-lines file.
pub struct JsonlDeadLetterSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDeadLetterSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PipelineError::dead_letter(format!("{}: {e}", path.display())))?;

        info!(path = %path.display(), "Writing dead letters");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for JsonlDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<(), PipelineError> {
        let mut line = serde_json::to_vec(&letter)
            .map_err(|e| PipelineError::dead_letter(e.to_string()))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead_letters.jsonl");

        let sink = JsonlDeadLetterSink::open(&path).await.unwrap();
        let error = PipelineError::MissingTimestamp("getty_1".into());
        sink.send(DeadLetter::new(b"{\"type\":\"artefact\"}", &error))
            .await
            .unwrap();
        sink.send(DeadLetter::new(&[0xff, b'x'], &error)).await.unwrap();

        let contents = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["payload"], "{\"type\":\"artefact\"}");
        assert_eq!(lines[0]["error"], "Missing timestamp for document getty_1");
        assert_eq!(lines[1]["payload"], "\u{fffd}x");
    }
}

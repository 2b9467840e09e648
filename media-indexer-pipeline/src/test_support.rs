//! Test doubles and fixtures shared by the pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};

use crate::consumer::{DeadLetter, DeadLetterSink, EventTransport};
use crate::dedup::{ReindexError, Reindexer};
use crate::errors::{PipelineError, TransportError};
use media_indexer_repository::{
    BulkItem, BulkItemResult, BulkSummary, IndexSchema, IndexStore, IndexStoreError,
};
use media_indexer_shared::{CanonicalDocument, DumpRecord, StreamEvent};

type EventLog = Arc<Mutex<Vec<String>>>;

/// In-memory index store recording every call in an event log.
#[derive(Default)]
pub struct MockIndexStore {
    indices: Mutex<HashSet<String>>,
    docs: Mutex<BTreeMap<String, Value>>,
    log: EventLog,
    rejected: Mutex<HashMap<String, IndexStoreError>>,
    failures: Mutex<VecDeque<IndexStoreError>>,
    refresh_fails: AtomicBool,
    attempts: AtomicUsize,
}

impl MockIndexStore {
    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn document_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn document_ids(&self) -> Vec<String> {
        self.docs.lock().unwrap().keys().cloned().collect()
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.lock().unwrap().contains(name)
    }

    /// Reject `id` in every write with `error`.
    pub fn reject_id(&self, id: &str, error: IndexStoreError) {
        self.rejected.lock().unwrap().insert(id.to_string(), error);
    }

    /// Fail the next `count` write calls as a whole.
    pub fn fail_next_writes(&self, count: usize, error: IndexStoreError) {
        let mut failures = self.failures.lock().unwrap();
        failures.extend(std::iter::repeat(error).take(count));
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.refresh_fails.store(fail, Ordering::SeqCst);
    }

    /// Number of index and bulk calls, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }

    fn next_failure(&self) -> Option<IndexStoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl IndexStore for MockIndexStore {
    async fn index_exists(&self, index: &str) -> Result<bool, IndexStoreError> {
        Ok(self.has_index(index))
    }

    async fn create_index(&self, index: &str, _schema: &IndexSchema) -> Result<(), IndexStoreError> {
        if !self.indices.lock().unwrap().insert(index.to_string()) {
            return Err(IndexStoreError::IndexAlreadyExists(index.to_string()));
        }
        self.record(format!("create:{index}"));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), IndexStoreError> {
        if !self.indices.lock().unwrap().remove(index) {
            return Err(IndexStoreError::IndexMissing(index.to_string()));
        }
        self.docs.lock().unwrap().clear();
        self.record(format!("delete:{index}"));
        Ok(())
    }

    async fn index_document(&self, _index: &str, id: &str, body: &Value) -> Result<(), IndexStoreError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        if let Some(error) = self.rejected.lock().unwrap().get(id) {
            return Err(error.clone());
        }
        self.docs.lock().unwrap().insert(id.to_string(), body.clone());
        self.record(format!("index:{id}"));
        Ok(())
    }

    async fn bulk_index(&self, _index: &str, batch: &[BulkItem]) -> Result<BulkSummary, IndexStoreError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        // Widen the window for workers to interleave.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let rejected = self.rejected.lock().unwrap().clone();
        let results = batch
            .iter()
            .map(|item| match rejected.get(&item.id) {
                Some(error) => BulkItemResult::failed(&item.id, error.clone()),
                None => {
                    self.docs.lock().unwrap().insert(item.id.clone(), item.body.clone());
                    BulkItemResult::ok(&item.id)
                }
            })
            .collect();
        self.record(format!("bulk:{}", batch.len()));
        Ok(BulkSummary::from_results(results))
    }

    async fn refresh(&self, _index: &str) -> Result<(), IndexStoreError> {
        self.record("refresh");
        if self.refresh_fails.load(Ordering::SeqCst) {
            return Err(IndexStoreError::refresh("refresh rejected"));
        }
        Ok(())
    }

    async fn count(&self, _index: &str) -> Result<u64, IndexStoreError> {
        Ok(self.document_count() as u64)
    }

    async fn health_check(&self) -> Result<bool, IndexStoreError> {
        Ok(true)
    }
}

/// Reindexer recording its calls, optionally into a store's event log.
#[derive(Default)]
pub struct RecordingReindexer {
    log: EventLog,
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingReindexer {
    pub fn sharing_log(store: &MockIndexStore) -> Self {
        Self {
            log: store.log.clone(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self, event: String) -> Result<(), ReindexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(event);
        if self.fail {
            return Err(ReindexError::Request("dedup service unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Reindexer for RecordingReindexer {
    async fn reindex_all(&self) -> Result<(), ReindexError> {
        self.call("reindex_all".to_string())
    }

    async fn reindex_after(&self, document_id: &str) -> Result<(), ReindexError> {
        self.call(format!("reindex:{document_id}"))
    }
}

/// Transport replaying a fixed script, then reporting end of stream.
pub struct ScriptedTransport {
    script: VecDeque<Result<Vec<u8>, TransportError>>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Vec<u8>, TransportError>>) -> Self {
        Self {
            script: script.into(),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `next_event` calls.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        self.reads.clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn next_event(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Dead-letter sink keeping letters in memory.
#[derive(Default)]
pub struct MemoryDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetterSink {
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<(), PipelineError> {
        self.letters.lock().unwrap().push(letter);
        Ok(())
    }
}

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    })
}

pub fn encoded_image(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(img.clone()).to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.clone()),
    };
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_data_url(width: u32, height: u32) -> String {
    let png = encoded_image(&gradient(width, height), ImageFormat::Png);
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

pub fn document(id: &str) -> CanonicalDocument {
    CanonicalDocument {
        title: Some(format!("Title {id}")),
        ..CanonicalDocument::new(id)
    }
}

pub fn dump_record(id: &str, img_data: Option<String>) -> DumpRecord {
    DumpRecord {
        id: id.to_string(),
        title: Some(format!("Title {id}")),
        artist: Some("Unknown".to_string()),
        img_data,
        ..Default::default()
    }
}

pub fn artifact_event(id: &str, thumbnail: &str) -> StreamEvent {
    serde_json::from_value(artifact_json(id, thumbnail)).unwrap()
}

pub fn artifact_payload(id: &str) -> Vec<u8> {
    serde_json::to_vec(&artifact_json(id, &png_data_url(8, 8))).unwrap()
}

fn artifact_json(id: &str, thumbnail: &str) -> Value {
    json!({
        "type": "artefact",
        "meta": {
            "data": {
                "_id": id,
                "title": format!("Title {id}"),
                "artist": "Unknown",
                "keywords": ["Vertical", "Walking"],
                "thumbnail_base64": thumbnail
            },
            "raw_ref": { "@link": [1, 2, 3, 4] },
            "translated_at": "2016-06-01T12:00:00"
        }
    })
}

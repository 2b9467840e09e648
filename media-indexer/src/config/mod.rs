//! Configuration for the media indexer.
//!
//! Everything is read from the environment (after `.env` is loaded) with
//! defaults suitable for a local stack.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};

use crate::IndexingError;
use media_indexer_pipeline::processor::{ThumbnailConfig, ThumbnailPolicy};
use media_indexer_pipeline::{LoadStrategy, LoaderConfig, TransportFailurePolicy};
use media_indexer_repository::config::DEFAULT_INDEX_NAME;
use media_indexer_repository::IndexConfig;

const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";
const DEFAULT_DOC_TYPE: &str = "image";
const DEFAULT_STREAM_HOST: &str = "localhost";
const DEFAULT_STREAM_PORT: u16 = 9092;
const DEFAULT_STREAM_TOPIC: &str = "artifacts";
const DEFAULT_STREAM_GROUP_ID: &str = "media-indexer";
const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:23456";
const DEFAULT_DUMP_PATH: &str = "getty_small/json/images";

const MASK: &str = "********";

/// Effective configuration of the indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub opensearch_url: String,
    pub opensearch_username: Option<String>,
    pub opensearch_password: Option<String>,
    pub index_name: String,
    pub doc_type: String,
    pub index_shards: u32,
    pub index_replicas: u32,

    pub stream_host: String,
    pub stream_port: u16,
    pub stream_topic: String,
    pub stream_group_id: String,
    pub stream_read_timeout_secs: u64,
    /// End a stream run once the topic is drained instead of waiting for more events.
    pub stream_stop_at_eof: bool,
    pub force_exit: bool,
    pub force_exit_grace_ms: u64,

    pub auto_reindex: bool,
    pub reindex_url: Option<String>,
    pub search_url: String,

    pub dump_path: PathBuf,
    pub thumb_max_width: u32,
    pub thumb_max_height: u32,
    pub thumbnail_policy: ThumbnailPolicy,

    pub load_strategy: LoadStrategy,
    pub load_workers: usize,
    pub load_chunk_size: usize,
    pub load_max_chunk_bytes: usize,
    pub dead_letter_path: Option<PathBuf>,
}

impl IndexerConfig {
    /// Read the configuration from environment variables.
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let loader = LoaderConfig::default();
        let thumbnail = ThumbnailConfig::default();

        Ok(Self {
            opensearch_url: vars.string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            opensearch_username: vars.optional("OPENSEARCH_USERNAME"),
            opensearch_password: vars.optional("OPENSEARCH_PASSWORD"),
            index_name: vars.string("INDEX_NAME", DEFAULT_INDEX_NAME),
            doc_type: vars.string("DOC_TYPE", DEFAULT_DOC_TYPE),
            index_shards: vars.parsed("INDEX_SHARDS", 1)?,
            index_replicas: vars.parsed("INDEX_REPLICAS", 0)?,

            stream_host: vars.string("STREAM_HOST", DEFAULT_STREAM_HOST),
            stream_port: vars.parsed("STREAM_PORT", DEFAULT_STREAM_PORT)?,
            stream_topic: vars.string("STREAM_TOPIC", DEFAULT_STREAM_TOPIC),
            stream_group_id: vars.string("STREAM_GROUP_ID", DEFAULT_STREAM_GROUP_ID),
            stream_read_timeout_secs: vars.parsed("STREAM_READ_TIMEOUT_SECS", 600)?,
            stream_stop_at_eof: vars.flag("STREAM_STOP_AT_EOF", false)?,
            force_exit: vars.flag("FORCE_EXIT", false)?,
            force_exit_grace_ms: vars.parsed("FORCE_EXIT_GRACE_MS", 1000)?,

            auto_reindex: vars.flag("AUTO_REINDEX", true)?,
            reindex_url: vars.optional("REINDEX_URL"),
            search_url: vars.string("SEARCH_URL", DEFAULT_SEARCH_URL),

            dump_path: PathBuf::from(vars.string("DUMP_PATH", DEFAULT_DUMP_PATH)),
            thumb_max_width: vars.parsed("THUMB_MAX_WIDTH", thumbnail.max_width)?,
            thumb_max_height: vars.parsed("THUMB_MAX_HEIGHT", thumbnail.max_height)?,
            thumbnail_policy: vars.parsed("THUMBNAIL_POLICY", ThumbnailPolicy::Redo)?,

            load_strategy: vars.parsed("LOAD_STRATEGY", LoadStrategy::Strict)?,
            load_workers: vars.parsed("LOAD_WORKERS", loader.workers)?,
            load_chunk_size: vars.parsed("LOAD_CHUNK_SIZE", loader.chunk_size)?,
            load_max_chunk_bytes: vars.parsed("LOAD_MAX_CHUNK_BYTES", loader.max_chunk_bytes)?,
            dead_letter_path: vars.optional("DEAD_LETTER_PATH").map(PathBuf::from),
        })
        .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, IndexingError> {
        if self.thumb_max_width == 0 || self.thumb_max_height == 0 {
            return Err(IndexingError::config("thumbnail bounds must be positive"));
        }
        if self.load_workers == 0 || self.load_chunk_size == 0 {
            return Err(IndexingError::config(
                "LOAD_WORKERS and LOAD_CHUNK_SIZE must be positive",
            ));
        }
        Ok(self)
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            name: self.index_name.clone(),
            number_of_shards: self.index_shards,
            number_of_replicas: self.index_replicas,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            strategy: self.load_strategy,
            workers: self.load_workers,
            chunk_size: self.load_chunk_size,
            max_chunk_bytes: self.load_max_chunk_bytes,
            ..Default::default()
        }
    }

    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            max_width: self.thumb_max_width,
            max_height: self.thumb_max_height,
        }
    }

    pub fn transport_failure_policy(&self) -> TransportFailurePolicy {
        if self.force_exit {
            TransportFailurePolicy::ForceExit {
                grace: Duration::from_millis(self.force_exit_grace_ms),
            }
        } else {
            TransportFailurePolicy::Propagate
        }
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.opensearch_username, &self.opensearch_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }

    /// The configuration as JSON, with secrets masked.
    pub fn to_masked_json(&self) -> Value {
        json!({
            "opensearch_url": self.opensearch_url,
            "opensearch_username": self.opensearch_username,
            "opensearch_password": self.opensearch_password.as_ref().map(|_| MASK),
            "index_name": self.index_name,
            "doc_type": self.doc_type,
            "index_shards": self.index_shards,
            "index_replicas": self.index_replicas,
            "stream_host": self.stream_host,
            "stream_port": self.stream_port,
            "stream_topic": self.stream_topic,
            "stream_group_id": self.stream_group_id,
            "stream_read_timeout_secs": self.stream_read_timeout_secs,
            "stream_stop_at_eof": self.stream_stop_at_eof,
            "force_exit": self.force_exit,
            "force_exit_grace_ms": self.force_exit_grace_ms,
            "auto_reindex": self.auto_reindex,
            "reindex_url": self.reindex_url,
            "search_url": self.search_url,
            "dump_path": self.dump_path.display().to_string(),
            "thumb_max_width": self.thumb_max_width,
            "thumb_max_height": self.thumb_max_height,
            "thumbnail_policy": format!("{:?}", self.thumbnail_policy),
            "load_strategy": format!("{:?}", self.load_strategy),
            "load_workers": self.load_workers,
            "load_chunk_size": self.load_chunk_size,
            "load_max_chunk_bytes": self.load_max_chunk_bytes,
            "dead_letter_path": self.dead_letter_path.as_ref().map(|p| p.display().to_string()),
        })
    }
}

/// Typed access to configuration variables.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, IndexingError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| IndexingError::config(format!("invalid {key}={raw:?}: {e}"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, IndexingError> {
        match self.optional(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(IndexingError::config(format!("invalid {key}={v:?}: expected a boolean"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<IndexerConfig, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IndexerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.opensearch_url, "http://localhost:9200");
        assert_eq!(config.index_name, "getty_test");
        assert_eq!(config.doc_type, "image");
        assert_eq!(config.stream_read_timeout_secs, 600);
        assert!(!config.stream_stop_at_eof);
        assert_eq!((config.thumb_max_width, config.thumb_max_height), (150, 150));
        assert_eq!(config.load_strategy, LoadStrategy::Strict);
        assert_eq!(config.load_max_chunk_bytes, 100 * 1024 * 1024);
        assert_eq!(config.transport_failure_policy(), TransportFailurePolicy::Propagate);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("INDEX_NAME", "media"),
            ("INDEX_SHARDS", "3"),
            ("LOAD_STRATEGY", "concurrent"),
            ("LOAD_WORKERS", "8"),
            ("FORCE_EXIT", "yes"),
            ("STREAM_STOP_AT_EOF", "true"),
            ("FORCE_EXIT_GRACE_MS", "250"),
            ("THUMBNAIL_POLICY", "if-missing"),
            ("DEAD_LETTER_PATH", "/tmp/dead.jsonl"),
        ])
        .unwrap();

        assert_eq!(config.index_config().name, "media");
        assert_eq!(config.index_config().number_of_shards, 3);
        assert_eq!(config.loader_config().strategy, LoadStrategy::Concurrent);
        assert_eq!(config.loader_config().workers, 8);
        assert_eq!(config.thumbnail_policy, ThumbnailPolicy::IfMissing);
        assert_eq!(
            config.transport_failure_policy(),
            TransportFailurePolicy::ForceExit {
                grace: Duration::from_millis(250)
            }
        );
        assert_eq!(config.dead_letter_path, Some(PathBuf::from("/tmp/dead.jsonl")));
        assert!(config.stream_stop_at_eof);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("STREAM_PORT", "not-a-port")],
            [("LOAD_STRATEGY", "eventually")],
            [("AUTO_REINDEX", "maybe")],
            [("THUMB_MAX_WIDTH", "0")],
            [("LOAD_WORKERS", "0")],
        ] {
            let result = config_from(&vars);
            assert!(
                matches!(result, Err(IndexingError::ConfigError(_))),
                "{vars:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_masked_json_hides_password() {
        let config = config_from(&[
            ("OPENSEARCH_USERNAME", "admin"),
            ("OPENSEARCH_PASSWORD", "hunter2"),
        ])
        .unwrap();

        assert_eq!(
            config.credentials(),
            Some(("admin".to_string(), "hunter2".to_string()))
        );
        let json = config.to_masked_json();
        assert_eq!(json["opensearch_username"], "admin");
        assert_eq!(json["opensearch_password"], MASK);
        assert!(!json.to_string().contains("hunter2"));
    }
}

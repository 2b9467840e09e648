//! Processor module for the media indexer pipeline.
//!
//! Turns dump records and stream events into canonical documents.

mod artifact;
mod dump;
pub mod field_table;
mod normalizer;
pub mod thumbnail;

pub use normalizer::{parse_timestamp, Normalizer, NormalizerConfig, ThumbnailPolicy};
pub use thumbnail::ThumbnailConfig;

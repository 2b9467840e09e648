//! Consumer module for the media indexer pipeline.
//!
//! Sources of records: the Kafka event stream and dataset dumps on disk.

mod artifact_stream;
mod dead_letter;
mod dump_source;
mod kafka_transport;
mod transport;

pub use artifact_stream::{ArtifactStreamAdapter, StreamConfig, StreamCounters, StreamStats};
pub use dead_letter::{DeadLetter, DeadLetterSink, JsonlDeadLetterSink, LogDeadLetterSink};
pub use dump_source::DumpSource;
pub use kafka_transport::{classify_kafka_error, KafkaEventTransport, KafkaTransportConfig, ResumeToken};
pub use transport::EventTransport;

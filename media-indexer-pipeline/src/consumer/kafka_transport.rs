//! Kafka implementation of the event transport.
//!
//! Reads raw artifact events from a single topic. Offsets are never
//! committed; a run either starts from the beginning of the topic or from an
//! explicit [`ResumeToken`]. The connection stays open until a read times out
//! or fails, unless `stop_at_eof` ends it once every assigned partition is
//! drained.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    error::{KafkaError, RDKafkaErrorCode},
    message::Message as KafkaMessage,
    Offset, TopicPartitionList,
};
use tracing::{debug, info, instrument};

use crate::consumer::transport::EventTransport;
use crate::errors::{TransportError, TransportErrorKind};

/// Position to resume reading from, written as `partition:offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeToken {
    pub partition: i32,
    pub offset: i64,
}

impl FromStr for ResumeToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (partition, offset) = s
            .split_once(':')
            .ok_or_else(|| format!("resume token must be partition:offset, got {s:?}"))?;
        let partition = partition
            .trim()
            .parse()
            .map_err(|e| format!("invalid partition in resume token: {e}"))?;
        let offset = offset
            .trim()
            .parse()
            .map_err(|e| format!("invalid offset in resume token: {e}"))?;
        Ok(Self { partition, offset })
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.partition, self.offset)
    }
}

/// Connection settings for [`KafkaEventTransport`].
#[derive(Debug, Clone)]
pub struct KafkaTransportConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub group_id: String,
    pub resume: Option<ResumeToken>,
    /// End the stream once every assigned partition reports EOF.
    pub stop_at_eof: bool,
}

impl KafkaTransportConfig {
    pub fn brokers(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Kafka consumer delivering artifact event payloads.
pub struct KafkaEventTransport {
    consumer: StreamConsumer,
    topic: String,
    stop_at_eof: bool,
    exhausted: HashSet<i32>,
}

impl KafkaEventTransport {
    /// Connect to the brokers and subscribe to (or assign) the topic.
    pub fn open(config: &KafkaTransportConfig) -> Result<Self, TransportError> {
        let brokers = config.brokers();
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", if config.stop_at_eof { "true" } else { "false" })
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| classify_kafka_error(&e))?;

        match config.resume {
            Some(token) => {
                let mut tpl = TopicPartitionList::new();
                tpl.add_partition_offset(&config.topic, token.partition, Offset::Offset(token.offset))
                    .map_err(|e| classify_kafka_error(&e))?;
                consumer.assign(&tpl).map_err(|e| classify_kafka_error(&e))?;
                info!(brokers = %brokers, topic = %config.topic, resume = %token, "Assigned Kafka partition");
            }
            None => {
                consumer
                    .subscribe(&[config.topic.as_str()])
                    .map_err(|e| classify_kafka_error(&e))?;
                info!(brokers = %brokers, topic = %config.topic, group_id = %config.group_id, "Subscribed to Kafka topic");
            }
        }

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            stop_at_eof: config.stop_at_eof,
            exhausted: HashSet::new(),
        })
    }

    fn drained(&self) -> bool {
        self.consumer
            .assignment()
            .is_ok_and(|assignment| all_partitions_exhausted(assignment.count(), &self.exhausted))
    }
}

/// Whether every one of `assigned` partitions has reported EOF.
fn all_partitions_exhausted(assigned: usize, exhausted: &HashSet<i32>) -> bool {
    assigned > 0 && exhausted.len() >= assigned
}

#[async_trait]
impl EventTransport for KafkaEventTransport {
    #[instrument(skip(self), fields(topic = %self.topic))]
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let received = tokio::time::timeout(timeout, self.consumer.recv())
                .await
                .map_err(|_| {
                    TransportError::new(
                        TransportErrorKind::Expiration,
                        format!("no event within {}s", timeout.as_secs()),
                    )
                })?;

            match received {
                Ok(msg) => {
                    self.exhausted.remove(&msg.partition());
                    debug!(partition = msg.partition(), offset = msg.offset(), "Received event");
                    match msg.payload() {
                        Some(payload) => return Ok(Some(payload.to_vec())),
                        None => debug!("Received message with empty payload"),
                    }
                }
                Err(KafkaError::PartitionEOF(partition)) => {
                    self.exhausted.insert(partition);
                    debug!(partition, "Reached end of partition");
                    if self.stop_at_eof && self.drained() {
                        info!("All partitions exhausted");
                        return Ok(None);
                    }
                }
                Err(e) => return Err(classify_kafka_error(&e)),
            }
        }
    }
}

/// Map a Kafka client error onto the closed transport failure categories.
pub fn classify_kafka_error(error: &KafkaError) -> TransportError {
    let kind = match error {
        KafkaError::Canceled => TransportErrorKind::Cancellation,
        KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) => {
            TransportErrorKind::Abortion
        }
        _ => match error.rdkafka_error_code() {
            Some(
                RDKafkaErrorCode::MessageTimedOut
                | RDKafkaErrorCode::OperationTimedOut
                | RDKafkaErrorCode::RequestTimedOut,
            ) => TransportErrorKind::Expiration,
            Some(RDKafkaErrorCode::BrokerDestroy) => TransportErrorKind::LocalShutdown,
            Some(RDKafkaErrorCode::BrokerNotAvailable | RDKafkaErrorCode::AllBrokersDown) => {
                TransportErrorKind::RemoteShutdown
            }
            Some(
                RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::NetworkException,
            ) => TransportErrorKind::Network,
            Some(RDKafkaErrorCode::Fatal) => TransportErrorKind::Abortion,
            _ => TransportErrorKind::Remote,
        },
    };
    TransportError::new(kind, error.to_string())
}

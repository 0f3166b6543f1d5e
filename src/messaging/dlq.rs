use std::future::Future;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;

use crate::config::DlqConfig;
use crate::errors::{OrderError, Result};
use crate::metrics::names as metric;
use crate::resilience::BackoffPolicy;

const PRODUCE_TIMEOUT: Duration = Duration::from_secs(5);

/// A consumed stream message, detached from the Kafka client so the retry
/// and dead-letter paths can own it.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Envelope wrapping a dead-lettered message: why it failed, where it came
/// from, and the original value verbatim as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqEnvelope {
    pub metadata: DlqMetadata,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqMetadata {
    pub original_topic: String,
    pub partition: i32,
    pub offset: i64,
    pub retry_count: u32,
    pub error: String,
    /// RFC3339 UTC.
    pub timestamp: String,
}

impl DlqEnvelope {
    pub fn new(source: &SourceMessage, error: &str, retry_count: u32) -> Self {
        Self {
            metadata: DlqMetadata {
                original_topic: source.topic.clone(),
                partition: source.partition,
                offset: source.offset,
                retry_count,
                error: error.to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            payload: String::from_utf8_lossy(&source.payload).into_owned(),
        }
    }
}

/// Dead-letter queue producer. Also carries the retry policy for the
/// ingest-side retry driver so both ends of the pipeline agree on the
/// budget.
pub struct Dlq {
    producer: FutureProducer,
    topic: String,
    policy: BackoffPolicy,
}

impl Dlq {
    pub fn new(config: &DlqConfig) -> Result<Self> {
        let policy = BackoffPolicy::new(
            Duration::from_millis(config.base_retry_delay_ms),
            Duration::from_millis(config.max_retry_delay_ms),
            config.max_attempts,
        )?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| OrderError::Messaging(format!("create dlq producer: {e}")))?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            policy,
        })
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts()
    }

    /// Drain any in-flight dead-letter publications. Called on shutdown.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|e| OrderError::Messaging(format!("flush dlq producer: {e}")))
    }

    /// Publish a dead-letter envelope for `source`. Degrades in three
    /// rungs: the full envelope, then a minimal fallback envelope when the
    /// full one cannot be marshaled or published, then a last-resort
    /// `DLQ_FALLOUT:{offset}` record so the offset stays observable even in
    /// catastrophic loss.
    pub async fn send(&self, source: &SourceMessage, error: &str, retry_count: u32) -> Result<()> {
        let envelope = DlqEnvelope::new(source, error, retry_count);

        match serde_json::to_vec(&envelope) {
            Ok(value) => match self.produce(&source.key, &value).await {
                Ok(()) => {
                    metrics::counter!(
                        metric::DLQ_MESSAGES_TOTAL,
                        "topic" => self.topic.clone(),
                        "original_topic" => source.topic.clone(),
                    )
                    .increment(1);
                    tracing::info!(
                        topic = %self.topic,
                        offset = source.offset,
                        retry_count,
                        "message sent to dlq"
                    );
                    return Ok(());
                }
                Err(err) => {
                    metrics::counter!(
                        metric::DLQ_ERRORS_TOTAL,
                        "topic" => self.topic.clone(),
                        "reason" => "write_failed",
                    )
                    .increment(1);
                    tracing::error!(
                        topic = %self.topic,
                        offset = source.offset,
                        error = %err,
                        "failed to send envelope to dlq, degrading to fallback"
                    );
                }
            },
            Err(marshal_err) => {
                tracing::error!(
                    error = %marshal_err,
                    original_offset = source.offset,
                    payload_base64 = %BASE64.encode(&source.payload),
                    payload_size = source.payload.len(),
                    "failed to marshal dlq envelope, degrading to fallback"
                );
            }
        }

        let fallback = json!({
            "error": "marshal_failed",
            "offset": source.offset,
            "size": source.payload.len(),
            "key_base64": BASE64.encode(&source.key),
            "partition": source.partition,
            "original_topic": source.topic,
        });
        match serde_json::to_vec(&fallback) {
            Ok(bytes) => {
                if self.produce(&source.key, &bytes).await.is_ok() {
                    tracing::warn!(offset = source.offset, "minimal dlq fallback sent");
                    return Ok(());
                }
            }
            Err(fallback_err) => {
                tracing::error!(
                    original_offset = source.offset,
                    original_size = source.payload.len(),
                    error = %fallback_err,
                    "failed to marshal even the fallback dlq envelope"
                );
            }
        }

        let fallout = format!("DLQ_FALLOUT:{}", source.offset).into_bytes();
        self.produce(&source.key, &fallout).await.map_err(|err| {
            metrics::counter!(
                metric::DLQ_ERRORS_TOTAL,
                "topic" => self.topic.clone(),
                "reason" => "fallout_failed",
            )
            .increment(1);
            OrderError::Messaging(format!("send dlq fallout record: {err}"))
        })
    }

    async fn produce(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(value);
        self.producer
            .send(record, Timeout::After(PRODUCE_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(err, _)| OrderError::Messaging(format!("send to dlq: {err}")))
    }
}

/// Drive `handler` with jittered-backoff retries up to the policy's attempt
/// budget. Each attempt is preceded by a cancellable sleep; the last error
/// is returned on exhaustion so the caller can dead-letter the message.
/// `offset` only labels the failure logs.
pub async fn process_with_retry<F, Fut>(
    offset: i64,
    policy: BackoffPolicy,
    shutdown: &mut watch::Receiver<bool>,
    handler: F,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_err = OrderError::Internal("handler never attempted".to_string());

    for attempt in 0..policy.max_attempts() {
        policy.sleep(attempt, shutdown).await?;

        match handler().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::error!(
                    offset,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    error = %err,
                    "message processing failed"
                );
                last_err = err;
            }
        }
    }

    Err(last_err)
}

use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tokio::sync::watch;
use tokio::time::{timeout, MissedTickBehavior};

use crate::config::DlqConfig;
use crate::errors::{OrderError, Result};
use crate::messaging::dlq::{Dlq, DlqEnvelope, SourceMessage};
use crate::models::Order;
use crate::service::OrderService;
use crate::store::OrderStore;

const READ_TIMEOUT: Duration = Duration::from_secs(30);
const HANDLE_TIMEOUT: Duration = Duration::from_secs(2);
const REPUBLISH_ATTEMPTS: u32 = 3;
const REPUBLISH_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Outcome of examining one DLQ message before any I/O happens.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayPlan {
    /// Undecodable envelope or payload, or the retry budget is spent.
    Drop(&'static str),
    Replay { envelope: DlqEnvelope, order: Order },
}

/// Decide what to do with a raw DLQ message value.
pub fn plan_replay(payload: &[u8], max_retry_count: u32) -> ReplayPlan {
    let envelope: DlqEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(_) => return ReplayPlan::Drop("undecodable_envelope"),
    };

    if envelope.metadata.retry_count >= max_retry_count {
        return ReplayPlan::Drop("retries_exhausted");
    }

    let order: Order = match serde_json::from_str(&envelope.payload) {
        Ok(order) => order,
        Err(_) => return ReplayPlan::Drop("undecodable_payload"),
    };

    ReplayPlan::Replay { envelope, order }
}

/// Periodically re-examines dead-lettered messages for recoverable
/// conditions: transient failures heal, already-persisted orders are
/// skipped, and everything else goes back to the DLQ with an incremented
/// retry count until the budget runs out.
pub struct DlqReprocessor<S> {
    consumer: StreamConsumer,
    dlq: Arc<Dlq>,
    service: OrderService<S>,
    max_retry_count: u32,
    poll_interval: Duration,
}

impl<S: OrderStore> DlqReprocessor<S> {
    pub fn new(config: &DlqConfig, dlq: Arc<Dlq>, service: OrderService<S>) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| OrderError::Messaging(format!("create dlq consumer: {e}")))?;

        consumer
            .fetch_metadata(Some(&config.topic), Duration::from_secs(5))
            .map_err(|e| OrderError::Messaging(format!("kafka metadata probe: {e}")))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| OrderError::Messaging(format!("subscribe to {}: {e}", config.topic)))?;

        Ok(Self {
            consumer,
            dlq,
            service,
            max_retry_count: config.max_retry_count,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        })
    }

    /// Tick until shutdown, draining one DLQ message per cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            max_retry_count = self.max_retry_count,
            "dlq reprocessor started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("dlq reprocessor shutting down");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => self.process_one().await,
            }
        }
    }

    async fn process_one(&self) {
        let message = match timeout(READ_TIMEOUT, self.consumer.recv()).await {
            Ok(Ok(message)) => message,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "read dlq message failed");
                return;
            }
            // Nothing waiting in the topic this cycle.
            Err(_) => return,
        };

        let offset = message.offset();
        let payload = message.payload().unwrap_or_default();

        let (envelope, order) = match plan_replay(payload, self.max_retry_count) {
            ReplayPlan::Drop(reason) => {
                tracing::info!(offset, reason, "dropping dlq message");
                self.commit(&message);
                return;
            }
            ReplayPlan::Replay { envelope, order } => (envelope, order),
        };

        if self.service.get_order(order.order_uid).await.is_ok() {
            tracing::info!(
                order_uid = %order.order_uid,
                offset,
                "order already exists, skipping"
            );
            self.commit(&message);
            return;
        }

        match timeout(HANDLE_TIMEOUT, self.service.create_order(&order)).await {
            Ok(Ok(_)) => {
                tracing::info!(
                    order_uid = %order.order_uid,
                    offset,
                    "dlq message processed successfully"
                );
            }
            Ok(Err(err)) => {
                self.republish(&message.key().unwrap_or_default().to_vec(), &envelope, &err)
                    .await;
            }
            Err(_) => {
                let err = OrderError::Timeout("dlq handle deadline exceeded".to_string());
                self.republish(&message.key().unwrap_or_default().to_vec(), &envelope, &err)
                    .await;
            }
        }

        self.commit(&message);
    }

    /// Put the message back on the DLQ with an incremented retry count. The
    /// republished envelope wraps the original payload, not the old
    /// envelope, so nesting never occurs. Publication itself is retried
    /// with a fixed, linearly growing backoff.
    async fn republish(&self, key: &[u8], envelope: &DlqEnvelope, err: &OrderError) {
        tracing::error!(
            offset = envelope.metadata.offset,
            retry_count = envelope.metadata.retry_count,
            error = %err,
            "dlq message retry failed"
        );

        let source = SourceMessage {
            topic: envelope.metadata.original_topic.clone(),
            partition: envelope.metadata.partition,
            offset: envelope.metadata.offset,
            key: key.to_vec(),
            payload: envelope.payload.clone().into_bytes(),
        };
        let next_retry_count = envelope.metadata.retry_count + 1;

        let mut send_err = None;
        for attempt in 1..=REPUBLISH_ATTEMPTS {
            match self.dlq.send(&source, &err.to_string(), next_retry_count).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(
                        retry = attempt,
                        error = %e,
                        "failed to republish to dlq, retrying"
                    );
                    send_err = Some(e);
                    tokio::time::sleep(REPUBLISH_BACKOFF_STEP * attempt).await;
                }
            }
        }

        if let Some(e) = send_err {
            tracing::error!(
                offset = envelope.metadata.offset,
                retry_count = next_retry_count,
                error = %e,
                "failed to republish to dlq after retries"
            );
        }
    }

    fn commit(&self, message: &rdkafka::message::BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            tracing::error!(offset = message.offset(), error = %err, "dlq commit failed");
        }
    }
}

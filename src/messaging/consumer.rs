use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tokio::sync::watch;

use crate::config::KafkaConfig;
use crate::errors::{OrderError, Result};
use crate::messaging::dlq::{process_with_retry, Dlq, SourceMessage};
use crate::metrics::names as metric;
use crate::models::Order;
use crate::service::OrderService;
use crate::store::OrderStore;

/// Ingest consumer: reads order messages, drives each through the writer
/// with bounded jittered retries, and dead-letters what cannot be
/// processed. Messages within a partition are handled sequentially in
/// offset order; the loop never dies because one message exhausted its
/// budget.
pub struct OrderConsumer<S> {
    consumer: StreamConsumer,
    dlq: Arc<Dlq>,
    service: OrderService<S>,
}

impl<S: OrderStore> OrderConsumer<S> {
    pub fn new(config: &KafkaConfig, dlq: Arc<Dlq>, service: OrderService<S>) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| OrderError::Messaging(format!("create consumer: {e}")))?;

        // Probe the brokers up front so a misconfigured cluster fails the
        // startup instead of the first message.
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
        })
    }

    /// Consume until shutdown. Read errors are logged and the loop
    /// continues; only cancellation ends it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!("order consumer started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("shutting down consumer");
                        return Ok(());
                    }
                }
                received = self.consumer.recv() => {
                    match received {
                        Ok(message) => {
                            let source = SourceMessage {
                                topic: message.topic().to_string(),
                                partition: message.partition(),
                                offset: message.offset(),
                                key: message.key().unwrap_or_default().to_vec(),
                                payload: message.payload().unwrap_or_default().to_vec(),
                            };
                            metrics::counter!(
                                metric::KAFKA_MESSAGES_PROCESSED_TOTAL,
                                "topic" => source.topic.clone(),
                                "partition" => source.partition.to_string(),
                            )
                            .increment(1);

                            self.process_message(&source, &mut shutdown).await;

                            if let Err(err) = self.consumer.commit_message(&message, CommitMode::Async) {
                                tracing::error!(offset = source.offset, error = %err, "commit failed");
                            }
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "kafka read failed");
                        }
                    }
                }
            }
        }
    }

    async fn process_message(&self, source: &SourceMessage, shutdown: &mut watch::Receiver<bool>) {
        tracing::info!(
            topic = %source.topic,
            partition = source.partition,
            offset = source.offset,
            "processing kafka message"
        );

        // A payload that does not decode will never decode; skip the retry
        // budget and dead-letter it immediately with the raw bytes intact.
        let order: Order = match serde_json::from_slice(&source.payload) {
            Ok(order) => order,
            Err(err) => {
                tracing::error!(offset = source.offset, error = %err, "undecodable order payload");
                self.dead_letter(source, &format!("unmarshal order: {err}"), 0)
                    .await;
                return;
            }
        };

        let offset = source.offset;
        let result = process_with_retry(offset, self.dlq.policy(), shutdown, || {
            let order = order.clone();
            async move {
                self.service.create_order(&order).await?;
                tracing::info!(
                    order_uid = %order.order_uid,
                    offset,
                    "order saved from kafka"
                );
                Ok(())
            }
        })
        .await;

        if let Err(err) = result {
            if err == OrderError::Cancelled {
                return;
            }
            self.dead_letter(source, &err.to_string(), self.dlq.max_attempts())
                .await;
        }
    }

    async fn dead_letter(&self, source: &SourceMessage, error: &str, retry_count: u32) {
        if let Err(dlq_err) = self.dlq.send(source, error, retry_count).await {
            tracing::error!(
                offset = source.offset,
                original_error = %error,
                dlq_error = %dlq_err,
                "critical: failed to send to dlq after retries"
            );
        } else {
            tracing::info!(
                offset = source.offset,
                retry_count,
                "message sent to dlq after max retries"
            );
        }
        metrics::counter!(
            metric::KAFKA_MESSAGES_FAILED_TOTAL,
            "topic" => source.topic.clone(),
            "partition" => source.partition.to_string(),
            "reason" => "retry_limit_exceeded",
        )
        .increment(1);
    }
}

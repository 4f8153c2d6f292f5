//! Kafka consumer for conversion work items
//!
//! One long-lived consumer loop per worker process; each message is
//! handled to completion before the next is taken, so a single process
//! never holds more than one in-flight conversion. Scaling out means
//! running more worker processes in the same consumer group.

use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::kafka::{AckMode, WorkItem};
use crate::services::convert::ConvertWorker;

/// Kafka consumer configuration
#[derive(Clone, Debug)]
pub struct ConvertConsumerConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub ack_mode: AckMode,
}

/// Kafka consumer driving the conversion worker
pub struct ConvertConsumer {
    consumer: StreamConsumer,
    worker: Arc<ConvertWorker>,
    ack_mode: AckMode,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConvertConsumer {
    pub fn new(
        config: &ConvertConsumerConfig,
        worker: Arc<ConvertWorker>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            // Offsets are committed explicitly according to the ack mode.
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(|e| AppError::Dispatch(format!("failed to create Kafka consumer: {e}")))?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| AppError::Dispatch(format!("failed to subscribe to topic: {e}")))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            ack_mode = config.ack_mode.as_str(),
            "convert consumer initialized"
        );

        Ok(Self {
            consumer,
            worker,
            ack_mode: config.ack_mode,
            shutdown_rx,
        })
    }

    /// Run the consumer loop until shutdown is signalled.
    pub async fn run(&mut self) -> Result<()> {
        info!("starting convert consumer loop");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = self.consumer.recv() => {
                    match message {
                        Ok(msg) => self.process_message(&msg).await,
                        Err(e) => {
                            error!(error = %e, "Kafka consumer error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        info!("convert consumer stopped");
        Ok(())
    }

    async fn process_message(&self, msg: &BorrowedMessage<'_>) {
        if self.ack_mode == AckMode::OnDelivery {
            self.commit(msg);
        }

        let payload = match msg.payload() {
            Some(p) => p,
            None => {
                debug!("empty message payload, skipping");
                self.commit_after_processing(msg);
                return;
            }
        };

        let item: WorkItem = match serde_json::from_slice(payload) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "failed to parse work item, skipping");
                self.commit_after_processing(msg);
                return;
            }
        };

        let started = Instant::now();
        match self.worker.handle(&item).await {
            Ok(()) => {
                info!(
                    request_id = %item.request_id,
                    file_name = %item.file_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "work item processed"
                );
            }
            Err(e) => {
                // Terminal for this item: logged and dropped, no retry or
                // dead-letter routing. The request stays queued/processing.
                error!(
                    request_id = %item.request_id,
                    file_name = %item.file_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "failed to process work item"
                );
            }
        }

        self.commit_after_processing(msg);
    }

    fn commit_after_processing(&self, msg: &BorrowedMessage<'_>) {
        if self.ack_mode == AckMode::AfterProcessing {
            self.commit(msg);
        }
    }

    fn commit(&self, msg: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(msg, CommitMode::Async) {
            warn!(error = %e, "failed to commit Kafka offset");
        }
    }
}

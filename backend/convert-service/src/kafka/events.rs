/// Work-item message and the Kafka producer that publishes it.
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::kafka::JobPublisher;

/// The message carried on the dispatch channel. Deliberately minimal:
/// everything else is re-fetched from the database by `request_id`, so a
/// worker never acts on a stale snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub request_id: Uuid,
    pub file_name: String,
}

/// Kafka producer for conversion work items.
#[derive(Clone)]
pub struct ConvertJobProducer {
    inner: Arc<FutureProducer>,
    topic: String,
}

impl ConvertJobProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| {
                AppError::Dispatch(format!("failed to create Kafka producer for '{topic}': {e}"))
            })?;

        Ok(Self {
            inner: Arc::new(producer),
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl JobPublisher for ConvertJobProducer {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        let key = item.request_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        self.inner
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(err, _)| {
                AppError::Dispatch(format!("failed to publish work item: {err}"))
            })?;

        Ok(())
    }
}

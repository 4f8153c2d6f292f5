/// Kafka integration: work-item producer and the worker-side consumer.
use async_trait::async_trait;

use crate::error::Result;

pub mod consumer;
pub mod events;

pub use consumer::{ConvertConsumer, ConvertConsumerConfig};
pub use events::{ConvertJobProducer, WorkItem};

/// Offset acknowledgement policy for the worker consumer.
///
/// `AfterProcessing` commits the offset once the handler returns
/// (at-least-once: a crash mid-conversion redelivers the work item, and
/// the worker's status guard makes re-processing idempotent).
/// `OnDelivery` commits as soon as the message arrives (at-most-once: a
/// crash mid-conversion loses the job and the request stays queued).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    AfterProcessing,
    OnDelivery,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterProcessing => "after-processing",
            Self::OnDelivery => "on-delivery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "after-processing" => Some(Self::AfterProcessing),
            "on-delivery" => Some(Self::OnDelivery),
            _ => None,
        }
    }
}

/// Producer side of the dispatch channel. Publish is fire-and-forget from
/// the caller's perspective; failures surface as `Dispatch` errors.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, item: &WorkItem) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_mode_round_trip() {
        for mode in [AckMode::AfterProcessing, AckMode::OnDelivery] {
            assert_eq!(AckMode::from_str(mode.as_str()), Some(mode));
        }
        assert_eq!(AckMode::from_str("exactly-once"), None);
    }
}

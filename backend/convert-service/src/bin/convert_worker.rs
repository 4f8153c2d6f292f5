//! Convert Worker - Kafka consumer performing image conversions
//!
//! Consumes work items published by the API, downloads the original from
//! object storage, scales and re-encodes it, uploads the result, and
//! commits the processed image + status transition in one transaction.
//!
//! Environment variables:
//! - DATABASE_URL: PostgreSQL URL
//! - KAFKA_BROKERS: Kafka broker addresses
//! - KAFKA_JOBS_TOPIC: Topic to consume (default: "convert.jobs")
//! - KAFKA_GROUP_ID: Consumer group ID (default: "convert-worker")
//! - KAFKA_ACK_MODE: "after-processing" (at-least-once, default) or
//!   "on-delivery" (at-most-once)
//! - S3_BUCKET / AWS_REGION / S3_ENDPOINT: object storage
//! - CONVERT_JPEG_QUALITY: JPEG quality 0-100 (default: 85)

use convert_service::db::PgConvertRepo;
use convert_service::kafka::{ConvertConsumer, ConvertConsumerConfig};
use convert_service::services::{ConvertWorker, ImageProcessor, ImageProcessorConfig};
use convert_service::storage::S3Storage;
use convert_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("convert_worker=info".parse().expect("valid directive"))
                .add_directive("convert_service=info".parse().expect("valid directive")),
        )
        .init();

    info!("starting convert worker");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    info!(
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.jobs_topic,
        ack_mode = config.kafka.ack_mode.as_str(),
        bucket = %config.s3.bucket,
        "configuration loaded"
    );

    // Database pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| format!("failed to connect to database: {e}"))?;

    // Object storage
    let storage = S3Storage::from_config(&config.s3)
        .await
        .map_err(|e| format!("{e}"))?;
    storage.health_check().await.map_err(|e| format!("{e}"))?;

    let worker = Arc::new(ConvertWorker::new(
        Arc::new(PgConvertRepo::new(db_pool)),
        Arc::new(storage),
        Arc::new(ImageProcessor::new(ImageProcessorConfig {
            jpeg_quality: config.convert.jpeg_quality,
        })),
    ));
    info!("convert worker initialized");

    // Setup shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // Create Kafka consumer
    let consumer_config = ConvertConsumerConfig {
        brokers: config.kafka.brokers.clone(),
        topic: config.kafka.jobs_topic.clone(),
        group_id: config.kafka.group_id.clone(),
        ack_mode: config.kafka.ack_mode,
    };
    let mut consumer = ConvertConsumer::new(&consumer_config, worker, shutdown_rx)
        .map_err(|e| format!("{e}"))?;

    // Run the consumer loop (blocks until shutdown)
    if let Err(e) = consumer.run().await {
        error!(error = %e, "consumer error");
    }

    info!("convert worker stopped");
    Ok(())
}

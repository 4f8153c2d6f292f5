/// Configuration management for convert-service
///
/// Loads configuration from environment variables with sensible defaults.
use crate::kafka::AckMode;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub convert: ConvertConfig,
    pub auth: AuthConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct KafkaConfig {
    pub brokers: String,
    pub jobs_topic: String,
    pub group_id: String,
    pub ack_mode: AckMode,
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ConvertConfig {
    pub jpeg_quality: u8,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let ack_mode = std::env::var("KAFKA_ACK_MODE")
            .unwrap_or_else(|_| "after-processing".to_string());
        let ack_mode = AckMode::from_str(&ack_mode)
            .ok_or_else(|| format!("invalid KAFKA_ACK_MODE: {ack_mode}"))?;

        Ok(Config {
            app: AppConfig {
                host: std::env::var("CONVERT_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("CONVERT_SERVICE_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/convert".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                jobs_topic: std::env::var("KAFKA_JOBS_TOPIC")
                    .unwrap_or_else(|_| "convert.jobs".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "convert-worker".to_string()),
                ack_mode,
            },
            s3: S3Config {
                bucket: std::env::var("S3_BUCKET")
                    .unwrap_or_else(|_| "convert-images".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            convert: ConvertConfig {
                jpeg_quality: std::env::var("CONVERT_JPEG_QUALITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(85),
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET").ok(),
            },
        })
    }
}

/// S3-backed image storage
///
/// Works against AWS S3 or any S3-compatible store (MinIO) via the
/// optional endpoint override.
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::S3Config;
use crate::error::{AppError, Result};
use crate::storage::{object_key, Storage};

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Initialize an S3 client with credentials from config.
    ///
    /// Falls back to the default credential chain when no explicit keys
    /// are provided. A custom endpoint switches to S3-compatible storage
    /// like MinIO.
    pub async fn from_config(config: &S3Config) -> Result<Self> {
        use aws_sdk_s3::config::Region;

        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            use aws_sdk_s3::config::Credentials;

            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "convert_service_s3",
            );

            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;

        Ok(Self::new(Client::new(&aws_config), config.bucket.clone()))
    }

    /// Health check for S3 connectivity and bucket access.
    ///
    /// The pipeline depends entirely on object storage; if this fails the
    /// process should not start.
    pub async fn health_check(&self) -> Result<()> {
        match self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, "S3 connection validated");
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!(
                "S3 health check failed for bucket {}: {e}",
                self.bucket
            ))),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn get_file(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 get failed for {key}: {e}")))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("failed to read S3 object body: {e}")))?;

        Ok(body.into_bytes())
    }

    async fn upload_file(
        &self,
        user_id: Uuid,
        file_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String> {
        let key = object_key(user_id, file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                let error_msg = e.to_string();
                if error_msg.contains("NoSuchBucket") {
                    AppError::Storage(format!("S3 bucket not found: {}", self.bucket))
                } else {
                    AppError::Storage(format!("S3 upload failed: {e}"))
                }
            })?;

        Ok(key)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed for {key}: {e}")))?;

        Ok(())
    }
}

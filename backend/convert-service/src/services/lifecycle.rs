//! Request lifecycle - submission, reads, and deletion
//!
//! Submission is a single "enqueue" step from the caller's point of view:
//! validate, upload the original, insert both rows in one transaction,
//! publish the work item. Nothing is published unless the rows landed.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{ConvertRepo, NewImageRecord};
use crate::error::{AppError, Result};
use crate::kafka::{JobPublisher, WorkItem};
use crate::models::{ConvertRequest, ImageFormat};
use crate::storage::{file_extension, Storage};

pub struct RequestService {
    repo: Arc<dyn ConvertRepo>,
    storage: Arc<dyn Storage>,
    publisher: Arc<dyn JobPublisher>,
}

impl RequestService {
    pub fn new(
        repo: Arc<dyn ConvertRepo>,
        storage: Arc<dyn Storage>,
        publisher: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            repo,
            storage,
            publisher,
        }
    }

    /// Accept a conversion job: validate, persist the original image and a
    /// queued request, and dispatch a work item.
    ///
    /// A publish failure is surfaced to the caller; the request stays
    /// `queued` with no worker notified. Publishing before the rows exist
    /// would be worse: a worker would race a request that is not there.
    pub async fn submit(
        &self,
        user_id: Uuid,
        file_name: &str,
        data: Bytes,
        ratio: f64,
        target_format: ImageFormat,
    ) -> Result<ConvertRequest> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(AppError::Validation(format!(
                "ratio must be in (0, 1], got {ratio}"
            )));
        }

        let ext = file_extension(file_name).ok_or_else(|| {
            AppError::Validation(format!("file name has no extension: {file_name}"))
        })?;

        let original_format = ImageFormat::from_name(&ext).ok_or_else(|| {
            AppError::Validation(format!("unsupported image type: {ext}"))
        })?;

        let storage_key = self
            .storage
            .upload_file(user_id, file_name, data, original_format.content_type())
            .await?;

        let request = self
            .repo
            .create_request(
                user_id,
                NewImageRecord {
                    format: original_format,
                    storage_key,
                },
                ratio,
                original_format,
                target_format,
            )
            .await?;

        self.publisher
            .publish(&WorkItem {
                request_id: request.id,
                file_name: file_name.to_string(),
            })
            .await?;

        info!(
            request_id = %request.id,
            user_id = %user_id,
            ratio,
            target = target_format.as_str(),
            "conversion request queued"
        );

        Ok(request)
    }

    pub async fn get(&self, user_id: Uuid, request_id: Uuid) -> Result<ConvertRequest> {
        self.repo
            .get_request(user_id, request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("request not found: {request_id}")))
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ConvertRequest>> {
        self.repo.list_requests(user_id).await
    }

    /// Remove a request: database rows first (one transaction), then the
    /// storage objects. Storage deletes are best-effort; a leftover blob
    /// is reclaimable by a sweep, while a row pointing at a deleted blob
    /// would be user-visible corruption.
    pub async fn delete(&self, user_id: Uuid, request_id: Uuid) -> Result<()> {
        let deleted = self.repo.delete_request(user_id, request_id).await?;

        let mut keys = vec![deleted.original_key];
        keys.extend(deleted.processed_key);

        for key in &keys {
            if let Err(e) = self.storage.delete_file(key).await {
                warn!(key = %key, error = %e, "failed to delete storage object, leaving orphan");
            }
        }

        info!(request_id = %request_id, user_id = %user_id, "conversion request deleted");

        Ok(())
    }
}

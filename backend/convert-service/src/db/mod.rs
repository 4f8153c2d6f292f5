/// Database access layer
///
/// This module provides:
/// - The `ConvertRepo` capability consumed by the lifecycle and worker
/// - The PostgreSQL implementation, including the transactional
///   conversion commit
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ConversionContext, ConvertRequest, ImageFormat, RequestStatus};

pub mod request_repo;

pub use request_repo::PgConvertRepo;

/// A new image row about to be inserted (id is repository-assigned).
#[derive(Debug, Clone)]
pub struct NewImageRecord {
    pub format: ImageFormat,
    pub storage_key: String,
}

/// Storage keys released by deleting a request.
#[derive(Debug, Clone)]
pub struct DeletedRequest {
    pub original_key: String,
    pub processed_key: Option<String>,
}

/// Repository over conversion requests and their images.
#[async_trait]
pub trait ConvertRepo: Send + Sync {
    /// Insert the original image row and the `queued` request row in one
    /// transaction. Either both land or neither does.
    async fn create_request(
        &self,
        user_id: Uuid,
        image: NewImageRecord,
        ratio: f64,
        original_format: ImageFormat,
        target_format: ImageFormat,
    ) -> Result<ConvertRequest>;

    async fn get_request(&self, user_id: Uuid, request_id: Uuid)
        -> Result<Option<ConvertRequest>>;

    async fn list_requests(&self, user_id: Uuid) -> Result<Vec<ConvertRequest>>;

    /// Joined view of a request and its original image.
    async fn conversion_context(&self, request_id: Uuid) -> Result<Option<ConversionContext>>;

    /// Back-fill the decoded resolution on an image row. Committed
    /// immediately, independent of the final conversion transaction.
    async fn set_image_resolution(&self, image_id: Uuid, width: i32, height: i32) -> Result<()>;

    /// Move a request through the status state machine.
    async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<()>;

    /// Commit a finished conversion in one transaction: insert the
    /// processed image, set its resolution, link it to the request, and
    /// stamp completion time and status. Every step must affect exactly
    /// one row or the whole transaction rolls back.
    async fn commit_conversion(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        image: NewImageRecord,
        width: i32,
        height: i32,
        status: RequestStatus,
        completion_time: DateTime<Utc>,
    ) -> Result<Uuid>;

    /// Delete a request and its image rows, returning the storage keys
    /// they referenced. The processed key is absent when the conversion
    /// never completed.
    async fn delete_request(&self, user_id: Uuid, request_id: Uuid) -> Result<DeletedRequest>;
}

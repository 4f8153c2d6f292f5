//! Conversion worker - turns a work item into a committed result
//!
//! The complete workflow per delivered work item:
//! 1. Load the conversion context (request + original image)
//! 2. Download the original from storage and decode it
//! 3. Back-fill the original's resolution
//! 4. Scale and re-encode
//! 5. Upload the result
//! 6. Commit the processed image + status transition in one transaction

use image::GenericImageView;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{ConvertRepo, NewImageRecord};
use crate::error::{AppError, Result};
use crate::kafka::WorkItem;
use crate::models::RequestStatus;
use crate::services::convert::ImageProcessor;
use crate::storage::Storage;

pub struct ConvertWorker {
    repo: Arc<dyn ConvertRepo>,
    storage: Arc<dyn Storage>,
    processor: Arc<ImageProcessor>,
}

impl ConvertWorker {
    pub fn new(
        repo: Arc<dyn ConvertRepo>,
        storage: Arc<dyn Storage>,
        processor: Arc<ImageProcessor>,
    ) -> Self {
        Self {
            repo,
            storage,
            processor,
        }
    }

    /// Process one work item. Errors are terminal for the item: the
    /// consumer loop logs them and moves on, it never retries here.
    pub async fn handle(&self, item: &WorkItem) -> Result<()> {
        let ctx = self
            .repo
            .conversion_context(item.request_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("request not found: {}", item.request_id))
            })?;

        // Redelivered item for a finished request (at-least-once ack
        // mode): nothing to redo.
        if ctx.status == RequestStatus::Done {
            info!(request_id = %ctx.request_id, "request already done, skipping");
            return Ok(());
        }

        self.repo
            .set_request_status(ctx.request_id, RequestStatus::Processing)
            .await?;

        let original = self.storage.get_file(&ctx.original_key).await?;

        let img = self
            .processor
            .clone()
            .decode_async(original, ctx.original_format)
            .await?;

        let (width, height) = img.dimensions();
        debug!(
            request_id = %ctx.request_id,
            width,
            height,
            "original decoded"
        );

        // Independent immediate write: survives a crash before the final
        // commit, which is fine for diagnostic metadata.
        self.repo
            .set_image_resolution(ctx.original_image_id, width as i32, height as i32)
            .await?;

        let out = self
            .processor
            .clone()
            .process_async(img, ctx.ratio, ctx.target_format)
            .await?;

        let file_name = format!("{}.{}", ctx.request_id, ctx.target_format.extension());
        let processed_key = self
            .storage
            .upload_file(
                ctx.user_id,
                &file_name,
                out.data,
                ctx.target_format.content_type(),
            )
            .await?;

        self.repo
            .commit_conversion(
                ctx.user_id,
                ctx.request_id,
                NewImageRecord {
                    format: ctx.target_format,
                    storage_key: processed_key,
                },
                out.width as i32,
                out.height as i32,
                RequestStatus::Done,
                chrono::Utc::now(),
            )
            .await?;

        info!(
            request_id = %ctx.request_id,
            width = out.width,
            height = out.height,
            target = ctx.target_format.as_str(),
            "conversion committed"
        );

        Ok(())
    }
}

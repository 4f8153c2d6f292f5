/// PostgreSQL implementation of the request repository
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{ConvertRepo, DeletedRequest, NewImageRecord};
use crate::error::{AppError, Result};
use crate::models::{ConversionContext, ConvertRequest, ImageFormat, RequestStatus};

const REQUEST_COLUMNS: &str = "id, user_id, status, request_time, completion_time, \
     original_image_id, processed_image_id, ratio, original_format, target_format";

pub struct PgConvertRepo {
    pool: PgPool,
}

impl PgConvertRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Guard for the conversion-commit sub-steps: anything other than exactly
/// one affected row means the request or image vanished mid-flight, and
/// the transaction must not land.
fn single_row(rows_affected: u64, step: &str) -> Result<()> {
    if rows_affected != 1 {
        return Err(AppError::Consistency(format!(
            "{step} affected {rows_affected} rows, expected 1"
        )));
    }
    Ok(())
}

async fn insert_image(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    image: &NewImageRecord,
) -> Result<Uuid> {
    let image_id: Uuid = sqlx::query_scalar(
        "INSERT INTO images (user_id, format, storage_key) \
         VALUES ($1, $2, $3) \
         RETURNING id",
    )
    .bind(user_id)
    .bind(image.format)
    .bind(&image.storage_key)
    .fetch_one(tx.as_mut())
    .await?;

    Ok(image_id)
}

#[async_trait]
impl ConvertRepo for PgConvertRepo {
    async fn create_request(
        &self,
        user_id: Uuid,
        image: NewImageRecord,
        ratio: f64,
        original_format: ImageFormat,
        target_format: ImageFormat,
    ) -> Result<ConvertRequest> {
        let mut tx = self.pool.begin().await?;

        let image_id = insert_image(&mut tx, user_id, &image).await?;

        let request = sqlx::query_as::<_, ConvertRequest>(&format!(
            "INSERT INTO requests \
                 (user_id, status, original_image_id, ratio, original_format, target_format) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(user_id)
        .bind(RequestStatus::Queued)
        .bind(image_id)
        .bind(ratio)
        .bind(original_format)
        .bind(target_format)
        .fetch_one(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(request)
    }

    async fn get_request(
        &self,
        user_id: Uuid,
        request_id: Uuid,
    ) -> Result<Option<ConvertRequest>> {
        let request = sqlx::query_as::<_, ConvertRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 AND user_id = $2"
        ))
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn list_requests(&self, user_id: Uuid) -> Result<Vec<ConvertRequest>> {
        let requests = sqlx::query_as::<_, ConvertRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM requests \
             WHERE user_id = $1 \
             ORDER BY request_time DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn conversion_context(&self, request_id: Uuid) -> Result<Option<ConversionContext>> {
        let context = sqlx::query_as::<_, ConversionContext>(
            "SELECT r.id AS request_id, r.user_id, r.status, \
                    i.id AS original_image_id, i.storage_key AS original_key, \
                    r.original_format, r.target_format, r.ratio \
             FROM requests r \
             JOIN images i ON i.id = r.original_image_id \
             WHERE r.id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(context)
    }

    async fn set_image_resolution(&self, image_id: Uuid, width: i32, height: i32) -> Result<()> {
        let result = sqlx::query("UPDATE images SET width = $2, height = $3 WHERE id = $1")
            .bind(image_id)
            .bind(width)
            .bind(height)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("image not found: {image_id}")));
        }
        Ok(())
    }

    async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<()> {
        let result = sqlx::query("UPDATE requests SET status = $2 WHERE id = $1")
            .bind(request_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "request not found: {request_id}"
            )));
        }
        Ok(())
    }

    async fn commit_conversion(
        &self,
        user_id: Uuid,
        request_id: Uuid,
        image: NewImageRecord,
        width: i32,
        height: i32,
        status: RequestStatus,
        completion_time: DateTime<Utc>,
    ) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let image_id = insert_image(&mut tx, user_id, &image).await?;

        let result = sqlx::query("UPDATE images SET width = $2, height = $3 WHERE id = $1")
            .bind(image_id)
            .bind(width)
            .bind(height)
            .execute(tx.as_mut())
            .await?;
        single_row(result.rows_affected(), "set processed resolution")?;

        let result = sqlx::query(
            "UPDATE requests SET processed_image_id = $2 WHERE id = $1 AND user_id = $3",
        )
        .bind(request_id)
        .bind(image_id)
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;
        single_row(result.rows_affected(), "link processed image")?;

        let result = sqlx::query("UPDATE requests SET completion_time = $2 WHERE id = $1")
            .bind(request_id)
            .bind(completion_time)
            .execute(tx.as_mut())
            .await?;
        single_row(result.rows_affected(), "set completion time")?;

        let result = sqlx::query("UPDATE requests SET status = $2 WHERE id = $1")
            .bind(request_id)
            .bind(status)
            .execute(tx.as_mut())
            .await?;
        single_row(result.rows_affected(), "set status")?;

        tx.commit().await?;

        Ok(image_id)
    }

    async fn delete_request(&self, user_id: Uuid, request_id: Uuid) -> Result<DeletedRequest> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(
            "DELETE FROM requests WHERE id = $1 AND user_id = $2 \
             RETURNING original_image_id, processed_image_id",
        )
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(tx.as_mut())
        .await?;

        let (original_image_id, processed_image_id) = row.ok_or_else(|| {
            AppError::NotFound(format!("request not found: {request_id}"))
        })?;

        let original_key: String =
            sqlx::query_scalar("DELETE FROM images WHERE id = $1 RETURNING storage_key")
                .bind(original_image_id)
                .fetch_optional(tx.as_mut())
                .await?
                .ok_or_else(|| {
                    AppError::Consistency(format!(
                        "original image row missing for request {request_id}"
                    ))
                })?;

        let processed_key: Option<String> = match processed_image_id {
            Some(image_id) => {
                sqlx::query_scalar("DELETE FROM images WHERE id = $1 RETURNING storage_key")
                    .bind(image_id)
                    .fetch_optional(tx.as_mut())
                    .await?
            }
            None => None,
        };

        tx.commit().await?;

        Ok(DeletedRequest {
            original_key,
            processed_key,
        })
    }
}

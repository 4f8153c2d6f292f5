/// Request handlers - HTTP endpoints for conversion requests
use actix_multipart::form::{bytes::Bytes as UploadedFile, text::Text, MultipartForm};
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{ImageFormat, RequestResponse};
use crate::services::RequestService;

/// Multipart submission payload: the image plus its conversion parameters.
#[derive(MultipartForm)]
pub struct SubmitForm {
    #[multipart(limit = "25MB")]
    pub file: UploadedFile,
    pub ratio: Text<f64>,
    pub target_format: Text<String>,
}

/// Submit a conversion request
pub async fn submit_request(
    service: web::Data<Arc<RequestService>>,
    user_id: UserId,
    MultipartForm(form): MultipartForm<SubmitForm>,
) -> Result<HttpResponse> {
    let file_name = form
        .file
        .file_name
        .as_deref()
        .ok_or_else(|| AppError::Validation("file name is required".to_string()))?
        .to_string();

    let target_format = ImageFormat::from_name(&form.target_format).ok_or_else(|| {
        AppError::Validation(format!("unsupported target format: {}", *form.target_format))
    })?;

    let request = service
        .submit(
            user_id.0,
            &file_name,
            form.file.data,
            *form.ratio,
            target_format,
        )
        .await?;

    Ok(HttpResponse::Created().json(RequestResponse::from(request)))
}

/// Get a single request (status polling)
pub async fn get_request(
    service: web::Data<Arc<RequestService>>,
    user_id: UserId,
    request_id: web::Path<String>,
) -> Result<HttpResponse> {
    let request_id = parse_request_id(&request_id)?;

    let request = service.get(user_id.0, request_id).await?;

    Ok(HttpResponse::Ok().json(RequestResponse::from(request)))
}

/// List the caller's requests
pub async fn list_requests(
    service: web::Data<Arc<RequestService>>,
    user_id: UserId,
) -> Result<HttpResponse> {
    let requests = service.list(user_id.0).await?;

    let responses: Vec<RequestResponse> =
        requests.into_iter().map(RequestResponse::from).collect();

    Ok(HttpResponse::Ok().json(responses))
}

/// Delete a request and its stored images
pub async fn delete_request(
    service: web::Data<Arc<RequestService>>,
    user_id: UserId,
    request_id: web::Path<String>,
) -> Result<HttpResponse> {
    let request_id = parse_request_id(&request_id)?;

    service.delete(user_id.0, request_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

fn parse_request_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("invalid request ID: {raw}")))
}

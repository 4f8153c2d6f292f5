/// Data models for convert-service
///
/// This module defines structures for:
/// - ConvertRequest: one conversion job and its status state machine
/// - ImageRecord: one stored blob (original or processed)
/// - ConversionContext: the joined view the worker operates on
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ========================================
// Status & format value types
// ========================================

/// Request status state machine: queued -> processing -> done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing,
    Done,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

/// Supported image formats. Anything outside this list is rejected at
/// submission time, and the database enum rejects it at the boundary too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "image_format", rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// Parse a format name or file extension ("jpg" is accepted as an
    /// alias for "jpeg").
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Canonical file extension for generated object keys.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }
}

// ========================================
// Entities
// ========================================

/// Conversion request database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConvertRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: RequestStatus,
    pub request_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub original_image_id: Uuid,
    pub processed_image_id: Option<Uuid>,
    pub ratio: f64,
    pub original_format: ImageFormat,
    pub target_format: ImageFormat,
}

/// Stored image database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub format: ImageFormat,
    pub storage_key: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Joined view of a request and its original image, everything the worker
/// needs to perform a conversion. Re-fetched per work item so the worker
/// always acts on the latest persisted state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversionContext {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub status: RequestStatus,
    pub original_image_id: Uuid,
    pub original_key: String,
    pub original_format: ImageFormat,
    pub target_format: ImageFormat,
    pub ratio: f64,
}

// ========================================
// DTOs
// ========================================

/// Request response DTO for the HTTP layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResponse {
    pub id: String,
    pub status: String,
    pub request_time: i64,
    pub completion_time: Option<i64>,
    pub processed_image_id: Option<String>,
    pub ratio: f64,
    pub original_format: String,
    pub target_format: String,
}

impl From<ConvertRequest> for RequestResponse {
    fn from(request: ConvertRequest) -> Self {
        Self {
            id: request.id.to_string(),
            status: request.status.as_str().to_string(),
            request_time: request.request_time.timestamp(),
            completion_time: request.completion_time.map(|dt| dt.timestamp()),
            processed_image_id: request.processed_image_id.map(|id| id.to_string()),
            ratio: request.ratio,
            original_format: request.original_format.as_str().to_string(),
            target_format: request.target_format.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            RequestStatus::Queued,
            RequestStatus::Processing,
            RequestStatus::Done,
        ] {
            assert_eq!(RequestStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::from_str("failed"), None);
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(ImageFormat::from_name("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_name("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_name("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_name("gif"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_name("bmp"), None);
        assert_eq!(ImageFormat::from_name(""), None);
    }

    #[test]
    fn test_format_content_type() {
        assert_eq!(ImageFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
    }
}

//! End-to-end pipeline tests over in-memory capability implementations.
//!
//! The lifecycle service and the worker are exercised against mock
//! storage, repository, and publisher, checking the state machine and the
//! side-effect counts the pipeline guarantees.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use convert_service::db::{ConvertRepo, DeletedRequest, NewImageRecord};
use convert_service::error::{AppError, Result};
use convert_service::kafka::{JobPublisher, WorkItem};
use convert_service::models::{
    ConversionContext, ConvertRequest, ImageFormat, ImageRecord, RequestStatus,
};
use convert_service::services::{ConvertWorker, ImageProcessor, RequestService};
use convert_service::storage::Storage;

// ========================================
// In-memory capability implementations
// ========================================

#[derive(Default)]
struct MemStore {
    requests: HashMap<Uuid, ConvertRequest>,
    images: HashMap<Uuid, ImageRecord>,
}

#[derive(Default)]
struct MemRepo {
    store: Mutex<MemStore>,
}

impl MemRepo {
    fn request(&self, id: Uuid) -> Option<ConvertRequest> {
        self.store.lock().unwrap().requests.get(&id).cloned()
    }

    fn image(&self, id: Uuid) -> Option<ImageRecord> {
        self.store.lock().unwrap().images.get(&id).cloned()
    }

    fn request_count(&self) -> usize {
        self.store.lock().unwrap().requests.len()
    }

    fn image_count(&self) -> usize {
        self.store.lock().unwrap().images.len()
    }
}

fn new_image_row(user_id: Uuid, image: NewImageRecord) -> ImageRecord {
    ImageRecord {
        id: Uuid::new_v4(),
        user_id,
        format: image.format,
        storage_key: image.storage_key,
        width: None,
        height: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ConvertRepo for MemRepo {
    async fn create_request(
        &self,
        user_id: Uuid,
        image: NewImageRecord,
        ratio: f64,
        original_format: ImageFormat,
        target_format: ImageFormat,
    ) -> Result<ConvertRequest> {
        let mut store = self.store.lock().unwrap();

        let image_row = new_image_row(user_id, image);
        let request = ConvertRequest {
            id: Uuid::new_v4(),
            user_id,
            status: RequestStatus::Queued,
            request_time: Utc::now(),
            completion_time: None,
            original_image_id: image_row.id,
            processed_image_id: None,
            ratio,
            original_format,
            target_format,
        };

        store.images.insert(image_row.id, image_row);
        store.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(
        &self,
        user_id: Uuid,
        request_id: Uuid,
    ) -> Result<Option<ConvertRequest>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .requests
            .get(&request_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn list_requests(&self, user_id: Uuid) -> Result<Vec<ConvertRequest>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn conversion_context(&self, request_id: Uuid) -> Result<Option<ConversionContext>> {
        let store = self.store.lock().unwrap();
        let Some(request) = store.requests.get(&request_id) else {
            return Ok(None);
        };
        let Some(image) = store.images.get(&request.original_image_id) else {
            return Ok(None);
        };
        Ok(Some(ConversionContext {
            request_id: request.id,
            user_id: request.user_id,
            status: request.status,
            original_image_id: image.id,
            original_key: image.storage_key.clone(),
            original_format: request.original_format,
            target_format: request.target_format,
            ratio: request.ratio,
        }))
    }

    async fn set_image_resolution(&self, image_id: Uuid, width: i32, height: i32) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let image = store
            .images
            .get_mut(&image_id)
            .ok_or_else(|| AppError::NotFound(format!("image not found: {image_id}")))?;
        image.width = Some(width);
        image.height = Some(height);
        Ok(())
    }

    async fn set_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let request = store
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request not found: {request_id}")))?;
        request.status = status;
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
        let mut store = self.store.lock().unwrap();

        // All-or-nothing: no image row lands when the request is gone.
        if !store
            .requests
            .get(&request_id)
            .map(|r| r.user_id == user_id)
            .unwrap_or(false)
        {
            return Err(AppError::Consistency(
                "link processed image affected 0 rows, expected 1".to_string(),
            ));
        }

        let mut image_row = new_image_row(user_id, image);
        image_row.width = Some(width);
        image_row.height = Some(height);
        let image_id = image_row.id;
        store.images.insert(image_id, image_row);

        let request = store.requests.get_mut(&request_id).unwrap();
        request.processed_image_id = Some(image_id);
        request.completion_time = Some(completion_time);
        request.status = status;

        Ok(image_id)
    }

    async fn delete_request(&self, user_id: Uuid, request_id: Uuid) -> Result<DeletedRequest> {
        let mut store = self.store.lock().unwrap();

        let request = match store.requests.get(&request_id) {
            Some(r) if r.user_id == user_id => store.requests.remove(&request_id).unwrap(),
            _ => {
                return Err(AppError::NotFound(format!(
                    "request not found: {request_id}"
                )))
            }
        };

        let original_key = store
            .images
            .remove(&request.original_image_id)
            .map(|i| i.storage_key)
            .ok_or_else(|| {
                AppError::Consistency(format!("original image row missing for {request_id}"))
            })?;

        let processed_key = request
            .processed_image_id
            .and_then(|id| store.images.remove(&id))
            .map(|i| i.storage_key);

        Ok(DeletedRequest {
            original_key,
            processed_key,
        })
    }
}

#[derive(Default)]
struct MemStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemStorage {
    fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_file(&self, key: &str) -> Result<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.object(key)
            .ok_or_else(|| AppError::Storage(format!("object not found: {key}")))
    }

    async fn upload_file(
        &self,
        user_id: Uuid,
        file_name: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<String> {
        let ext = convert_service::storage::file_extension(file_name).unwrap_or_default();
        let key = format!("{user_id}/{}.{ext}", Uuid::new_v4());
        self.objects.lock().unwrap().insert(key.clone(), data);
        Ok(key)
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct MemPublisher {
    published: Mutex<Vec<WorkItem>>,
    fail: bool,
}

impl MemPublisher {
    fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn items(&self) -> Vec<WorkItem> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobPublisher for MemPublisher {
    async fn publish(&self, item: &WorkItem) -> Result<()> {
        if self.fail {
            return Err(AppError::Dispatch("broker unavailable".to_string()));
        }
        self.published.lock().unwrap().push(item.clone());
        Ok(())
    }
}

// ========================================
// Fixtures
// ========================================

struct Pipeline {
    repo: Arc<MemRepo>,
    storage: Arc<MemStorage>,
    publisher: Arc<MemPublisher>,
    service: RequestService,
    worker: ConvertWorker,
}

fn pipeline_with_publisher(publisher: MemPublisher) -> Pipeline {
    let repo = Arc::new(MemRepo::default());
    let storage = Arc::new(MemStorage::default());
    let publisher = Arc::new(publisher);
    let service = RequestService::new(repo.clone(), storage.clone(), publisher.clone());
    let worker = ConvertWorker::new(
        repo.clone(),
        storage.clone(),
        Arc::new(ImageProcessor::with_defaults()),
    );
    Pipeline {
        repo,
        storage,
        publisher,
        service,
        worker,
    }
}

fn pipeline() -> Pipeline {
    pipeline_with_publisher(MemPublisher::default())
}

fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    }));
    ImageProcessor::with_defaults()
        .encode(&img, ImageFormat::Png)
        .unwrap()
}

// ========================================
// Submission
// ========================================

#[tokio::test]
async fn submit_rejects_ratio_out_of_range() {
    let p = pipeline();
    let user_id = Uuid::new_v4();

    for ratio in [0.0, -0.5, 1.5] {
        let result = p
            .service
            .submit(user_id, "photo.png", png_bytes(4, 4), ratio, ImageFormat::Jpeg)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{ratio}");
    }

    // Nothing persisted, nothing uploaded, nothing published.
    assert_eq!(p.repo.request_count(), 0);
    assert_eq!(p.repo.image_count(), 0);
    assert_eq!(p.storage.object_count(), 0);
    assert!(p.publisher.items().is_empty());
}

#[tokio::test]
async fn submit_rejects_missing_extension() {
    let p = pipeline();

    let result = p
        .service
        .submit(
            Uuid::new_v4(),
            "photo",
            png_bytes(4, 4),
            0.5,
            ImageFormat::Jpeg,
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(p.repo.request_count(), 0);
    assert!(p.publisher.items().is_empty());
}

#[tokio::test]
async fn submit_rejects_unsupported_type() {
    let p = pipeline();

    let result = p
        .service
        .submit(
            Uuid::new_v4(),
            "notes.txt",
            Bytes::from_static(b"hello"),
            0.5,
            ImageFormat::Jpeg,
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(p.storage.object_count(), 0);
}

#[tokio::test]
async fn submit_creates_queued_request_and_publishes_once() {
    let p = pipeline();
    let user_id = Uuid::new_v4();

    let request = p
        .service
        .submit(user_id, "photo.png", png_bytes(8, 8), 0.5, ImageFormat::Jpeg)
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Queued);
    assert_eq!(request.user_id, user_id);
    assert!(request.completion_time.is_none());
    assert!(request.processed_image_id.is_none());

    let original = p.repo.image(request.original_image_id).unwrap();
    assert_eq!(original.format, ImageFormat::Png);
    assert!(original.storage_key.ends_with(".png"));
    assert!(p.storage.object(&original.storage_key).is_some());

    let items = p.publisher.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].request_id, request.id);
    assert_eq!(items[0].file_name, "photo.png");
}

#[tokio::test]
async fn submit_surfaces_publish_failure_and_leaves_request_queued() {
    let p = pipeline_with_publisher(MemPublisher::failing());
    let user_id = Uuid::new_v4();

    let result = p
        .service
        .submit(user_id, "photo.png", png_bytes(8, 8), 0.5, ImageFormat::Jpeg)
        .await;

    assert!(matches!(result, Err(AppError::Dispatch(_))));

    // Known gap: the rows exist but no worker was ever notified.
    assert_eq!(p.repo.request_count(), 1);
    let requests = p.repo.list_requests(user_id).await.unwrap();
    assert_eq!(requests[0].status, RequestStatus::Queued);
}

// ========================================
// Worker
// ========================================

#[tokio::test]
async fn worker_drives_request_to_done_with_scaled_result() {
    let p = pipeline();
    let user_id = Uuid::new_v4();

    let request = p
        .service
        .submit(
            user_id,
            "photo.png",
            png_bytes(1200, 800),
            0.5,
            ImageFormat::Jpeg,
        )
        .await
        .unwrap();

    let items = p.publisher.items();
    p.worker.handle(&items[0]).await.unwrap();

    let done = p.repo.request(request.id).unwrap();
    assert_eq!(done.status, RequestStatus::Done);
    assert!(done.completion_time.is_some());

    // Original resolution back-filled after decode.
    let original = p.repo.image(done.original_image_id).unwrap();
    assert_eq!((original.width, original.height), (Some(1200), Some(800)));

    // Processed image linked, scaled, in the target format, and stored.
    let processed_id = done.processed_image_id.expect("processed image linked");
    let processed = p.repo.image(processed_id).unwrap();
    assert_eq!(processed.format, ImageFormat::Jpeg);
    assert_eq!((processed.width, processed.height), (Some(600), Some(400)));

    let data = p.storage.object(&processed.storage_key).unwrap();
    let decoded = ImageProcessor::with_defaults()
        .decode(&data, ImageFormat::Jpeg)
        .unwrap();
    assert_eq!(image::GenericImageView::dimensions(&decoded), (600, 400));
}

#[tokio::test]
async fn worker_passes_through_on_ratio_one() {
    let p = pipeline();

    let request = p
        .service
        .submit(
            Uuid::new_v4(),
            "photo.png",
            png_bytes(320, 240),
            1.0,
            ImageFormat::Png,
        )
        .await
        .unwrap();

    p.worker.handle(&p.publisher.items()[0]).await.unwrap();

    let done = p.repo.request(request.id).unwrap();
    let processed = p.repo.image(done.processed_image_id.unwrap()).unwrap();
    assert_eq!((processed.width, processed.height), (Some(320), Some(240)));
}

#[tokio::test]
async fn worker_skips_already_done_request() {
    let p = pipeline();

    p.service
        .submit(
            Uuid::new_v4(),
            "photo.png",
            png_bytes(64, 64),
            0.5,
            ImageFormat::Jpeg,
        )
        .await
        .unwrap();

    let item = p.publisher.items()[0].clone();
    p.worker.handle(&item).await.unwrap();
    let fetches_after_first = p.storage.gets.load(Ordering::SeqCst);

    // Redelivery of the same item must not redo any work.
    p.worker.handle(&item).await.unwrap();
    assert_eq!(p.storage.gets.load(Ordering::SeqCst), fetches_after_first);
    assert_eq!(p.repo.image_count(), 2);
}

#[tokio::test]
async fn worker_fails_terminally_on_missing_request() {
    let p = pipeline();

    let result = p
        .worker
        .handle(&WorkItem {
            request_id: Uuid::new_v4(),
            file_name: "ghost.png".to_string(),
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ========================================
// Deletion
// ========================================

#[tokio::test]
async fn delete_with_processed_image_removes_rows_and_both_objects() {
    let p = pipeline();
    let user_id = Uuid::new_v4();

    let request = p
        .service
        .submit(user_id, "photo.png", png_bytes(64, 64), 0.5, ImageFormat::Jpeg)
        .await
        .unwrap();
    p.worker.handle(&p.publisher.items()[0]).await.unwrap();

    p.service.delete(user_id, request.id).await.unwrap();

    assert_eq!(p.storage.deletes.load(Ordering::SeqCst), 2);
    assert_eq!(p.storage.object_count(), 0);
    assert_eq!(p.repo.request_count(), 0);
    assert_eq!(p.repo.image_count(), 0);
    assert!(matches!(
        p.service.get(user_id, request.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_without_processed_image_issues_single_storage_delete() {
    let p = pipeline();
    let user_id = Uuid::new_v4();

    // Conversion never ran: only the original exists.
    let request = p
        .service
        .submit(user_id, "photo.png", png_bytes(64, 64), 0.5, ImageFormat::Jpeg)
        .await
        .unwrap();

    p.service.delete(user_id, request.id).await.unwrap();

    assert_eq!(p.storage.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(p.repo.request_count(), 0);
    assert_eq!(p.repo.image_count(), 0);
}

#[tokio::test]
async fn delete_is_owner_scoped() {
    let p = pipeline();
    let owner = Uuid::new_v4();

    let request = p
        .service
        .submit(owner, "photo.png", png_bytes(16, 16), 0.5, ImageFormat::Jpeg)
        .await
        .unwrap();

    let result = p.service.delete(Uuid::new_v4(), request.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(p.repo.request_count(), 1);
}

/// Service layer for the conversion pipeline
///
/// This module provides:
/// - Request lifecycle: submission, reads, deletion
/// - Conversion: image processor and the broker-driven worker
pub mod convert;
pub mod lifecycle;

pub use convert::{ConvertWorker, ImageProcessor, ImageProcessorConfig};
pub use lifecycle::RequestService;

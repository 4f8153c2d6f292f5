//! Conversion pipeline: processor and worker.

pub mod processor;
pub mod worker;

pub use processor::{ConvertOutput, ImageProcessor, ImageProcessorConfig};
pub use worker::ConvertWorker;

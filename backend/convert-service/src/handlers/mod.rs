/// HTTP handlers for convert-service
pub mod requests;

pub use requests::{delete_request, get_request, list_requests, submit_request};

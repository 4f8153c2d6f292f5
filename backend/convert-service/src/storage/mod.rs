/// Object storage abstraction
///
/// Keys are generated here, never supplied by callers: every upload gets a
/// fresh `{user_id}/{uuid}.{ext}` key, so two uploads can never collide and
/// the original extension survives into the stored object name.
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;

pub mod s3;

pub use s3::S3Storage;

/// Storage backend for image blobs.
///
/// Allows abstracting over S3-compatible stores in production and
/// in-memory fakes in tests.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch an object by its key.
    async fn get_file(&self, key: &str) -> Result<Bytes>;

    /// Upload an object under a freshly generated key owned by `user_id`.
    /// Returns the generated key.
    async fn upload_file(
        &self,
        user_id: Uuid,
        file_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String>;

    /// Delete an object by its key.
    async fn delete_file(&self, key: &str) -> Result<()>;
}

/// Build a collision-resistant object key, preserving the file extension.
pub(crate) fn object_key(user_id: Uuid, file_name: &str) -> String {
    let id = Uuid::new_v4();
    match file_extension(file_name) {
        Some(ext) => format!("{user_id}/{id}.{ext}"),
        None => format!("{user_id}/{id}"),
    }
}

/// Extension of a file name, lowercased. `None` when there is none.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.png"), Some("png".to_string()));
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("photo"), None);
        assert_eq!(file_extension("photo."), None);
    }

    #[test]
    fn test_object_key_preserves_extension() {
        let user_id = Uuid::new_v4();
        let key = object_key(user_id, "holiday.jpeg");
        assert!(key.starts_with(&format!("{user_id}/")));
        assert!(key.ends_with(".jpeg"));
    }

    #[test]
    fn test_object_keys_are_unique() {
        let user_id = Uuid::new_v4();
        let a = object_key(user_id, "same.png");
        let b = object_key(user_id, "same.png");
        assert_ne!(a, b);
    }
}

use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

pub mod e_tag_verify;
pub mod memory;
pub mod s3;
pub mod upload_manager;

pub type Storage = Box<dyn ObjectStorage + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// The write side of an object store.
///
/// Keys are destination keys. Implementations apply their own prefix.
#[async_trait]
pub trait ObjectStorage: DynClone {
    /// Returns the e_tag of the stored object, if the store reports one.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_md5: Option<String>,
        content_type: Option<String>,
    ) -> Result<Option<String>>;

    /// Returns the upload id of the new session.
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String>;

    /// Returns the e_tag of the uploaded part.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        content_md5: Option<String>,
    ) -> Result<String>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(ObjectStorage);

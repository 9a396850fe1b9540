use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tracing::trace;

use crate::Config;
use crate::storage::{ObjectStorage, Storage, UploadedPart};
use crate::types::S3Target;

const EXPRESS_ONEZONE_STORAGE_SUFFIX: &str = "--x-s3";

mod client_builder;

pub struct S3StorageFactory {}

impl S3StorageFactory {
    pub async fn create(config: &Config) -> Storage {
        S3Storage::boxed_new(
            config.target.clone(),
            Arc::new(config.target_client_config.create_client().await),
        )
    }
}

#[derive(Clone)]
struct S3Storage {
    bucket: String,
    prefix: String,
    client: Arc<Client>,
    express_onezone_storage: bool,
}

impl S3Storage {
    fn boxed_new(target: S3Target, client: Arc<Client>) -> Storage {
        let storage = S3Storage {
            express_onezone_storage: is_express_onezone_storage(&target.bucket),
            bucket: target.bucket,
            prefix: target.prefix,
            client,
        };

        Box::new(storage)
    }

    fn full_key(&self, key: &str) -> String {
        S3Target {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
        }
        .object_key(key)
    }

    // Express One Zone buckets do not accept Content-MD5.
    fn content_md5(&self, content_md5: Option<String>) -> Option<String> {
        if self.express_onezone_storage {
            return None;
        }

        content_md5
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_md5: Option<String>,
        content_type: Option<String>,
    ) -> Result<Option<String>> {
        let target_key = self.full_key(key);
        let content_length = body.len() as i64;

        let put_object_output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&target_key)
            .content_length(content_length)
            .set_content_md5(self.content_md5(content_md5))
            .set_content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .context("aws_sdk_s3::client::Client put_object() failed.")?;

        trace!(key = key, target_key = target_key, "{put_object_output:?}");

        Ok(put_object_output.e_tag().map(|e_tag| e_tag.to_string()))
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String> {
        let target_key = self.full_key(key);

        let create_multipart_upload_output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&target_key)
            .set_content_type(content_type)
            .send()
            .await
            .context("aws_sdk_s3::client::Client create_multipart_upload() failed.")?;

        let upload_id = create_multipart_upload_output
            .upload_id()
            .ok_or_else(|| anyhow!("create_multipart_upload() returned no upload_id: {key}"))?;

        trace!(
            key = key,
            target_key = target_key,
            upload_id = upload_id,
            "multipart upload created."
        );

        Ok(upload_id.to_string())
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        content_md5: Option<String>,
    ) -> Result<String> {
        let content_length = body.len() as i64;

        let upload_part_output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(content_length)
            .set_content_md5(self.content_md5(content_md5))
            .body(ByteStream::from(body))
            .send()
            .await
            .context("aws_sdk_s3::client::Client upload_part() failed.")?;

        trace!(key = key, "{upload_part_output:?}");

        upload_part_output
            .e_tag()
            .map(|e_tag| e_tag.to_string())
            .ok_or_else(|| anyhow!("upload_part() returned no e_tag: {key} part {part_number}"))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>> {
        let completed_parts = parts
            .into_iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.e_tag)
                    .build()
            })
            .collect::<Vec<_>>();

        let complete_multipart_upload_output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .context("aws_sdk_s3::client::Client complete_multipart_upload() failed.")?;

        trace!(key = key, "{complete_multipart_upload_output:?}");

        Ok(complete_multipart_upload_output
            .e_tag()
            .map(|e_tag| e_tag.to_string()))
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .upload_id(upload_id)
            .send()
            .await
            .context("aws_sdk_s3::client::Client abort_multipart_upload() failed.")?;

        Ok(())
    }
}

fn is_express_onezone_storage(bucket: &str) -> bool {
    bucket.ends_with(EXPRESS_ONEZONE_STORAGE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::args::parse_from_args;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn is_express_onezone_storage_test() {
        init_dummy_tracing_subscriber();

        assert!(is_express_onezone_storage("bucket--x-s3"));

        assert!(!is_express_onezone_storage("bucket-x-s3"));
        assert!(!is_express_onezone_storage("bucket--x-s3s"));
        assert!(!is_express_onezone_storage("bucket"));
    }

    #[tokio::test]
    async fn full_key_with_prefix() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--anonymous",
            "--region",
            "us-east-1",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "s3://target-bucket/load1",
        ];
        let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
        let client = Arc::new(config.target_client_config.create_client().await);

        let storage = S3Storage {
            bucket: config.target.bucket.clone(),
            prefix: config.target.prefix.clone(),
            client,
            express_onezone_storage: false,
        };

        assert_eq!(storage.full_key("dir/data1"), "load1/dir/data1");
    }

    #[tokio::test]
    async fn content_md5_is_dropped_for_express_onezone() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--anonymous",
            "--region",
            "us-east-1",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "s3://target-bucket--x-s3",
        ];
        let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
        let client = Arc::new(config.target_client_config.create_client().await);

        let storage = S3Storage {
            bucket: config.target.bucket.clone(),
            prefix: config.target.prefix.clone(),
            client: client.clone(),
            express_onezone_storage: is_express_onezone_storage(&config.target.bucket),
        };
        assert_eq!(storage.content_md5(Some("digest".to_string())), None);

        let storage = S3Storage {
            bucket: "target-bucket".to_string(),
            prefix: "".to_string(),
            client,
            express_onezone_storage: false,
        };
        assert_eq!(
            storage.content_md5(Some("digest".to_string())),
            Some("digest".to_string())
        );
    }

    #[tokio::test]
    async fn put_object_error() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "s3-upload-agent",
            "--anonymous",
            "--region",
            "us-east-1",
            "--aws-max-attempts",
            "1",
            "--endpoint-url",
            "https://invalid-s3-endpoint-url.6329313.local:65535",
            "--manifest-file",
            "./test_data/manifest/manifest.json",
            "s3://dummy-bucket",
        ];
        let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();

        let storage = S3StorageFactory::create(&config).await;

        assert!(
            storage
                .put_object("data1", b"data1".to_vec(), None, None)
                .await
                .is_err()
        );
        assert!(
            storage
                .create_multipart_upload("data1", None)
                .await
                .is_err()
        );
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .or_else(|_| EnvFilter::try_new("dummy=trace"))
                    .unwrap(),
            )
            .try_init();
    }
}

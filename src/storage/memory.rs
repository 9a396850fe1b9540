use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::storage::e_tag_verify::generate_e_tag_hash;
use crate::storage::{ObjectStorage, Storage, UploadedPart};

#[derive(Debug, Default)]
struct MultipartSession {
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<String, Vec<u8>>,
    content_types: HashMap<String, Option<String>>,
    part_sizes: HashMap<String, Vec<usize>>,
    sessions: HashMap<String, MultipartSession>,
    aborted_upload_ids: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct FailureInjection {
    put_keys: HashSet<String>,
    create_multipart_keys: HashSet<String>,
    upload_part_number: Option<i32>,
    complete_multipart: bool,
    abort_multipart: bool,
    corrupt_e_tag: bool,
}

#[derive(Debug, Default)]
struct CallCounters {
    put_object: AtomicUsize,
    create_multipart_upload: AtomicUsize,
    upload_part: AtomicUsize,
    complete_multipart_upload: AtomicUsize,
    abort_multipart_upload: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// An in-process object store.
///
/// Clones share the same state. Failures can be injected per operation, and every
/// call is counted so that callers can assert on the traffic a transfer produced.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<CallCounters>,
    failure_injection: FailureInjection,
    latency: Option<Duration>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_put_object(mut self, key: &str) -> Self {
        self.failure_injection.put_keys.insert(key.to_string());
        self
    }

    pub fn fail_create_multipart_upload(mut self, key: &str) -> Self {
        self.failure_injection
            .create_multipart_keys
            .insert(key.to_string());
        self
    }

    pub fn fail_upload_part(mut self, part_number: i32) -> Self {
        self.failure_injection.upload_part_number = Some(part_number);
        self
    }

    pub fn fail_complete_multipart_upload(mut self) -> Self {
        self.failure_injection.complete_multipart = true;
        self
    }

    pub fn fail_abort_multipart_upload(mut self) -> Self {
        self.failure_injection.abort_multipart = true;
        self
    }

    pub fn corrupt_e_tag(mut self) -> Self {
        self.failure_injection.corrupt_e_tag = true;
        self
    }

    pub async fn get_object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().await.objects.get(key).cloned()
    }

    pub async fn get_content_type(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .content_types
            .get(key)
            .cloned()
            .flatten()
    }

    pub async fn object_count(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    /// Sizes of the parts of the last multipart upload of `key`, in part number order.
    pub async fn get_part_sizes(&self, key: &str) -> Vec<usize> {
        self.state
            .lock()
            .await
            .part_sizes
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn open_session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn aborted_upload_ids(&self) -> Vec<String> {
        self.state.lock().await.aborted_upload_ids.clone()
    }

    pub fn put_object_count(&self) -> usize {
        self.counters.put_object.load(Ordering::SeqCst)
    }

    pub fn create_multipart_upload_count(&self) -> usize {
        self.counters.create_multipart_upload.load(Ordering::SeqCst)
    }

    pub fn upload_part_count(&self) -> usize {
        self.counters.upload_part.load(Ordering::SeqCst)
    }

    pub fn complete_multipart_upload_count(&self) -> usize {
        self.counters
            .complete_multipart_upload
            .load(Ordering::SeqCst)
    }

    pub fn abort_multipart_upload_count(&self) -> usize {
        self.counters.abort_multipart_upload.load(Ordering::SeqCst)
    }

    pub fn total_call_count(&self) -> usize {
        self.put_object_count()
            + self.create_multipart_upload_count()
            + self.upload_part_count()
            + self.complete_multipart_upload_count()
            + self.abort_multipart_upload_count()
    }

    /// The highest number of calls observed in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter_call(&self) {
        let in_flight = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave_call(&self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn e_tag(&self, e_tag: String) -> String {
        if self.failure_injection.corrupt_e_tag {
            return "\"00000000000000000000000000000000\"".to_string();
        }

        e_tag
    }

    async fn put_object_inner(
        &self,
        key: &str,
        body: Vec<u8>,
        content_md5: Option<String>,
        content_type: Option<String>,
    ) -> Result<Option<String>> {
        if self.failure_injection.put_keys.contains(key) {
            return Err(anyhow!("put_object() failed. injected failure: {key}"));
        }
        verify_content_md5(&body, &content_md5)?;

        let e_tag = generate_e_tag_hash(md5::compute(&body).as_slice(), 0);

        let mut state = self.state.lock().await;
        state.objects.insert(key.to_string(), body);
        state.content_types.insert(key.to_string(), content_type);

        Ok(Some(self.e_tag(e_tag)))
    }

    async fn create_multipart_upload_inner(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String> {
        if self.failure_injection.create_multipart_keys.contains(key) {
            return Err(anyhow!(
                "create_multipart_upload() failed. injected failure: {key}"
            ));
        }

        let upload_id = Uuid::new_v4().to_string();

        let mut state = self.state.lock().await;
        state.sessions.insert(
            upload_id.clone(),
            MultipartSession {
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        state.content_types.insert(key.to_string(), content_type);

        Ok(upload_id)
    }

    async fn upload_part_inner(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        content_md5: Option<String>,
    ) -> Result<String> {
        if self.failure_injection.upload_part_number == Some(part_number) {
            return Err(anyhow!(
                "upload_part() failed. injected failure: {key} part {part_number}"
            ));
        }
        verify_content_md5(&body, &content_md5)?;

        let e_tag = generate_e_tag_hash(md5::compute(&body).as_slice(), 0);

        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| anyhow!("no such upload: {upload_id}"))?;
        if session.key != key {
            return Err(anyhow!("upload {upload_id} does not belong to {key}"));
        }
        session.parts.insert(part_number, body);

        Ok(e_tag)
    }

    async fn complete_multipart_upload_inner(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>> {
        if self.failure_injection.complete_multipart {
            return Err(anyhow!(
                "complete_multipart_upload() failed. injected failure: {key}"
            ));
        }

        let mut state = self.state.lock().await;
        let session = state
            .sessions
            .remove(upload_id)
            .ok_or_else(|| anyhow!("no such upload: {upload_id}"))?;

        let mut previous_part_number = 0;
        let mut object = Vec::new();
        let mut part_sizes = Vec::new();
        let mut concatenated_md5_hash = Vec::new();
        for part in &parts {
            if part.part_number <= previous_part_number {
                return Err(anyhow!("parts must be in ascending order: {key}"));
            }
            previous_part_number = part.part_number;

            let body = session
                .parts
                .get(&part.part_number)
                .ok_or_else(|| anyhow!("part {} was not uploaded: {key}", part.part_number))?;
            concatenated_md5_hash.extend_from_slice(md5::compute(body).as_slice());
            part_sizes.push(body.len());
            object.extend_from_slice(body);
        }

        state.objects.insert(key.to_string(), object);
        state.part_sizes.insert(key.to_string(), part_sizes);

        Ok(Some(self.e_tag(generate_e_tag_hash(
            &concatenated_md5_hash,
            parts.len(),
        ))))
    }

    async fn abort_multipart_upload_inner(&self, key: &str, upload_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.aborted_upload_ids.push(upload_id.to_string());

        if self.failure_injection.abort_multipart {
            return Err(anyhow!(
                "abort_multipart_upload() failed. injected failure: {key}"
            ));
        }

        state.sessions.remove(upload_id);
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_md5: Option<String>,
        content_type: Option<String>,
    ) -> Result<Option<String>> {
        self.counters.put_object.fetch_add(1, Ordering::SeqCst);
        self.enter_call().await;
        let result = self
            .put_object_inner(key, body, content_md5, content_type)
            .await;
        self.leave_call();
        result
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<String>,
    ) -> Result<String> {
        self.counters
            .create_multipart_upload
            .fetch_add(1, Ordering::SeqCst);
        self.enter_call().await;
        let result = self.create_multipart_upload_inner(key, content_type).await;
        self.leave_call();
        result
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
        content_md5: Option<String>,
    ) -> Result<String> {
        self.counters.upload_part.fetch_add(1, Ordering::SeqCst);
        self.enter_call().await;
        let result = self
            .upload_part_inner(key, upload_id, part_number, body, content_md5)
            .await;
        self.leave_call();
        result
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>> {
        self.counters
            .complete_multipart_upload
            .fetch_add(1, Ordering::SeqCst);
        self.enter_call().await;
        let result = self
            .complete_multipart_upload_inner(key, upload_id, parts)
            .await;
        self.leave_call();
        result
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.counters
            .abort_multipart_upload
            .fetch_add(1, Ordering::SeqCst);
        self.enter_call().await;
        let result = self.abort_multipart_upload_inner(key, upload_id).await;
        self.leave_call();
        result
    }
}

fn verify_content_md5(body: &[u8], content_md5: &Option<String>) -> Result<()> {
    if let Some(content_md5) = content_md5 {
        let expected = general_purpose::STANDARD.encode(md5::compute(body).as_slice());
        if *content_md5 != expected {
            return Err(anyhow!("BadDigest: Content-MD5 does not match the body."));
        }
    }

    Ok(())
}

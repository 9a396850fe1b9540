/// Compares the locally computed e_tag with the one returned by the target.
/// Returns `None` when the target did not return an e_tag.
pub fn verify_e_tag(local_e_tag: &Option<String>, target_e_tag: &Option<String>) -> Option<bool> {
    if local_e_tag.is_none() || target_e_tag.is_none() {
        return None;
    }

    Some(normalize_e_tag(local_e_tag) == normalize_e_tag(target_e_tag))
}

pub fn is_multipart_upload_e_tag(e_tag: &Option<String>) -> bool {
    e_tag.as_ref().is_some_and(|e_tag| e_tag.contains('-'))
}

pub fn generate_e_tag_hash(concatenated_md5_hash: &[u8], parts_count: usize) -> String {
    if parts_count == 0 {
        format!("\"{}\"", hex::encode(concatenated_md5_hash))
    } else {
        format!(
            "\"{:x}-{}\"",
            md5::compute(concatenated_md5_hash),
            parts_count
        )
    }
}

/// The e_tag S3 assigns to `payload` when it is uploaded with the given transfer settings.
pub fn generate_e_tag_hash_from_payload(
    payload: &[u8],
    multipart_chunksize: usize,
    multipart_threshold: usize,
) -> String {
    if payload.len() < multipart_threshold {
        return generate_e_tag_hash(md5::compute(payload).as_slice(), 0);
    }

    let mut concatenated_md5_hash = Vec::new();
    let mut parts_count = 0;
    for chunk in payload.chunks(multipart_chunksize) {
        concatenated_md5_hash.extend_from_slice(md5::compute(chunk).as_slice());
        parts_count += 1;
    }

    generate_e_tag_hash(&concatenated_md5_hash, parts_count)
}

pub fn calculate_parts_count(
    multipart_threshold: u64,
    multipart_chunksize: u64,
    content_length: u64,
) -> u64 {
    if content_length < multipart_threshold {
        return 0;
    }

    content_length.div_ceil(multipart_chunksize)
}

fn normalize_e_tag(e_tag: &Option<String>) -> Option<String> {
    e_tag.as_ref().map(|e_tag| e_tag.replace('\"', ""))
}
